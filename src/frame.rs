//! Task frames (spec §4.A "Task Frame").
//!
//! A frame carries one SPAWN call's worth of state: the task body, its
//! result slot, and a synchronization tag. Frames are created as ordinary
//! Rust stack values at the SPAWN call site (the natural Rust analogue of
//! the reference implementation's bump-allocated per-worker frame array —
//! the call stack already gives us a LIFO region indexed by "the next
//! address", so no separate arena is needed). What gets pushed onto a
//! worker's [`crate::deque::Deque`] is a type-erased [`FrameRef`] pointing
//! back at this stack value, exactly the technique other fork-join Rust
//! runtimes use to store heterogeneous task signatures in one homogeneous
//! queue without paying for a `Box<dyn Any>` per task.
//!
//! The synchronization tag transitions monotonically, per spec invariant 2:
//! `Empty -> Pushed -> (Stolen -> Done | Done)`.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};

use crate::scheduler::Pool;
use crate::scope::Scope;
use crate::worker::Worker;

/// Render a `catch_unwind` payload as a human-readable message, for the
/// `error!` logged just before [`std::process::abort`] in [`Frame::run`].
fn panic_payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A frame's synchronization tag (spec §3 "Synchronization tag").
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTag {
    /// Allocated but not yet pushed onto a deque.
    Empty = 0,
    /// Pushed onto the owner's deque; not yet run or stolen.
    Pushed = 1,
    /// Claimed by a thief; the owner must not run it locally.
    Stolen = 2,
    /// Run to completion; the result slot is readable.
    Done = 3,
}

impl SyncTag {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SyncTag::Empty,
            1 => SyncTag::Pushed,
            2 => SyncTag::Stolen,
            3 => SyncTag::Done,
            _ => unreachable!("invalid SyncTag bit pattern"),
        }
    }
}

/// The type-erasable part of a frame: the tag and owner identity. Declared
/// `#[repr(C)]` and placed first in [`Frame`] so a `*const Frame<R>` can be
/// reinterpreted as `*const FrameHeader` regardless of `R` — this is what
/// lets [`FrameRef`] read/mutate the tag without being generic.
#[repr(C)]
struct FrameHeader {
    tag: AtomicU8,
    owner: usize,
}

/// A fixed-size record holding a task's body, its result slot, and its
/// synchronization tag (spec §4.A).
#[repr(C)]
pub struct Frame<R> {
    header: FrameHeader,
    body: UnsafeCell<Option<Box<dyn FnOnce(&Scope<'_>) -> R + Send>>>,
    result: UnsafeCell<MaybeUninit<R>>,
}

// A Frame is only ever touched by its owning thread until it is pushed, and
// by at most one thief thereafter, coordinated through `tag`; `R: Send` is
// required because the result crosses threads on the slow path.
unsafe impl<R: Send> Sync for Frame<R> {}

impl<R> Frame<R> {
    /// `init(frame, fn, args...)` (spec §4.A): construct a frame in the
    /// `Empty` state. `owner` is the id of the worker that is about to push
    /// it; kept for debug assertions only (spec §3 "Owner-worker identity").
    pub fn new(owner: usize, body: impl FnOnce(&Scope<'_>) -> R + Send + 'static) -> Self {
        Self {
            header: FrameHeader {
                tag: AtomicU8::new(SyncTag::Empty as u8),
                owner,
            },
            body: UnsafeCell::new(Some(Box::new(body))),
            result: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Worker id that created this frame.
    pub fn owner(&self) -> usize {
        self.header.owner
    }

    /// Mark the frame `Pushed`, the transition SPAWN performs right after
    /// `push_bottom` succeeds.
    pub(crate) fn mark_pushed(&self) {
        self.header.tag.store(SyncTag::Pushed as u8, Ordering::Release);
    }

    /// `is_stolen(frame)` (spec §4.A): acquire-load the tag and test for
    /// `Stolen`.
    pub fn is_stolen(&self) -> bool {
        SyncTag::from_u8(self.header.tag.load(Ordering::Acquire)) == SyncTag::Stolen
    }

    /// Whether the frame has finished running (`Done`), with acquire
    /// ordering so a successful read also acquires the result write (spec
    /// §5 "a SYNC waiting on DONE acquires the result write").
    pub fn is_done(&self) -> bool {
        SyncTag::from_u8(self.header.tag.load(Ordering::Acquire)) == SyncTag::Done
    }

    /// `run(frame, worker)` (spec §4.A): invoke the stored body, write the
    /// result, and publish `Done`. Used on the owner's fast path, where the
    /// caller already holds a typed `&Frame<R>` (no type erasure needed),
    /// and by thieves via [`FrameRef::execute`]. Does not return the result
    /// directly — exactly one caller (the joining SYNC) retrieves it via
    /// [`Frame::take_result`], keeping the write and the single read
    /// unambiguous for non-`Copy` result types.
    ///
    /// The body runs inside `catch_unwind` and any panic — a task body
    /// fault (spec §7 "Task body abort: propagated as process abort") or a
    /// deque overflow raised by a nested SPAWN (spec §3 "overflow is a
    /// fatal runtime error") — aborts the whole process rather than just
    /// unwinding this one worker's OS thread. This is the single choke
    /// point every frame execution passes through (owner fast path and
    /// thief path alike), so it is also where the abort guarantee lives:
    /// without it, a panicking worker thread would die silently while its
    /// frame's tag stayed `Pushed`/`Stolen` forever, and every thread
    /// joining on it (spec §4.D `RUN`, §4.F stolen recovery) would spin
    /// forever instead of the clean abort spec §8-E6 requires.
    pub(crate) fn run(&self, worker: &Worker, pool: &Pool) {
        let body = unsafe { &mut *self.body.get() }
            .take()
            .expect("frame body already consumed");
        let scope = Scope::new(worker, pool);
        let result = match panic::catch_unwind(AssertUnwindSafe(|| body(&scope))) {
            Ok(result) => result,
            Err(payload) => {
                tracing::error!(
                    worker = worker.id(),
                    panic = %panic_payload_message(&*payload),
                    "task body panicked; aborting process"
                );
                std::process::abort();
            }
        };
        // SAFETY: exclusive access — only the thread that wins the race to
        // execute a frame (owner on the fast path, or the thief that
        // published `Stolen`) ever calls `run`, and it does so exactly once.
        unsafe { (*self.result.get()).write(result) };
        self.header.tag.store(SyncTag::Done as u8, Ordering::Release);
    }

    /// Read the result out of a `Done` frame. Panics if called before the
    /// tag is `Done` — callers must have already observed `is_done()`. Must
    /// be called at most once per frame (enforced by the SPAWN/SYNC
    /// protocol: a frame is SYNCed exactly once).
    pub fn take_result(&self) -> R {
        assert!(self.is_done(), "take_result called before frame is Done");
        // SAFETY: `Done` was published with Release in `run`; this load is
        // Acquire via `is_done`, so the write happens-before this read.
        unsafe { std::ptr::read((*self.result.get()).as_ptr()) }
    }

    /// Type-erase this frame for storage in a [`crate::deque::Deque`].
    ///
    /// # Safety
    /// The caller must ensure `self` outlives every use of the returned
    /// [`FrameRef`] — guaranteed by SPAWN/SYNC nesting (spec invariant 4):
    /// the frame is a local of the function that will SYNC it before
    /// returning.
    pub unsafe fn as_ref(&self) -> FrameRef
    where
        R: Send + 'static,
    {
        FrameRef {
            pointer: (self as *const Frame<R>).cast::<FrameHeader>(),
            execute: execute_erased::<R>,
        }
    }
}

/// SAFETY: `ptr` must actually point at a live `Frame<R>` for the `R` this
/// function was monomorphized for — guaranteed because [`FrameRef::execute`]
/// is only ever called with the `execute` fn pointer produced alongside
/// `pointer` in [`Frame::as_ref`].
unsafe fn execute_erased<R: Send + 'static>(ptr: *const FrameHeader, worker: &Worker, pool: &Pool) {
    let frame = &*ptr.cast::<Frame<R>>();
    frame.run(worker, pool);
}

/// A type-erased, `Copy`, `Send` handle to a live [`Frame`], stored in a
/// [`crate::deque::Deque`] so one worker's deque can hold tasks of many
/// different result types without boxing each one.
///
/// This is the Rust-idiomatic rendition of spec §9's "family of macros [that]
/// generates 0- through 8-argument variants" — rather than a C union sized to
/// the widest signature in the program, each frame is its own concretely
/// typed stack value, and only a thin vtable-free pointer pair crosses the
/// deque boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameRef {
    pointer: *const FrameHeader,
    execute: unsafe fn(*const FrameHeader, &Worker, &Pool),
}

// SAFETY: a FrameRef is only ever constructed from a Frame<R: Send>, and the
// deque's push/pop/steal protocol ensures at most one thread executes it.
unsafe impl Send for FrameRef {}

impl FrameRef {
    /// Run the underlying frame's body on `worker`, writing its result and
    /// publishing `Done`. Used by thieves and by the idle steal loop; the
    /// owner's fast path calls [`Frame::run`] directly instead.
    ///
    /// # Safety
    /// The referenced [`Frame`] must still be alive.
    pub(crate) unsafe fn execute(self, worker: &Worker, pool: &Pool) {
        (self.execute)(self.pointer, worker, pool)
    }

    /// Mark the referenced frame `Stolen` with release ordering, publishing
    /// that a thief has claimed it (spec §4.B steal_top step 5).
    ///
    /// # Safety
    /// The referenced [`Frame`] must still be alive.
    pub(crate) unsafe fn mark_stolen(self) {
        (*self.pointer).tag.store(SyncTag::Stolen as u8, Ordering::Release);
    }

    /// Owning worker id, for debug diagnostics.
    pub(crate) unsafe fn owner(self) -> usize {
        (*self.pointer).owner
    }
}
