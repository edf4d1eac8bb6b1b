//! The Chase–Lev work-stealing deque (spec §4.B).
//!
//! Grounded on the teacher's `concurrent::work_stealing::WorkStealingDeque`,
//! with one deliberate divergence: the teacher's deque grows its backing
//! buffer on overflow; this spec treats overflow as fatal (§3: "overflow is
//! a fatal runtime error, not back-pressure"), so the buffer here is fixed
//! at construction and `push_bottom` panics instead of reallocating.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{fence, AtomicIsize, Ordering};

use crate::frame::FrameRef;

/// Outcome of a [`Deque::steal_top`] attempt (spec §4.B `steal_top`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steal {
    /// Stole a frame.
    Success(FrameRef),
    /// The deque appeared empty.
    Empty,
    /// Lost a race with another thief or with the owner; retry.
    Abort,
}

/// A bounded, single-owner/multi-thief lock-free deque of [`FrameRef`]s.
///
/// Only the owning worker calls [`Deque::push_bottom`] / [`Deque::pop_bottom`].
/// Any worker may call [`Deque::steal_top`] (spec invariant 1).
#[repr(align(64))]
pub struct Deque {
    /// Owner-only index into `buf`.
    bottom: AtomicIsize,
    /// Shared index; only ever mutated via CAS.
    top: AtomicIsize,
    buf: Box<[UnsafeCell<MaybeUninit<FrameRef>>]>,
    capacity: isize,
}

// SAFETY: the owner thread exclusively writes `bottom` and `buf` slots it
// owns; thieves only ever touch `top` via CAS and only read a slot after
// winning that CAS, matching the Chase-Lev protocol.
unsafe impl Sync for Deque {}
unsafe impl Send for Deque {}

impl Deque {
    /// Build a deque with room for exactly `capacity` frames (spec §3
    /// "Deque slot" / `dqsize`).
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "deque capacity must be positive");
        let mut buf = Vec::with_capacity(capacity);
        buf.resize_with(capacity, || UnsafeCell::new(MaybeUninit::uninit()));
        Self {
            bottom: AtomicIsize::new(0),
            top: AtomicIsize::new(0),
            buf: buf.into_boxed_slice(),
            capacity: capacity as isize,
        }
    }

    fn slot(&self, index: isize) -> &UnsafeCell<MaybeUninit<FrameRef>> {
        let i = index.rem_euclid(self.capacity) as usize;
        &self.buf[i]
    }

    /// `push_bottom(frame)` — owner only, wait-free (spec §4.B).
    ///
    /// Panics on overflow: spec §3 treats this as a fatal runtime error, not
    /// back-pressure, and §7 classifies it as process-aborting.
    pub fn push_bottom(&self, frame: FrameRef) {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Acquire);
        if b - t >= self.capacity {
            panic!(
                "deque overflow: capacity {} exceeded (bottom={b}, top={t})",
                self.capacity
            );
        }

        // SAFETY: only the owner writes this slot, and only the owner's
        // future pop/steal calls will read it, after `bottom` publishes it.
        unsafe { (*self.slot(b).get()).write(frame) };

        // Release-store publishes the `buf` write to any thief that later
        // observes this new `bottom`.
        self.bottom.store(b + 1, Ordering::Release);
    }

    /// `pop_bottom()` — owner only; wait-free except when racing a single
    /// thief for the last element (spec §4.B).
    pub fn pop_bottom(&self) -> Option<FrameRef> {
        let b = self.bottom.load(Ordering::Relaxed) - 1;
        self.bottom.store(b, Ordering::Relaxed);

        // Full fence: order this store of `bottom` before the load of `top`
        // below, against a concurrent thief's store-then-load in steal_top.
        fence(Ordering::SeqCst);
        let t = self.top.load(Ordering::Acquire);

        if t > b {
            // Deque was empty (or became empty via the decrement above).
            self.bottom.store(t, Ordering::Relaxed);
            return None;
        }

        // SAFETY: `t <= b` means slot `b` was pushed and not yet popped or
        // (until the CAS below, if `t == b`) stolen.
        let frame = unsafe { (*self.slot(b).get()).assume_init() };

        if t == b {
            // Last element: race the CAS against a concurrent steal_top.
            if self
                .top
                .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_err()
            {
                // Lost the race; a thief took it.
                self.bottom.store(t + 1, Ordering::Relaxed);
                return None;
            }
            self.bottom.store(t + 1, Ordering::Relaxed);
        }

        Some(frame)
    }

    /// `steal_top()` — any thief (spec §4.B).
    pub fn steal_top(&self) -> Steal {
        let t = self.top.load(Ordering::Acquire);
        // Full fence, then load `bottom`: guarantees this observes the
        // owner's `pop_bottom` decrement iff it happened-before this load.
        fence(Ordering::SeqCst);
        let b = self.bottom.load(Ordering::Acquire);

        if t >= b {
            return Steal::Empty;
        }

        // SAFETY: `t < b` means slot `t` holds a pushed, not-yet-popped
        // frame at the moment of this read; the CAS below determines
        // whether we actually won it.
        let frame = unsafe { (*self.slot(t).get()).assume_init() };

        if self
            .top
            .compare_exchange(t, t + 1, Ordering::SeqCst, Ordering::Relaxed)
            .is_ok()
        {
            // SAFETY: won the CAS — we are the exclusive owner of `frame`
            // now; publish that to the original owner.
            unsafe { frame.mark_stolen() };
            Steal::Success(frame)
        } else {
            Steal::Abort
        }
    }

    /// Approximate size; racy against concurrent steals (debug/metrics use
    /// only, per spec §3 "size is `bottom - top`").
    pub fn len(&self) -> usize {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Relaxed);
        (b - t).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        let b = self.bottom.load(Ordering::Relaxed);
        let t = self.top.load(Ordering::Relaxed);
        b <= t
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }
}
