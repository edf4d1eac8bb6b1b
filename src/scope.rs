//! SPAWN / SYNC / CALL (spec §4.E "Spawn/Sync primitives").
//!
//! `Scope` is the handle a running task body uses to fork children and join
//! on them. It borrows the executing worker and the pool for the duration
//! of one frame's body, and is re-created fresh by [`crate::frame::Frame::run`]
//! for every task — it carries no state of its own beyond those two
//! references.
//!
//! The `spawn!`/`sync!`/`call!`/`run!` macros below are the "macro-like
//! surface" spec §6 asks for: `spawn!` declares the [`crate::frame::Frame`]
//! as a local in the caller's own stack frame (mirroring the reference
//! implementation's bump-allocated frame array with zero extra allocation)
//! and pushes it; `sync!` joins on that same local.

use crate::frame::Frame;
use crate::interrupt;
use crate::scheduler::Pool;
use crate::worker::Worker;

/// Borrowed execution context for one running task body (spec §4.E).
pub struct Scope<'a> {
    worker: &'a Worker,
    pool: &'a Pool,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(worker: &'a Worker, pool: &'a Pool) -> Self {
        Self { worker, pool }
    }

    /// Id of the worker currently running this task body.
    pub fn worker_id(&self) -> usize {
        self.worker.id()
    }

    /// `SPAWN(frame)` (spec §4.E): push `frame` onto the current worker's
    /// deque and return immediately without running it. Prefer the
    /// [`crate::spawn!`] macro, which also constructs the frame as a local.
    pub fn spawn<R: Send + 'static>(&self, frame: &Frame<R>) {
        debug_assert_eq!(
            frame.owner(),
            self.worker.id(),
            "a frame must be spawned by the worker that owns it"
        );
        frame.mark_pushed();
        // SAFETY: `frame` outlives the matching `sync` call by construction
        // — the `spawn!`/`sync!` macros bind it to a local that is not
        // dropped until after `sync!` runs (spec invariant 4, strict LIFO
        // nesting of SPAWN/SYNC within one task body).
        let frame_ref = unsafe { frame.as_ref() };
        self.worker.deque.push_bottom(frame_ref);
        self.worker.mark_nonempty();
    }

    /// `SYNC(frame)` (spec §4.E): join on a previously spawned frame.
    ///
    /// Fast path: if `pop_bottom` still finds `frame` at the bottom of the
    /// deque, it was never stolen, so run it inline now. Slow path: it was
    /// stolen, so cooperatively steal other work until its tag becomes
    /// `Done` (spec §4.A, §4.F).
    pub fn sync<R: Send + 'static>(&self, frame: &Frame<R>) -> R {
        match self.worker.deque.pop_bottom() {
            Some(popped) => {
                // Not stolen: `pop_bottom` should have handed back exactly
                // the frame we just pushed, since SPAWN/SYNC nest strictly
                // LIFO (spec invariant 4). Confirm that identity rather than
                // trusting nesting blindly — a caller that syncs out of
                // order (spec §7 "misnested sync") would otherwise silently
                // run the wrong frame here.
                //
                // SAFETY: `frame` is still alive (it is the caller's own
                // local), so reconstructing its `FrameRef` just for this
                // pointer comparison is sound.
                let expected = unsafe { frame.as_ref() };
                debug_assert_eq!(
                    popped, expected,
                    "misnested SYNC: popped frame does not match the most recent SPAWN"
                );
                frame.run(self.worker, self.pool);
            }
            None => interrupt::wait_until_done(frame, self.worker, self.pool),
        }
        if self.worker.deque.is_empty() {
            self.worker.mark_empty();
        }
        frame.take_result()
    }

    /// `CALL(fn, args...)` (spec §4.E): run `body` inline, as an ordinary
    /// function call, but through a freshly constructed frame so a nested
    /// `SPAWN` inside it sees a consistent worker context. Never touches
    /// the deque — there is nothing for a thief to steal.
    pub fn call<R, F>(&self, body: F) -> R
    where
        R: Send + 'static,
        F: FnOnce(&Scope<'_>) -> R + Send + 'static,
    {
        let frame = Frame::new(self.worker.id(), body);
        frame.run(self.worker, self.pool);
        frame.take_result()
    }
}

/// `SPAWN` sugar (spec §4.E / §6): declares `$frame` as a local binding in
/// the caller's own stack frame, then spawns it.
///
/// ```ignore
/// spawn!(scope, left, move |s: &Scope<'_>| fib(s, n - 1));
/// ```
#[macro_export]
macro_rules! spawn {
    ($scope:expr, $frame:ident, $body:expr) => {
        let $frame = $crate::frame::Frame::new($scope.worker_id(), $body);
        $scope.spawn(&$frame);
    };
}

/// `SYNC` sugar: joins on a frame declared by [`spawn!`].
#[macro_export]
macro_rules! sync {
    ($scope:expr, $frame:ident) => {
        $scope.sync(&$frame)
    };
}

/// `CALL` sugar.
#[macro_export]
macro_rules! call {
    ($scope:expr, $body:expr) => {
        $scope.call($body)
    };
}

/// `RUN` sugar over [`crate::scheduler::Scheduler::run`].
#[macro_export]
macro_rules! run {
    ($scheduler:expr, $body:expr) => {
        $scheduler.run($body)
    };
}
