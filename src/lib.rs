//! forkpool — a fine-grained fork-join work-stealing task scheduler in the
//! Cilk tradition.
//!
//! Each worker owns a lock-free [`deque::Deque`] of [`frame::FrameRef`]s.
//! A task spawns children with [`scope::Scope::spawn`] (or the [`spawn!`]
//! macro), which pushes onto the owner's own deque, and joins them with
//! [`scope::Scope::sync`] (or [`sync!`]), which runs the child inline if it
//! was never stolen and otherwise helps steal other work until it
//! completes. Idle workers steal from a uniformly random sibling's deque.
//! See `SPEC_FULL.md` for the full design.
//!
//! ```ignore
//! use forkpool::{Scheduler, SchedulerConfig, spawn, sync};
//!
//! fn fib(scope: &forkpool::Scope<'_>, n: u64) -> u64 {
//!     if n < 2 {
//!         return n;
//!     }
//!     spawn!(scope, left, move |s: &forkpool::Scope<'_>| fib(s, n - 1));
//!     let right = fib(scope, n - 2);
//!     sync!(scope, left) + right
//! }
//!
//! let scheduler = Scheduler::start(SchedulerConfig::with_workers(4)).unwrap();
//! let result = scheduler.run(|scope| fib(scope, 20));
//! scheduler.stop();
//! assert_eq!(result, 6765);
//! ```

pub mod config;
pub mod deque;
pub mod error;
pub mod frame;
mod interrupt;
pub mod scheduler;
pub mod scope;
pub mod worker;

pub use config::SchedulerConfig;
pub use error::{Error, Result};
pub use scheduler::Scheduler;
pub use scope::Scope;
