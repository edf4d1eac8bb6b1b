//! Error types for the forkpool scheduler.

use thiserror::Error;

/// Result type alias for forkpool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors the scheduler can report through a `Result` rather than a process
/// abort.
///
/// Most scheduler-protocol violations (deque overflow, misnested sync, a
/// task body that itself panics) are, per spec, fatal and surface as a Rust
/// panic rather than a recoverable `Error` variant — there is nothing a
/// caller could do to recover mid-computation without corrupting the
/// fork-join invariants. This enum exists for the handful of places a
/// `Result` is actually meaningful: pool startup and configuration loading.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to start worker pool: {reason}")]
    PoolInit { reason: String },

    #[error("failed to parse scheduler configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
}
