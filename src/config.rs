//! Scheduler configuration.
//!
//! Mirrors the teacher's layered `CoreConfig`/`WorkerConfig` pattern: a
//! plain, `Default`-implementing struct consumed once by `Scheduler::start`,
//! optionally loaded from a TOML file.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default deque capacity per worker (spec §3: "bounded by configuration
/// (`dqsize`, default 100,000)").
pub const DEFAULT_DQSIZE: usize = 100_000;

/// Default per-worker thread stack size.
pub const DEFAULT_STACK_SIZE_BYTES: usize = 2 * 1024 * 1024;

/// Configuration consumed by [`crate::scheduler::Scheduler::start`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Number of worker threads. `0` means "detect the number of hardware
    /// threads" (spec §4.D: "`W = 0` means detect the number of hardware
    /// threads").
    pub workers: usize,

    /// Capacity of each worker's deque. Spawning past this capacity is a
    /// fatal error (spec §3: "overflow is a fatal runtime error, not
    /// back-pressure").
    pub dqsize: usize,

    /// Stack size given to each worker's OS thread.
    pub stack_size_bytes: usize,

    /// Name prefix used for worker threads, visible in debuggers and
    /// panic messages.
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            dqsize: DEFAULT_DQSIZE,
            stack_size_bytes: DEFAULT_STACK_SIZE_BYTES,
            thread_name_prefix: "forkpool-worker".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Build a config for exactly `workers` threads with the default deque
    /// size, the common case for `start(W, dqsize)` callers that only care
    /// about worker count.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Resolve `workers == 0` to the detected hardware parallelism.
    pub fn resolved_worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }

    /// Parse a config from a TOML string. Unset fields fall back to
    /// [`SchedulerConfig::default`].
    pub fn from_toml_str(s: &str) -> Result<Self> {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Partial {
            workers: Option<usize>,
            dqsize: Option<usize>,
            stack_size_bytes: Option<usize>,
            thread_name_prefix: Option<String>,
        }

        let partial: Partial = toml::from_str(s).map_err(Error::Config)?;
        let default = Self::default();
        Ok(Self {
            workers: partial.workers.unwrap_or(default.workers),
            dqsize: partial.dqsize.unwrap_or(default.dqsize),
            stack_size_bytes: partial.stack_size_bytes.unwrap_or(default.stack_size_bytes),
            thread_name_prefix: partial
                .thread_name_prefix
                .unwrap_or(default.thread_name_prefix),
        })
    }

    /// Load a config from a TOML file on disk.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}
