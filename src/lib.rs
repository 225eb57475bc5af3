// lib.rs
//
// graypool: parallel grayscale transforms fed over a named pipe
//
// Design goals:
// - One fixed pool of worker threads per run, drained from a bounded queue
// - Workers write disjoint output rows without locking
// - Orderly shutdown: completion barrier first, then close the queue, then join
// - Every fatal error names the phase of the run that failed

pub mod engine;
pub mod error;
pub mod ops;

pub use engine::{EngineConfig, Frame, ImageWorker, RequestOverrides};
pub use error::{GrayPoolError, Phase, Result};
pub use ops::{TransformMode, TransformRequest};

use std::fmt;
use std::time::Duration;

/// Metrics payload version. Bump when fields change meaning.
pub const RUN_METRICS_VERSION: &str = "1.0.0";

/// Timing and sizing of one worker run
#[derive(Clone, Debug, PartialEq)]
pub struct RunMetrics {
    /// Schema version for compatibility checks
    pub version: String,
    /// Header plus samples read from the transport, in milliseconds
    pub receive_ms: f64,
    /// Dispatch through the worker pool, in milliseconds
    pub transform_ms: f64,
    /// Encoding and writing the output file, in milliseconds
    pub save_ms: f64,
    /// Total wall-clock duration in milliseconds
    pub total_ms: f64,
    pub width: usize,
    pub height: usize,
    /// Row-range tasks queued
    pub tasks: usize,
    /// Worker threads spawned
    pub threads: usize,
    /// Tasks completed by each worker, indexed by worker id
    pub processed_per_worker: Vec<usize>,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self {
            version: RUN_METRICS_VERSION.to_string(),
            receive_ms: 0.0,
            transform_ms: 0.0,
            save_ms: 0.0,
            total_ms: 0.0,
            width: 0,
            height: 0,
            tasks: 0,
            threads: 0,
            processed_per_worker: Vec::new(),
        }
    }
}

impl RunMetrics {
    /// Processing time in seconds, as reported on the command line.
    ///
    /// Covers the whole run from the first header byte to the saved file,
    /// not just the transform.
    pub fn processing_secs(&self) -> f64 {
        self.total_ms / 1000.0
    }
}

impl fmt::Display for RunMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} in {} tasks on {} threads: receive {:.3} ms, transform {:.3} ms, save {:.3} ms, total {:.3} ms",
            self.width,
            self.height,
            self.tasks,
            self.threads,
            self.receive_ms,
            self.transform_ms,
            self.save_ms,
            self.total_ms
        )
    }
}

/// Milliseconds in `d` as a float, the unit every metric uses.
pub(crate) fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Install the global `tracing` subscriber for the command-line programs.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug` when
/// `verbose` is on. Safe to call more than once.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init();
}
