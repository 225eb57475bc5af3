// src/engine.rs
//
// The core of graypool. A single-shot parallel pipeline that:
// 1. Receives (or loads) one grayscale raster
// 2. Splits it into row-range tasks fed through a bounded queue
// 3. Lets a fixed pool of workers transform disjoint rows in place
// 4. Waits on a completion barrier, shuts the pool down and hands the result back
//
// This file is a facade over the modules in engine/

// =============================================================================
// SECURITY LIMITS
// =============================================================================

/// Maximum allowed image dimension (width or height).
/// Headers declaring more than this are rejected before any buffer is sized.
pub const MAX_DIMENSION: u64 = 32768;

/// Maximum allowed total pixels (width * height).
/// 100 megapixels = 100MB per 8-bit buffer, and a run holds two of them.
pub const MAX_PIXELS: u64 = 100_000_000;

// =============================================================================
// POOL DEFAULTS
// =============================================================================

/// Worker threads when neither the environment nor the CLI says otherwise.
pub const DEFAULT_THREADS: usize = 4;

/// Task queue slots. Bounds how far the dispatcher can run ahead of the workers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

// =============================================================================
// MODULE DECOMPOSITION
// =============================================================================

mod api;
mod barrier;
mod config;
mod dispatch;
mod frame;
mod io;
mod pipeline;
mod pool;
mod queue;
mod tasks;
mod transport;

pub use api::{send_file, ImageWorker, RequestOverrides};
pub use barrier::CompletionBarrier;
pub use config::{EngineConfig, Limits, QUEUE_CAPACITY_ENV, THREADS_ENV};
pub use dispatch::{carve_jobs, dispatch, plan_tasks, DispatchReport, RowJob};
pub use frame::Frame;
pub use io::{decode_pgm, decode_pgm_bytes, encode_pgm, encode_pgm_bytes, load_pgm, save_pgm};
pub use pipeline::{
    apply_block, apply_serial, negative_block, negative_pixel, slice_block, slice_pixel,
    NEGATIVE_CEILING,
};
pub use pool::{PoolStats, WorkerPool};
pub use queue::{BoundedTaskQueue, Closed};
pub use tasks::{partition_rows, split_rows, verify_partition, Task};
pub use transport::{
    create_fifo, open_fifo_reader, open_fifo_writer, read_full, receive_frame, receive_header,
    receive_payload, send_frame, write_full, write_full_with_progress, WireHeader, HEADER_LEN,
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::TransformRequest;

    #[test]
    fn test_limits_default_to_security_constants() {
        let limits = Limits::default();
        assert_eq!(limits.max_dimension, MAX_DIMENSION);
        assert_eq!(limits.max_pixels, MAX_PIXELS);
    }

    #[test]
    fn test_dispatch_matches_serial_for_both_modes() {
        let input = Frame::from_fn(33, 17, 255, |x, y| ((x * 7 + y * 13) % 256) as u8).unwrap();
        let config = EngineConfig::default().with_threads(5);
        for request in [TransformRequest::negative(), TransformRequest::slice(60, 190)] {
            let (parallel, _) = dispatch(&input, &request, &config).unwrap();
            assert_eq!(parallel, apply_serial(&request, &input).unwrap());
        }
    }
}
