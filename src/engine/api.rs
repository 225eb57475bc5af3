// src/engine/api.rs
//
// ImageWorker and the sender entry point.
// This is the public API the two command-line programs are built on.

use crate::engine::config::{EngineConfig, Limits};
use crate::engine::dispatch::{dispatch, DispatchReport};
use crate::engine::frame::Frame;
use crate::engine::io::{load_pgm, save_pgm};
use crate::engine::transport::{receive_header, receive_payload, send_frame, WireHeader};
use crate::error::Result;
use crate::ops::{TransformMode, TransformRequest};
use crate::{duration_ms, RunMetrics};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Transform settings given locally to the worker.
///
/// Anything left `None` falls back to what the sender put in the header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestOverrides {
    pub mode: Option<TransformMode>,
    pub t1: Option<i32>,
    pub t2: Option<i32>,
}

impl RequestOverrides {
    /// Merge with the header's suggestion and validate the result.
    ///
    /// Header thresholds only count when the header itself asked for Slice.
    pub fn resolve(&self, header: &WireHeader) -> Result<TransformRequest> {
        let suggested = TransformMode::from_wire(header.mode)?;
        let mode = self.mode.unwrap_or(suggested);
        let (t1, t2) = match suggested {
            TransformMode::Slice => (
                self.t1.or(Some(header.t1)),
                self.t2.or(Some(header.t2)),
            ),
            TransformMode::Negative => (self.t1, self.t2),
        };
        let request = TransformRequest::resolve(mode, t1, t2)?;
        request.validate()?;
        Ok(request)
    }

    /// The request these overrides pin down on their own, if any.
    ///
    /// A local Negative, or a local Slice with both thresholds, no longer
    /// depends on the header and can be validated before anything is read.
    pub fn settled(&self) -> Result<Option<TransformRequest>> {
        let request = match (self.mode, self.t1, self.t2) {
            (Some(TransformMode::Negative), _, _) => TransformRequest::negative(),
            (Some(TransformMode::Slice), Some(t1), Some(t2)) => TransformRequest::slice(t1, t2),
            _ => return Ok(None),
        };
        request.validate()?;
        Ok(Some(request))
    }
}

/// Receives one frame, transforms it on a worker pool, and saves the result.
///
/// Usage:
/// ```no_run
/// use graypool::{EngineConfig, ImageWorker};
///
/// let worker = ImageWorker::new(EngineConfig::from_env().with_threads(8));
/// let mut pipe = graypool::engine::open_fifo_reader("/tmp/graypool.fifo")?;
/// let metrics = worker.serve(&mut pipe, "out.pgm")?;
/// println!("{metrics}");
/// # Ok::<(), graypool::GrayPoolError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct ImageWorker {
    config: EngineConfig,
    overrides: RequestOverrides,
}

impl ImageWorker {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            overrides: RequestOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: RequestOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Transform an in-memory frame.
    pub fn process(&self, frame: &Frame, request: &TransformRequest) -> Result<(Frame, DispatchReport)> {
        dispatch(frame, request, &self.config)
    }

    /// Reject whatever can be rejected without the sender: pool settings and
    /// any request the overrides settle on their own.
    pub fn preflight(&self) -> Result<()> {
        self.config.validate()?;
        self.overrides.settled()?;
        Ok(())
    }

    /// Full worker run: receive from `reader`, dispatch, save to `output`.
    ///
    /// Configuration errors surface before the input buffer is allocated:
    /// local settings before anything is read, header-dependent ones right
    /// after the header.
    pub fn serve<R: Read>(&self, reader: &mut R, output: impl AsRef<Path>) -> Result<RunMetrics> {
        self.preflight()?;
        let started = Instant::now();

        let header = receive_header(reader, &self.config.limits)?;
        let request = self.overrides.resolve(&header)?;
        let input = receive_payload(reader, &header)?;
        let received = Instant::now();

        let (result, report) = self.process(&input, &request)?;
        drop(input);
        let transformed = Instant::now();

        save_pgm(output, &result)?;
        let saved = Instant::now();

        let metrics = RunMetrics {
            receive_ms: duration_ms(received - started),
            transform_ms: duration_ms(transformed - received),
            save_ms: duration_ms(saved - transformed),
            total_ms: duration_ms(saved - started),
            width: result.width(),
            height: result.height(),
            tasks: report.tasks.len(),
            threads: report.pool.threads,
            processed_per_worker: report.pool.processed_per_worker,
            ..RunMetrics::default()
        };
        info!(mode = %request.mode, total_ms = metrics.total_ms, "worker run finished");
        Ok(metrics)
    }
}

/// Load the PGM at `input` and stream it to `writer` with `request` in the header.
///
/// Returns the number of sample bytes sent.
pub fn send_file<W: Write>(
    writer: &mut W,
    input: impl AsRef<Path>,
    request: &TransformRequest,
    limits: &Limits,
) -> Result<usize> {
    request.validate()?;
    let frame = load_pgm(input, limits)?;
    send_frame(writer, &frame, request)?;
    Ok(frame.len())
}
