// src/error.rs
//
// Unified error handling for graypool
// Uses thiserror for simple, type-safe error handling
//
// Error Taxonomy (by the phase of a run that failed):
// - Config: bad mode, missing parameters, invalid pool settings
// - Load: unreadable or malformed raster, oversize dimensions, allocation failure
// - Transport: short reads/writes on the byte stream, early closure
// - Dispatch: worker spawn/panic, internal partitioning defects
// - Save: encoder or filesystem failure while writing the result

use std::borrow::Cow;
use thiserror::Error;

/// The stage of a run an error belongs to.
///
/// Every fatal error maps to exactly one phase so the binaries can print a
/// diagnostic naming it and exit with a distinct status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Phase {
    /// Startup configuration, before any buffer is allocated
    Config,
    /// Reading or validating the input raster
    Load,
    /// Streaming bytes between the two processes
    Transport,
    /// Running the worker pool
    Dispatch,
    /// Writing the output raster
    Save,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Config => "config",
            Phase::Load => "load",
            Phase::Transport => "transport",
            Phase::Dispatch => "dispatch",
            Phase::Save => "save",
        }
    }

    /// Process exit status for a run that failed in this phase. Never zero.
    pub fn exit_code(&self) -> u8 {
        match self {
            Phase::Config => 2,
            Phase::Load => 3,
            Phase::Transport => 4,
            Phase::Dispatch => 5,
            Phase::Save => 6,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// graypool error types
#[derive(Debug, Error)]
pub enum GrayPoolError {
    // Configuration Errors
    #[error("Unknown transform mode: '{mode}'. Expected negative or slice")]
    InvalidMode { mode: Cow<'static, str> },

    #[error("Mode {mode} requires parameter {name}")]
    MissingParameter {
        mode: Cow<'static, str>,
        name: Cow<'static, str>,
    },

    #[error("Invalid value for {name}: {value}. {reason}")]
    InvalidArgument {
        name: Cow<'static, str>,
        value: Cow<'static, str>,
        reason: Cow<'static, str>,
    },

    // Load Errors
    #[error("Failed to read file '{path}': {source}")]
    FileReadFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode raster: {message}")]
    DecodeFailed { message: Cow<'static, str> },

    #[error("Invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: u64, height: u64 },

    #[error("Image dimension {dimension} exceeds maximum {max}")]
    DimensionExceedsLimit { dimension: u64, max: u64 },

    #[error("Image pixel count {pixels} exceeds maximum {max}")]
    PixelCountExceedsLimit { pixels: u64, max: u64 },

    #[error("Sample buffer holds {actual} bytes, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Failed to allocate {bytes} bytes for the {what} image")]
    AllocationFailed {
        what: Cow<'static, str>,
        bytes: usize,
    },

    // Transport Errors
    #[error("Connection closed early: received {received} of {expected} bytes")]
    ConnectionClosedEarly { received: usize, expected: usize },

    #[error("Transport {stage} failed: {source}")]
    TransportFailed {
        stage: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid wire header: {reason}")]
    InvalidHeader { reason: Cow<'static, str> },

    // Dispatch Errors
    #[error("Failed to spawn worker thread {worker}: {source}")]
    WorkerSpawnFailed {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker thread {worker} panicked: {message}")]
    WorkerPanicked {
        worker: usize,
        message: Cow<'static, str>,
    },

    #[error("Invalid task rows [{row_start}, {row_end}) for image height {height}")]
    InvalidTask {
        row_start: usize,
        row_end: usize,
        height: usize,
    },

    #[error("Internal error: {message}")]
    Internal { message: Cow<'static, str> },

    // Save Errors
    #[error("Failed to write file '{path}': {source}")]
    FileWriteFailed {
        path: Cow<'static, str>,
        #[source]
        source: std::io::Error,
    },
}

// Constructor Helpers
impl GrayPoolError {
    pub fn invalid_mode(mode: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidMode { mode: mode.into() }
    }

    pub fn missing_parameter(
        mode: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::MissingParameter {
            mode: mode.into(),
            name: name.into(),
        }
    }

    pub fn invalid_argument(
        name: impl Into<Cow<'static, str>>,
        value: impl Into<Cow<'static, str>>,
        reason: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn file_read_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn file_write_failed(path: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::FileWriteFailed {
            path: path.into(),
            source,
        }
    }

    pub fn decode_failed(message: impl Into<Cow<'static, str>>) -> Self {
        Self::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn invalid_dimensions(width: u64, height: u64) -> Self {
        Self::InvalidDimensions { width, height }
    }

    pub fn dimension_exceeds_limit(dimension: u64, max: u64) -> Self {
        Self::DimensionExceedsLimit { dimension, max }
    }

    pub fn pixel_count_exceeds_limit(pixels: u64, max: u64) -> Self {
        Self::PixelCountExceedsLimit { pixels, max }
    }

    pub fn buffer_size_mismatch(expected: usize, actual: usize) -> Self {
        Self::BufferSizeMismatch { expected, actual }
    }

    pub fn allocation_failed(what: impl Into<Cow<'static, str>>, bytes: usize) -> Self {
        Self::AllocationFailed {
            what: what.into(),
            bytes,
        }
    }

    pub fn connection_closed_early(received: usize, expected: usize) -> Self {
        Self::ConnectionClosedEarly { received, expected }
    }

    pub fn transport_failed(stage: impl Into<Cow<'static, str>>, source: std::io::Error) -> Self {
        Self::TransportFailed {
            stage: stage.into(),
            source,
        }
    }

    pub fn invalid_header(reason: impl Into<Cow<'static, str>>) -> Self {
        Self::InvalidHeader {
            reason: reason.into(),
        }
    }

    pub fn worker_spawn_failed(worker: usize, source: std::io::Error) -> Self {
        Self::WorkerSpawnFailed { worker, source }
    }

    pub fn worker_panicked(worker: usize, message: impl Into<Cow<'static, str>>) -> Self {
        Self::WorkerPanicked {
            worker,
            message: message.into(),
        }
    }

    pub fn invalid_task(row_start: usize, row_end: usize, height: usize) -> Self {
        Self::InvalidTask {
            row_start,
            row_end,
            height,
        }
    }

    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the phase of the run this error belongs to
    pub fn phase(&self) -> Phase {
        match self {
            Self::InvalidMode { .. }
            | Self::MissingParameter { .. }
            | Self::InvalidArgument { .. } => Phase::Config,

            // Note: allocation failure is classified as Load because both buffers
            // are allocated while the input is being materialized, before dispatch.
            Self::FileReadFailed { .. }
            | Self::DecodeFailed { .. }
            | Self::InvalidDimensions { .. }
            | Self::DimensionExceedsLimit { .. }
            | Self::PixelCountExceedsLimit { .. }
            | Self::BufferSizeMismatch { .. }
            | Self::AllocationFailed { .. } => Phase::Load,

            Self::ConnectionClosedEarly { .. }
            | Self::TransportFailed { .. }
            | Self::InvalidHeader { .. } => Phase::Transport,

            Self::WorkerSpawnFailed { .. }
            | Self::WorkerPanicked { .. }
            | Self::InvalidTask { .. }
            | Self::Internal { .. } => Phase::Dispatch,

            Self::FileWriteFailed { .. } => Phase::Save,
        }
    }

    /// Internal defects, as opposed to bad input or a broken environment
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvalidTask { .. } | Self::Internal { .. })
    }
}

// Result type alias
pub type Result<T> = std::result::Result<T, GrayPoolError>;
