// src/ops.rs
//
// Transform requests.
// A request is fixed before any worker starts and only read afterwards.

use crate::error::{GrayPoolError, Result};

/// Wire selector for [`TransformMode::Negative`]
pub const MODE_NEGATIVE: i32 = 0;
/// Wire selector for [`TransformMode::Slice`]
pub const MODE_SLICE: i32 = 1;

/// Per-pixel transform applied by the workers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformMode {
    /// Photometric inversion against the fixed 8-bit ceiling
    Negative,
    /// Keep samples strictly inside (t1, t2), zero everything else
    Slice,
}

impl TransformMode {
    /// Parse a mode name. The Portuguese names `negativo` and `fatiamento`
    /// are accepted as aliases.
    pub fn from_str(mode: &str) -> Result<Self> {
        match mode.to_lowercase().as_str() {
            "negative" | "negativo" | "neg" => Ok(Self::Negative),
            "slice" | "fatiamento" => Ok(Self::Slice),
            other => Err(GrayPoolError::invalid_mode(other.to_string())),
        }
    }

    pub fn from_wire(selector: i32) -> Result<Self> {
        match selector {
            MODE_NEGATIVE => Ok(Self::Negative),
            MODE_SLICE => Ok(Self::Slice),
            other => Err(GrayPoolError::invalid_mode(other.to_string())),
        }
    }

    pub fn to_wire(self) -> i32 {
        match self {
            Self::Negative => MODE_NEGATIVE,
            Self::Slice => MODE_SLICE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Slice => "slice",
        }
    }
}

impl std::fmt::Display for TransformMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable transform configuration shared by every worker.
///
/// `t1` and `t2` are only meaningful for [`TransformMode::Slice`]; they are
/// kept as `i32` so thresholds outside the sample range compare naturally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransformRequest {
    pub mode: TransformMode,
    pub t1: i32,
    pub t2: i32,
}

impl TransformRequest {
    pub fn negative() -> Self {
        Self {
            mode: TransformMode::Negative,
            t1: 0,
            t2: 0,
        }
    }

    pub fn slice(t1: i32, t2: i32) -> Self {
        Self {
            mode: TransformMode::Slice,
            t1,
            t2,
        }
    }

    /// Build a request from a mode and optional thresholds.
    ///
    /// Slice without both thresholds is a configuration error. Thresholds
    /// passed with Negative are ignored.
    pub fn resolve(mode: TransformMode, t1: Option<i32>, t2: Option<i32>) -> Result<Self> {
        match mode {
            TransformMode::Negative => Ok(Self::negative()),
            TransformMode::Slice => {
                let t1 = t1.ok_or_else(|| GrayPoolError::missing_parameter("slice", "t1"))?;
                let t2 = t2.ok_or_else(|| GrayPoolError::missing_parameter("slice", "t2"))?;
                Ok(Self::slice(t1, t2))
            }
        }
    }

    /// Reject slice windows that cannot keep any sample.
    ///
    /// With `t1 >= t2` the interval (t1, t2) is empty and every pixel would be
    /// zeroed, which is never what a caller asked for.
    pub fn validate(&self) -> Result<()> {
        if self.mode == TransformMode::Slice && self.t1 >= self.t2 {
            return Err(GrayPoolError::invalid_argument(
                "t1",
                self.t1.to_string(),
                format!("Slice requires t1 < t2 (t2 = {})", self.t2),
            ));
        }
        Ok(())
    }
}

impl Default for TransformRequest {
    fn default() -> Self {
        Self::negative()
    }
}
