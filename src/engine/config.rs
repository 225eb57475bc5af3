// src/engine/config.rs
//
// Pool sizing and resource limits.
//
// Resolution order: built-in defaults, then environment variables
// (GRAYPOOL_THREADS, GRAYPOOL_QUEUE_CAPACITY), then whatever the caller
// sets explicitly (the binaries apply CLI flags last).

use crate::engine::{DEFAULT_QUEUE_CAPACITY, DEFAULT_THREADS, MAX_DIMENSION, MAX_PIXELS};
use crate::error::{GrayPoolError, Result};
use tracing::warn;

pub const THREADS_ENV: &str = "GRAYPOOL_THREADS";
pub const QUEUE_CAPACITY_ENV: &str = "GRAYPOOL_QUEUE_CAPACITY";

/// Guards against allocating absurd buffers from a hostile or corrupt header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_dimension: u64,
    pub max_pixels: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dimension: MAX_DIMENSION,
            max_pixels: MAX_PIXELS,
        }
    }
}

impl Limits {
    pub fn unlimited() -> Self {
        Self {
            max_dimension: u64::MAX,
            max_pixels: u64::MAX,
        }
    }

    /// Zero dimensions are rejected as well as oversize ones.
    pub fn check(&self, width: u64, height: u64) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(GrayPoolError::invalid_dimensions(width, height));
        }
        if width > self.max_dimension || height > self.max_dimension {
            return Err(GrayPoolError::dimension_exceeds_limit(
                width.max(height),
                self.max_dimension,
            ));
        }
        let pixels = width.saturating_mul(height);
        if pixels > self.max_pixels {
            return Err(GrayPoolError::pixel_count_exceeds_limit(
                pixels,
                self.max_pixels,
            ));
        }
        Ok(())
    }
}

/// Settings for one dispatch run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker threads spawned per run
    pub threads: usize,
    /// Slots in the bounded task queue
    pub queue_capacity: usize,
    /// Fixed task height. `None` partitions into one task per worker.
    pub rows_per_task: Option<usize>,
    pub limits: Limits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            rows_per_task: None,
            limits: Limits::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `GRAYPOOL_THREADS` / `GRAYPOOL_QUEUE_CAPACITY`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(threads) = parse_env_usize(&lookup, THREADS_ENV) {
            config.threads = threads;
        }
        if let Some(capacity) = parse_env_usize(&lookup, QUEUE_CAPACITY_ENV) {
            config.queue_capacity = capacity;
        }
        config
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_rows_per_task(mut self, rows_per_task: Option<usize>) -> Self {
        self.rows_per_task = rows_per_task;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(GrayPoolError::invalid_argument(
                "threads",
                "0",
                "At least one worker thread is required",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(GrayPoolError::invalid_argument(
                "queue_capacity",
                "0",
                "Queue capacity must be at least 1",
            ));
        }
        if self.rows_per_task == Some(0) {
            return Err(GrayPoolError::invalid_argument(
                "rows_per_task",
                "0",
                "Tasks must span at least one row",
            ));
        }
        Ok(())
    }
}

fn parse_env_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let raw = lookup(key)?;
    match raw.trim().parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.threads, DEFAULT_THREADS);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup_from(&[
            (THREADS_ENV, "12"),
            (QUEUE_CAPACITY_ENV, " 3 "),
        ]));
        assert_eq!(config.threads, 12);
        assert_eq!(config.queue_capacity, 3);
    }

    #[test]
    fn test_env_garbage_falls_back_to_default() {
        let config = EngineConfig::from_lookup(lookup_from(&[(THREADS_ENV, "many")]));
        assert_eq!(config.threads, DEFAULT_THREADS);
    }

    #[test]
    fn test_validate_rejects_zeroes() {
        assert!(EngineConfig::default().with_threads(0).validate().is_err());
        assert!(EngineConfig::default()
            .with_queue_capacity(0)
            .validate()
            .is_err());
        assert!(EngineConfig::default()
            .with_rows_per_task(Some(0))
            .validate()
            .is_err());
    }

    #[test]
    fn test_limits_check() {
        let limits = Limits {
            max_dimension: 100,
            max_pixels: 1_000,
        };
        assert!(limits.check(10, 10).is_ok());
        assert!(matches!(
            limits.check(0, 10),
            Err(GrayPoolError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            limits.check(101, 1),
            Err(GrayPoolError::DimensionExceedsLimit { .. })
        ));
        assert!(matches!(
            limits.check(50, 50),
            Err(GrayPoolError::PixelCountExceedsLimit { .. })
        ));
    }
}
