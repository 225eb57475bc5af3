// src/engine/frame.rs
//
// In-memory 8-bit grayscale raster.

use crate::error::{GrayPoolError, Result};
use std::ops::Range;

/// Row-major single-channel raster with its declared maximum sample value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    width: usize,
    height: usize,
    max_value: u8,
    data: Vec<u8>,
}

/// Allocate a zeroed sample buffer, reporting failure instead of aborting.
pub(crate) fn alloc_samples(len: usize, what: &'static str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| GrayPoolError::allocation_failed(what, len))?;
    buf.resize(len, 0);
    Ok(buf)
}

/// `width * height` without overflow.
pub(crate) fn sample_count(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .ok_or_else(|| GrayPoolError::invalid_dimensions(width as u64, height as u64))
}

impl Frame {
    /// Wrap an existing sample buffer. `data` must hold exactly
    /// `width * height` bytes and both dimensions must be non-zero.
    pub fn new(width: usize, height: usize, max_value: u8, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GrayPoolError::invalid_dimensions(
                width as u64,
                height as u64,
            ));
        }
        let expected = sample_count(width, height)?;
        if data.len() != expected {
            return Err(GrayPoolError::buffer_size_mismatch(expected, data.len()));
        }
        Ok(Self {
            width,
            height,
            max_value,
            data,
        })
    }

    /// Build a frame by evaluating `f(x, y)` for every sample.
    pub fn from_fn(
        width: usize,
        height: usize,
        max_value: u8,
        mut f: impl FnMut(usize, usize) -> u8,
    ) -> Result<Self> {
        let mut data = alloc_samples(sample_count(width, height)?, "input")?;
        if width > 0 {
            for (y, row) in data.chunks_exact_mut(width).enumerate() {
                for (x, px) in row.iter_mut().enumerate() {
                    *px = f(x, y);
                }
            }
        }
        Self::new(width, height, max_value, data)
    }

    /// Fresh output frame with the same dimensions and max value.
    pub fn blank_like(&self) -> Result<Self> {
        let data = alloc_samples(self.data.len(), "output")?;
        Ok(Self {
            width: self.width,
            height: self.height,
            max_value: self.max_value,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn max_value(&self) -> u8 {
        self.max_value
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Samples of row `y`.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`. See [`Frame::get_rows`] for a checked lookup.
    pub fn row(&self, y: usize) -> &[u8] {
        self.rows(y..y + 1)
    }

    /// Samples of rows `rows`, contiguous because the layout is row-major.
    ///
    /// # Panics
    ///
    /// Panics if `rows.start > rows.end` or `rows.end > height`.
    pub fn rows(&self, rows: Range<usize>) -> &[u8] {
        &self.data[rows.start * self.width..rows.end * self.width]
    }

    /// Checked [`Frame::rows`]: `None` when the range is inverted or runs past
    /// the last row.
    pub fn get_rows(&self, rows: Range<usize>) -> Option<&[u8]> {
        if rows.start > rows.end || rows.end > self.height {
            return None;
        }
        Some(self.rows(rows))
    }
}
