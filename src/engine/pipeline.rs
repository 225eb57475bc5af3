// src/engine/pipeline.rs
//
// Per-pixel transforms. Pure functions over sample blocks; no pixel depends
// on its neighbours, so any row range can be processed independently.

use crate::engine::frame::Frame;
use crate::error::Result;
use crate::ops::{TransformMode, TransformRequest};

/// Complement constant for the negative transform.
///
/// This is the 8-bit ceiling, not the frame's declared max value: a frame
/// with `maxv = 200` still maps 0 to 255.
pub const NEGATIVE_CEILING: u8 = 255;

#[inline]
pub fn negative_pixel(v: u8) -> u8 {
    NEGATIVE_CEILING - v
}

/// Keep `v` when `t1 < v < t2`, otherwise black.
#[inline]
pub fn slice_pixel(v: u8, t1: i32, t2: i32) -> u8 {
    let s = i32::from(v);
    if s <= t1 || s >= t2 {
        0
    } else {
        v
    }
}

pub fn negative_block(input: &[u8], output: &mut [u8]) {
    debug_assert_eq!(input.len(), output.len());
    for (dst, &src) in output.iter_mut().zip(input) {
        *dst = negative_pixel(src);
    }
}

pub fn slice_block(input: &[u8], output: &mut [u8], t1: i32, t2: i32) {
    debug_assert_eq!(input.len(), output.len());
    for (dst, &src) in output.iter_mut().zip(input) {
        *dst = slice_pixel(src, t1, t2);
    }
}

/// Apply `request` to one block. `input` and `output` cover the same rows.
pub fn apply_block(request: &TransformRequest, input: &[u8], output: &mut [u8]) {
    match request.mode {
        TransformMode::Negative => negative_block(input, output),
        TransformMode::Slice => slice_block(input, output, request.t1, request.t2),
    }
}

/// Single-threaded reference: transform the whole frame on the caller's thread.
pub fn apply_serial(request: &TransformRequest, input: &Frame) -> Result<Frame> {
    let mut output = input.blank_like()?;
    apply_block(request, input.as_bytes(), output.as_bytes_mut());
    Ok(output)
}
