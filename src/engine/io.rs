// src/engine/io.rs
//
// I/O operations: binary PGM (P5) loading and saving.
//
// The header is parsed by the `image` crate's PNM decoder (comments and
// arbitrary whitespace are handled there). Samples are then read straight
// from the same reader so they reach the workers exactly as stored, with no
// rescaling to the 8-bit range.

use crate::engine::config::Limits;
use crate::engine::frame::{alloc_samples, sample_count, Frame};
use crate::error::{GrayPoolError, Result};
use image::codecs::pnm::{PnmDecoder, PnmSubtype, SampleEncoding};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Cursor, ErrorKind, Write};
use std::path::Path;
use tracing::{debug, info};

/// Decode a binary graymap from `reader`.
pub fn decode_pgm<R: BufRead>(reader: R, limits: &Limits) -> Result<Frame> {
    let decoder = PnmDecoder::new(reader)
        .map_err(|e| GrayPoolError::decode_failed(format!("invalid PGM header: {e}")))?;
    let (mut reader, header) = decoder.into_inner();

    match header.subtype() {
        PnmSubtype::Graymap(SampleEncoding::Binary) => {}
        other => {
            return Err(GrayPoolError::decode_failed(format!(
                "expected binary graymap (P5), found {other:?}"
            )))
        }
    }

    let max_value = header.maximal_sample();
    if max_value == 0 || max_value > u32::from(u8::MAX) {
        return Err(GrayPoolError::decode_failed(format!(
            "unsupported max sample value {max_value}; only 8-bit graymaps are handled"
        )));
    }

    let (width, height) = (u64::from(header.width()), u64::from(header.height()));
    limits.check(width, height)?;
    let (width, height) = (width as usize, height as usize);

    let mut data = alloc_samples(sample_count(width, height)?, "input")?;
    reader.read_exact(&mut data).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => GrayPoolError::decode_failed(format!(
            "truncated raster: expected {} sample bytes",
            data.len()
        )),
        _ => GrayPoolError::decode_failed(format!("failed to read samples: {e}")),
    })?;

    debug!(width, height, max_value, "decoded PGM");
    Frame::new(width, height, max_value as u8, data)
}

/// Decode a PGM held in memory.
pub fn decode_pgm_bytes(bytes: &[u8], limits: &Limits) -> Result<Frame> {
    decode_pgm(Cursor::new(bytes), limits)
}

/// Load a PGM file from disk.
pub fn load_pgm(path: impl AsRef<Path>, limits: &Limits) -> Result<Frame> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| GrayPoolError::file_read_failed(path.display().to_string(), e))?;
    let frame = decode_pgm(BufReader::new(file), limits)?;
    info!(
        path = %path.display(),
        width = frame.width(),
        height = frame.height(),
        max_value = frame.max_value(),
        "loaded image"
    );
    Ok(frame)
}

fn pgm_header(frame: &Frame) -> String {
    format!(
        "P5\n{} {}\n{}\n",
        frame.width(),
        frame.height(),
        frame.max_value()
    )
}

/// Write `frame` as a binary graymap, keeping its declared max value.
pub fn encode_pgm<W: Write>(mut writer: W, frame: &Frame) -> std::io::Result<()> {
    writer.write_all(pgm_header(frame).as_bytes())?;
    writer.write_all(frame.as_bytes())?;
    writer.flush()
}

/// Encode to an in-memory buffer.
pub fn encode_pgm_bytes(frame: &Frame) -> Vec<u8> {
    let mut out = pgm_header(frame).into_bytes();
    out.reserve_exact(frame.len());
    out.extend_from_slice(frame.as_bytes());
    out
}

/// Save `frame` to `path`, replacing any existing file.
pub fn save_pgm(path: impl AsRef<Path>, frame: &Frame) -> Result<()> {
    let path = path.as_ref();
    let write_err = |e| GrayPoolError::file_write_failed(path.display().to_string(), e);
    let file = File::create(path).map_err(write_err)?;
    encode_pgm(BufWriter::new(file), frame).map_err(write_err)?;
    info!(path = %path.display(), bytes = frame.len(), "saved image");
    Ok(())
}
