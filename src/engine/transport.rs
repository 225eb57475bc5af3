// src/engine/transport.rs
//
// Byte-stream transport between the sender and the worker process.
//
// Wire format: a fixed 24-byte header of six native-endian i32 values
// (width, height, max value, mode selector, t1, t2) followed by exactly
// width * height sample bytes. No framing, versioning, or checksum; both
// ends are assumed to share the same native layout.
//
// Pipes deliver data in arbitrarily small pieces, so every read and write
// loops until the declared byte count is satisfied.

use crate::engine::config::Limits;
use crate::engine::frame::{alloc_samples, sample_count, Frame};
use crate::error::{GrayPoolError, Result};
use crate::ops::{TransformMode, TransformRequest};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Size of the encoded [`WireHeader`].
pub const HEADER_LEN: usize = 6 * std::mem::size_of::<i32>();

/// Bytes written per call when streaming samples.
const SEND_CHUNK: usize = 64 * 1024;

/// Metadata record sent ahead of the samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireHeader {
    pub width: i32,
    pub height: i32,
    pub max_value: i32,
    pub mode: i32,
    pub t1: i32,
    pub t2: i32,
}

impl WireHeader {
    /// Header describing `frame`, carrying `request` as the suggested transform.
    pub fn for_frame(frame: &Frame, request: &TransformRequest) -> Result<Self> {
        let to_i32 = |name: &'static str, v: usize| {
            i32::try_from(v).map_err(|_| {
                GrayPoolError::invalid_header(format!("{name} {v} does not fit the wire format"))
            })
        };
        Ok(Self {
            width: to_i32("width", frame.width())?,
            height: to_i32("height", frame.height())?,
            max_value: i32::from(frame.max_value()),
            mode: request.mode.to_wire(),
            t1: request.t1,
            t2: request.t2,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        let fields = [
            self.width,
            self.height,
            self.max_value,
            self.mode,
            self.t1,
            self.t2,
        ];
        for (chunk, field) in out.chunks_exact_mut(4).zip(fields) {
            chunk.copy_from_slice(&field.to_ne_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Self {
        let mut fields = bytes
            .chunks_exact(4)
            .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]));
        let mut next = || fields.next().unwrap_or_default();
        Self {
            width: next(),
            height: next(),
            max_value: next(),
            mode: next(),
            t1: next(),
            t2: next(),
        }
    }

    /// Check the header before any buffer is sized from it.
    pub fn validate(&self, limits: &Limits) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(GrayPoolError::invalid_header(format!(
                "non-positive dimensions {}x{}",
                self.width, self.height
            )));
        }
        if !(1..=255).contains(&self.max_value) {
            return Err(GrayPoolError::invalid_header(format!(
                "max value {} outside 1..=255",
                self.max_value
            )));
        }
        if TransformMode::from_wire(self.mode).is_err() {
            return Err(GrayPoolError::invalid_header(format!(
                "unknown mode selector {}",
                self.mode
            )));
        }
        limits.check(self.width as u64, self.height as u64)
    }

    /// Transform suggested by the sender.
    pub fn request(&self) -> Result<TransformRequest> {
        let mode = TransformMode::from_wire(self.mode)?;
        TransformRequest::resolve(mode, Some(self.t1), Some(self.t2))
    }

    /// Number of sample bytes that follow the header. Call after `validate`.
    pub fn payload_len(&self) -> Result<usize> {
        sample_count(self.width.max(0) as usize, self.height.max(0) as usize)
    }
}

/// Fill `buf` completely from `reader`.
///
/// A zero-length read before `buf` is full means the peer closed the stream
/// early and is reported as [`GrayPoolError::ConnectionClosedEarly`].
pub fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut received = 0;
    while received < buf.len() {
        match reader.read(&mut buf[received..]) {
            Ok(0) => {
                return Err(GrayPoolError::connection_closed_early(received, buf.len()));
            }
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(GrayPoolError::transport_failed("read", e)),
        }
    }
    Ok(())
}

/// Write all of `buf`, looping over short writes.
pub fn write_full<W: Write>(writer: &mut W, buf: &[u8]) -> Result<()> {
    write_full_with_progress(writer, buf, |_, _| {})
}

/// [`write_full`] that reports `(written, total)` after every successful write.
pub fn write_full_with_progress<W: Write>(
    writer: &mut W,
    buf: &[u8],
    mut on_progress: impl FnMut(usize, usize),
) -> Result<()> {
    let mut written = 0;
    while written < buf.len() {
        let end = (written + SEND_CHUNK).min(buf.len());
        match writer.write(&buf[written..end]) {
            Ok(0) => {
                return Err(GrayPoolError::transport_failed(
                    "write",
                    std::io::Error::new(
                        ErrorKind::WriteZero,
                        format!("peer accepted {written} of {} bytes", buf.len()),
                    ),
                ));
            }
            Ok(n) => {
                written += n;
                on_progress(written, buf.len());
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(GrayPoolError::transport_failed("write", e)),
        }
    }
    Ok(())
}

/// Read and validate the header only. Nothing is allocated from it yet, so
/// the caller can still reject the run before the payload is touched.
pub fn receive_header<R: Read>(reader: &mut R, limits: &Limits) -> Result<WireHeader> {
    let mut raw = [0u8; HEADER_LEN];
    read_full(reader, &mut raw)?;
    let header = WireHeader::from_bytes(&raw);
    header.validate(limits)?;
    debug!(?header, "received wire header");
    Ok(header)
}

/// Read the samples announced by an already validated `header`.
pub fn receive_payload<R: Read>(reader: &mut R, header: &WireHeader) -> Result<Frame> {
    let mut data = alloc_samples(header.payload_len()?, "input")?;
    read_full(reader, &mut data)?;

    let frame = Frame::new(
        header.width as usize,
        header.height as usize,
        header.max_value as u8,
        data,
    )?;
    info!(
        width = frame.width(),
        height = frame.height(),
        bytes = frame.len(),
        "received image"
    );
    Ok(frame)
}

/// Read a header and its samples. The header is validated against `limits`
/// before the input buffer is allocated.
pub fn receive_frame<R: Read>(reader: &mut R, limits: &Limits) -> Result<(WireHeader, Frame)> {
    let header = receive_header(reader, limits)?;
    let frame = receive_payload(reader, &header)?;
    Ok((header, frame))
}

/// Send `frame` preceded by a header carrying `request`.
pub fn send_frame<W: Write>(writer: &mut W, frame: &Frame, request: &TransformRequest) -> Result<()> {
    let header = WireHeader::for_frame(frame, request)?;
    write_full(writer, &header.to_bytes())?;
    debug!(?header, "sent wire header");

    let total = frame.len();
    let mut next_report = 0;
    write_full_with_progress(writer, frame.as_bytes(), |written, total| {
        let percent = written * 100 / total.max(1);
        if percent >= next_report {
            debug!(written, total, percent, "sending samples");
            next_report = percent + 10;
        }
    })?;
    writer
        .flush()
        .map_err(|e| GrayPoolError::transport_failed("flush", e))?;
    info!(bytes = total, "image sent");
    Ok(())
}

/// Create a named pipe at `path` (mode 0777). An existing entry is reused.
#[cfg(unix)]
pub fn create_fifo(path: impl AsRef<Path>) -> Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let path = path.as_ref();
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        GrayPoolError::invalid_argument(
            "fifo",
            path.display().to_string(),
            "Path must not contain NUL bytes",
        )
    })?;
    // SAFETY: c_path is a valid NUL-terminated string that outlives the call.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o777) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() != ErrorKind::AlreadyExists {
            return Err(GrayPoolError::transport_failed("mkfifo", err));
        }
        debug!(path = %path.display(), "fifo already exists, reusing it");
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn create_fifo(path: impl AsRef<Path>) -> Result<()> {
    let _ = path;
    Err(GrayPoolError::transport_failed(
        "mkfifo",
        std::io::Error::new(ErrorKind::Unsupported, "named pipes require a unix host"),
    ))
}

/// Open the read end. Blocks until a writer opens the pipe.
pub fn open_fifo_reader(path: impl AsRef<Path>) -> Result<File> {
    File::open(path.as_ref()).map_err(|e| GrayPoolError::transport_failed("open for reading", e))
}

/// Open the write end. Blocks until a reader opens the pipe.
pub fn open_fifo_writer(path: impl AsRef<Path>) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .open(path.as_ref())
        .map_err(|e| GrayPoolError::transport_failed("open for writing", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reader that hands out at most `step` bytes per call.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    /// Writer that accepts at most `step` bytes per call.
    struct Narrow {
        out: Vec<u8>,
        step: usize,
    }

    impl Write for Narrow {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len());
            self.out.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Full;

    impl Write for Full {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sample_header() -> WireHeader {
        WireHeader {
            width: 3,
            height: 2,
            max_value: 255,
            mode: 1,
            t1: 50,
            t2: 200,
        }
    }

    #[test]
    fn test_header_layout_is_six_native_ints() {
        let bytes = sample_header().to_bytes();
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..4], &3i32.to_ne_bytes());
        assert_eq!(&bytes[20..24], &200i32.to_ne_bytes());
        assert_eq!(WireHeader::from_bytes(&bytes), sample_header());
    }

    #[test]
    fn test_header_validate() {
        let limits = Limits::default();
        assert!(sample_header().validate(&limits).is_ok());
        let bad = [
            WireHeader { width: 0, ..sample_header() },
            WireHeader { height: -4, ..sample_header() },
            WireHeader { max_value: 0, ..sample_header() },
            WireHeader { max_value: 256, ..sample_header() },
            WireHeader { mode: 9, ..sample_header() },
        ];
        for header in bad {
            assert!(header.validate(&limits).is_err(), "{header:?}");
        }
    }

    #[test]
    fn test_header_request() {
        assert_eq!(
            sample_header().request().unwrap(),
            TransformRequest::slice(50, 200)
        );
    }

    #[test]
    fn test_read_full_accumulates_partial_reads() {
        let data: Vec<u8> = (0..100).collect();
        let mut reader = Trickle { data: &data, step: 7 };
        let mut buf = vec![0u8; 100];
        read_full(&mut reader, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_read_full_reports_early_close() {
        let mut reader = Cursor::new(vec![1u8, 2, 3]);
        let mut buf = [0u8; 8];
        match read_full(&mut reader, &mut buf).unwrap_err() {
            GrayPoolError::ConnectionClosedEarly { received, expected } => {
                assert_eq!((received, expected), (3, 8));
            }
            other => panic!("expected ConnectionClosedEarly, got {other:?}"),
        }
    }

    #[test]
    fn test_write_full_loops_over_short_writes() {
        let data: Vec<u8> = (0..=255).collect();
        let mut writer = Narrow { out: Vec::new(), step: 5 };
        let mut calls = 0;
        write_full_with_progress(&mut writer, &data, |_, _| calls += 1).unwrap();
        assert_eq!(writer.out, data);
        assert_eq!(calls, 256usize.div_ceil(5));
    }

    #[test]
    fn test_write_full_zero_write_is_transport_error() {
        let err = write_full(&mut Full, &[1, 2, 3]).unwrap_err();
        assert_eq!(err.phase(), crate::error::Phase::Transport);
    }

    #[test]
    fn test_send_then_receive_through_trickle() {
        let frame = Frame::from_fn(5, 4, 255, |x, y| (x * 40 + y) as u8).unwrap();
        let mut wire = Narrow { out: Vec::new(), step: 3 };
        send_frame(&mut wire, &frame, &TransformRequest::negative()).unwrap();

        let mut reader = Trickle { data: &wire.out, step: 2 };
        let (header, received) = receive_frame(&mut reader, &Limits::default()).unwrap();
        assert_eq!(header.mode, 0);
        assert_eq!(received, frame);
    }

    #[test]
    fn test_receive_truncated_payload() {
        let mut bytes = sample_header().to_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        let err = receive_frame(&mut Cursor::new(bytes), &Limits::default()).unwrap_err();
        assert!(matches!(
            err,
            GrayPoolError::ConnectionClosedEarly {
                received: 3,
                expected: 6
            }
        ));
    }

    #[test]
    fn test_receive_rejects_oversize_header_before_allocating() {
        let header = WireHeader {
            width: 1 << 20,
            height: 1 << 20,
            ..sample_header()
        };
        let err = receive_frame(&mut Cursor::new(header.to_bytes()), &Limits::default()).unwrap_err();
        assert!(matches!(err, GrayPoolError::DimensionExceedsLimit { .. }));
    }

    #[test]
    fn test_receive_header_leaves_payload_unread() {
        let mut bytes = sample_header().to_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3, 4, 5, 6]);
        let mut reader = Cursor::new(bytes);
        let header = receive_header(&mut reader, &Limits::default()).unwrap();
        assert_eq!(reader.position(), HEADER_LEN as u64);

        let frame = receive_payload(&mut reader, &header).unwrap();
        assert_eq!(frame.as_bytes(), &[1, 2, 3, 4, 5, 6]);
    }

    #[cfg(unix)]
    #[test]
    fn test_create_fifo_is_idempotent() {
        use std::os::unix::fs::FileTypeExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipe");
        create_fifo(&path).unwrap();
        create_fifo(&path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().file_type().is_fifo());
    }
}
