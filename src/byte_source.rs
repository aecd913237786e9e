//! Pull-stream abstraction and the buffered reader built on top of it (§4.1).
//!
//! `ByteSource` is a small, `Debug`-bound trait object seam that lets the
//! caller provide file-system, embedded, or network-backed bytes without
//! the core loader knowing which.

use std::fmt;

use crate::error::{Error, ErrorKind, Result};
use crate::options::{ProgressCallback, ProgressControl};

/// A pull-stream of bytes. Implementors need only support sequential reads;
/// the `Reader` below adds peeking, buffering, and progress reporting.
pub trait ByteSource: fmt::Debug {
    /// Reads up to `buf.len()` bytes, returning the number read (`0` means
    /// EOF). May return fewer than requested even before EOF.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Skips `n` bytes without necessarily materializing them.
    fn skip(&mut self, n: u64) -> std::io::Result<()> {
        let mut remaining = n;
        let mut scratch = [0u8; 4096];
        while remaining > 0 {
            let chunk = remaining.min(scratch.len() as u64) as usize;
            let read = self.read(&mut scratch[..chunk])?;
            if read == 0 {
                break;
            }
            remaining -= read as u64;
        }
        Ok(())
    }

    /// Total size, if known in advance.
    fn size(&self) -> Option<u64> {
        None
    }
}

/// A `ByteSource` over an in-memory slice, the common case for embedded
/// assets and for tests.
#[derive(Debug)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceSource<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> ByteSource for SliceSource<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let remaining = &self.data[self.pos.min(self.data.len())..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }

    fn size(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// A `ByteSource` wrapping any `std::io::Read`, the common case for
/// file-system sources.
pub struct IoSource<R> {
    inner: R,
}

impl<R> IoSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R> fmt::Debug for IoSource<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IoSource").finish()
    }
}

impl<R: std::io::Read> ByteSource for IoSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Buffered reader over a [`ByteSource`], providing `peek`/`consume`/
/// `read_to`/`current_offset` plus cooperative cancellation via the
/// progress callback (§5: every read/skip is a cancellation point).
pub struct Reader<'s> {
    source: &'s mut dyn ByteSource,
    buf: Vec<u8>,
    /// Index into `buf` of the next unconsumed byte.
    start: usize,
    /// Number of valid bytes in `buf` (>= start).
    end: usize,
    offset: u64,
    read_buffer_size: usize,
    progress: Option<ProgressCallback>,
    next_progress_offset: u64,
}

impl<'s> Reader<'s> {
    pub fn new(source: &'s mut dyn ByteSource, read_buffer_size: usize, progress: Option<ProgressCallback>) -> Self {
        let read_buffer_size = read_buffer_size.max(1);
        Self {
            source,
            buf: vec![0u8; read_buffer_size],
            start: 0,
            end: 0,
            offset: 0,
            read_buffer_size,
            progress,
            next_progress_offset: 0,
        }
    }

    pub fn current_offset(&self) -> u64 {
        self.offset
    }

    fn available(&self) -> usize {
        self.end - self.start
    }

    fn refill(&mut self) -> Result<bool> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        if self.end == self.buf.len() {
            self.buf.resize(self.buf.len() + self.read_buffer_size, 0);
        }
        let n = self.source.read(&mut self.buf[self.end..])?;
        self.end += n;
        Ok(n > 0)
    }

    fn check_cancel(&mut self) -> Result<()> {
        if let Some(cb) = &self.progress {
            if self.offset >= self.next_progress_offset {
                self.next_progress_offset = self.offset + cb.interval_hint_bytes.max(1);
                if (cb.callback)(self.offset) == ProgressControl::Cancel {
                    return Err(Error::at(ErrorKind::Cancelled, self.offset));
                }
            }
        }
        Ok(())
    }

    /// Returns a view of up to `n` upcoming bytes without consuming them.
    /// May return fewer than `n` bytes at EOF.
    pub fn peek(&mut self, n: usize) -> Result<&[u8]> {
        while self.available() < n {
            if !self.refill()? {
                break;
            }
        }
        let n = n.min(self.available());
        Ok(&self.buf[self.start..self.start + n])
    }

    /// Advances past `n` already-peeked bytes.
    pub fn consume(&mut self, n: usize) -> Result<()> {
        debug_assert!(n <= self.available());
        self.start += n;
        self.offset += n as u64;
        self.check_cancel()
    }

    /// Reads exactly `dst.len()` bytes, failing with `TRUNCATED_FILE` if the
    /// stream ends first.
    pub fn read_to(&mut self, dst: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < dst.len() {
            let chunk = self.peek(dst.len() - filled)?;
            if chunk.is_empty() {
                return Err(Error::at(ErrorKind::TruncatedFile, self.offset));
            }
            let n = chunk.len();
            dst[filled..filled + n].copy_from_slice(chunk);
            filled += n;
            self.consume(n)?;
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_to(&mut b)?;
        Ok(b[0])
    }

    /// Skips `n` bytes, still routed through the progress callback.
    pub fn skip(&mut self, mut n: u64) -> Result<()> {
        while n > 0 {
            let chunk = self.peek(n.min(self.buf.len() as u64) as usize)?;
            if chunk.is_empty() {
                return Err(Error::at(ErrorKind::TruncatedFile, self.offset));
            }
            let consumed = chunk.len();
            self.consume(consumed)?;
            n -= consumed as u64;
        }
        Ok(())
    }

    pub fn eof(&mut self) -> Result<bool> {
        Ok(self.peek(1)?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_across_refills_with_buffer_size_one() {
        let mut src = SliceSource::new(b"hello world");
        let mut reader = Reader::new(&mut src, 1, None);
        let mut out = [0u8; 11];
        reader.read_to(&mut out).unwrap();
        assert_eq!(&out, b"hello world");
        assert_eq!(reader.current_offset(), 11);
    }

    #[test]
    fn truncated_read_errors() {
        let mut src = SliceSource::new(b"hi");
        let mut reader = Reader::new(&mut src, 64, None);
        let mut out = [0u8; 10];
        let err = reader.read_to(&mut out).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TruncatedFile));
    }

    #[test]
    fn cancellation_aborts_reads() {
        let mut src = SliceSource::new(&[0u8; 1024]);
        let progress = ProgressCallback {
            callback: std::sync::Arc::new(|_| ProgressControl::Cancel),
            interval_hint_bytes: 1,
        };
        let mut reader = Reader::new(&mut src, 64, Some(progress));
        let mut out = [0u8; 8];
        let err = reader.read_to(&mut out).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Cancelled));
    }
}
