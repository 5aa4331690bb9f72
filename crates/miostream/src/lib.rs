//! # miostream
//!
//! One stream type with C stdio semantics over either a host `FILE*` or a
//! memory buffer.
//!
//! # Architecture
//!
//! ```text
//! caller -> Stream -> FileStream -> host stdio (fread, fseek, ...)
//!                  -> MemStream  -> miostream-core (safe)
//! ```
//!
//! The file backing is a thin forwarding layer; all behaviour of the memory
//! backing lives in `miostream-core`. Code written against [`Stream`] sees
//! the same return values and `eof`/`error`/position state from either
//! backing, with two exceptions: a memory stream cannot seek past its end,
//! and it keeps exactly one byte of pushback.

#[macro_use]
mod macros;

pub mod file;
mod host;
pub mod pos;

use std::ffi::CStr;
use std::fs::File;
use std::path::Path;
use std::ptr::NonNull;

pub use libc::FILE;
pub use miostream_core::errno;
pub use miostream_core::stdio::printf::{self as format, Arg, FormatError};
pub use miostream_core::{
    CHUNK_SIZE, Cursor, Dispose, FnRealloc, LimitedRealloc, MemBuffer, MemStream, Realloc,
    Result, StreamError, TryRealloc, Whence,
};

pub use file::{CloseAction, FileStream};
pub use pos::{RawFpos, StreamPos};

use pos::PosRepr;

/// Which backing a stream or snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    File,
    Memory,
}

/// A stdio-style stream.
#[derive(Debug)]
pub enum Stream<'a> {
    File(FileStream),
    Memory(MemStream<'a>),
}

macro_rules! dispatch {
    ($stream:expr, $s:ident => $body:expr) => {
        match $stream {
            Stream::File($s) => $body,
            Stream::Memory($s) => $body,
        }
    };
}

impl Stream<'static> {
    /// Open `path` with an `fopen` mode string.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self> {
        FileStream::open(path.as_ref(), mode).map(Stream::File)
    }

    /// Adopt an existing host handle.
    ///
    /// # Safety
    ///
    /// Same contract as [`FileStream::from_raw`].
    pub unsafe fn from_fp(fp: NonNull<FILE>, close: CloseAction) -> Self {
        // SAFETY: forwarded to the caller.
        Stream::File(unsafe { FileStream::from_raw(fp, close) })
    }

    /// Adopt an open [`File`]; it is closed when the stream is.
    pub fn from_file(file: File, mode: &str) -> Result<Self> {
        FileStream::from_file(file, mode).map(Stream::File)
    }
}

impl<'a> Stream<'a> {
    /// Memory stream over `buf`. Without `grow` it is fixed-size; `dispose`
    /// runs once when the stream is dropped.
    pub fn memory(
        buf: MemBuffer<'a>,
        grow: Option<Box<dyn Realloc + 'a>>,
        dispose: Option<Dispose<'a>>,
    ) -> Result<Self> {
        MemStream::new(buf, grow, dispose).map(Stream::Memory)
    }

    /// Growable memory stream owning `data`.
    pub fn growable(data: Vec<u8>) -> Self {
        Stream::Memory(MemStream::growable(data))
    }

    pub fn kind(&self) -> StreamKind {
        match self {
            Stream::File(_) => StreamKind::File,
            Stream::Memory(_) => StreamKind::Memory,
        }
    }

    /// Host handle of a file stream.
    pub fn fp(&self) -> Option<*mut FILE> {
        match self {
            Stream::File(s) => Some(s.as_ptr()),
            Stream::Memory(_) => None,
        }
    }

    pub fn as_memory(&self) -> Option<&MemStream<'a>> {
        match self {
            Stream::Memory(s) => Some(s),
            Stream::File(_) => None,
        }
    }

    pub fn as_memory_mut(&mut self) -> Option<&mut MemStream<'a>> {
        match self {
            Stream::Memory(s) => Some(s),
            Stream::File(_) => None,
        }
    }

    /// Release the stream now, reporting the host close status for files.
    pub fn close(self) -> Result<()> {
        match self {
            Stream::File(s) => s.close(),
            Stream::Memory(s) => {
                drop(s);
                Ok(())
            }
        }
    }

    // -- reading ------------------------------------------------------------

    /// Read up to `nmemb` elements of `size` bytes; returns whole elements.
    pub fn read(&mut self, dst: &mut [u8], size: usize, nmemb: usize) -> usize {
        dispatch!(self, s => s.read(dst, size, nmemb))
    }

    pub fn getc(&mut self) -> Option<u8> {
        dispatch!(self, s => s.getc())
    }

    /// `fgets` into `dst`; the returned slice excludes the NUL terminator.
    pub fn gets<'b>(&mut self, dst: &'b mut [u8]) -> Option<&'b [u8]> {
        dispatch!(self, s => s.gets(dst))
    }

    pub fn ungetc(&mut self, byte: u8) -> Option<u8> {
        dispatch!(self, s => s.ungetc(byte))
    }

    // -- writing ------------------------------------------------------------

    pub fn write(&mut self, src: &[u8], size: usize, nmemb: usize) -> usize {
        dispatch!(self, s => s.write(src, size, nmemb))
    }

    pub fn putc(&mut self, byte: u8) -> Option<u8> {
        dispatch!(self, s => s.putc(byte))
    }

    /// Write `text` without its terminator; returns the bytes written.
    pub fn puts(&mut self, text: &CStr) -> Result<usize> {
        match self {
            Stream::File(s) => s.puts(text),
            Stream::Memory(s) => s.puts(text.to_bytes()),
        }
    }

    /// printf with an argument pack; see also [`printf!`].
    pub fn vprintf(&mut self, fmt: &[u8], args: &[Arg<'_>]) -> Result<usize> {
        dispatch!(self, s => s.vprintf(fmt, args))
    }

    // -- flags --------------------------------------------------------------

    pub fn clear_err(&mut self) {
        dispatch!(self, s => s.clear_err())
    }

    pub fn is_eof(&self) -> bool {
        dispatch!(self, s => s.is_eof())
    }

    pub fn is_error(&self) -> bool {
        dispatch!(self, s => s.is_error())
    }

    // -- positioning --------------------------------------------------------

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<()> {
        dispatch!(self, s => s.seek(offset, whence))
    }

    pub fn tell(&self) -> Result<i64> {
        dispatch!(self, s => s.tell())
    }

    pub fn rewind(&mut self) {
        dispatch!(self, s => s.rewind())
    }

    pub fn get_pos(&self) -> Result<StreamPos> {
        match self {
            Stream::File(s) => s.get_pos().map(|raw| StreamPos(PosRepr::File(raw))),
            Stream::Memory(s) => s.get_pos().map(|pos| StreamPos(PosRepr::Memory(pos))),
        }
    }

    /// Restore a snapshot; one taken from the other backing is `EINVAL`.
    pub fn set_pos(&mut self, pos: &StreamPos) -> Result<()> {
        match (self, &pos.0) {
            (Stream::File(s), PosRepr::File(raw)) => s.set_pos(raw),
            (Stream::Memory(s), PosRepr::Memory(offset)) => s.set_pos(*offset),
            _ => Err(StreamError::InvalidArgument),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_stream_through_facade() {
        let mut s = Stream::growable(b"abc".to_vec());
        assert_eq!(s.kind(), StreamKind::Memory);
        assert!(s.fp().is_none());
        assert_eq!(s.getc(), Some(b'a'));
        assert_eq!(s.ungetc(b'Z'), Some(b'Z'));
        assert_eq!(s.getc(), Some(b'Z'));
        assert_eq!(s.tell().unwrap(), 1);
        s.seek(0, Whence::End).unwrap();
        assert_eq!(s.puts(c"de").unwrap(), 2);
        assert_eq!(s.as_memory().unwrap().as_bytes(), b"abcde");
        s.close().unwrap();
    }

    #[test]
    fn test_memory_constructor_rejects_fixed_dispose() {
        let mut backing = [0u8; 2];
        let err = Stream::memory(
            MemBuffer::Fixed(&mut backing),
            None,
            Some(Box::new(|_: Vec<u8>| {})),
        )
        .unwrap_err();
        assert!(matches!(err, StreamError::InvalidArgument));
    }

    #[test]
    fn test_printf_macro_variants() {
        let mut s = Stream::growable(Vec::new());
        printf!(s, "%d|%s|%c", -3, "x", Arg::Char(b'!')).unwrap();
        printf!(s, b"|%.1f", 2.0f64).unwrap();
        printf!(&mut s, "|done",).unwrap();
        assert_eq!(s.as_memory().unwrap().as_bytes(), b"-3|x|!|2.0|done");
    }

    #[test]
    fn test_memory_snapshot_round_trip() {
        let mut s = Stream::growable(b"0123".to_vec());
        s.seek(2, Whence::Set).unwrap();
        let pos = s.get_pos().unwrap();
        assert_eq!(pos.kind(), StreamKind::Memory);
        s.rewind();
        s.set_pos(&pos).unwrap();
        assert_eq!(s.getc(), Some(b'2'));
    }

    #[test]
    fn test_snapshot_from_other_backing_rejected() {
        let mut s = Stream::growable(b"0123".to_vec());
        let foreign = StreamPos(PosRepr::File(RawFpos::zeroed()));
        let err = s.set_pos(&foreign).unwrap_err();
        assert_eq!(err.errno(), errno::EINVAL);
    }

    #[test]
    fn test_as_memory_mut_reaches_resize() {
        let mut s = Stream::growable(b"abcdef".to_vec());
        s.as_memory_mut().unwrap().try_resize(3).unwrap();
        let mut dst = [0u8; 8];
        assert_eq!(s.read(&mut dst, 1, 8), 3);
        assert!(s.is_eof());
    }
}
