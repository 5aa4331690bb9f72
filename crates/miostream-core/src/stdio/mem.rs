//! Memory-backed stdio stream.
//!
//! Reproduces the observable behaviour of a host `FILE*` over a byte buffer:
//! block and character reads, a single byte of pushback, writes that grow
//! the buffer through an optional reallocation strategy, printf, seeking and
//! sticky `eof`/`error` flags.
//!
//! Reference: ISO C11 7.21.7 / 7.21.8 / 7.21.9, POSIX.1-2024 fmemopen
//!
//! Layout: bytes `[0, size)` are the logical content, `[size, capacity)` is
//! spare room that is not readable. The cursor may sit past `size` after the
//! buffer is shrunk; reads there see end-of-stream and writes fill the gap.

use std::fmt;

use crate::error::{Result, StreamError};

use super::printf::{self, Arg, FormatError};
use super::whence::Whence;

/// Minimum growth step, in bytes, when a growable buffer has to reallocate.
pub const CHUNK_SIZE: usize = 4096;

// ---------------------------------------------------------------------------
// Storage and ownership
// ---------------------------------------------------------------------------

/// Buffer a memory stream reads from and writes into.
///
/// The length of the vector or slice is the stream's capacity; the logical
/// size is tracked by the stream.
#[derive(Debug)]
pub enum MemBuffer<'a> {
    /// Owned by the stream; dropped (or handed to the dispose action) with it.
    Owned(Vec<u8>),
    /// Caller-owned vector; truncated to the logical size when the stream ends.
    Borrowed(&'a mut Vec<u8>),
    /// Caller-owned fixed slice; can never grow.
    Fixed(&'a mut [u8]),
}

impl MemBuffer<'_> {
    fn bytes(&self) -> &[u8] {
        match self {
            MemBuffer::Owned(v) => v,
            MemBuffer::Borrowed(v) => v,
            MemBuffer::Fixed(s) => s,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self {
            MemBuffer::Owned(v) => v,
            MemBuffer::Borrowed(v) => v,
            MemBuffer::Fixed(s) => s,
        }
    }

    fn vec_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            MemBuffer::Owned(v) => Some(v),
            MemBuffer::Borrowed(v) => Some(v),
            MemBuffer::Fixed(_) => None,
        }
    }
}

/// Reallocation strategy of a growable memory stream.
pub trait Realloc {
    /// Resize `buf` to exactly `new_len` bytes.
    ///
    /// Returns `false` and leaves `buf` untouched when the request cannot be
    /// satisfied.
    fn realloc(&mut self, buf: &mut Vec<u8>, new_len: usize) -> bool;
}

/// Grows and shrinks through the global allocator, reporting allocation
/// failure instead of aborting.
#[derive(Debug, Clone, Copy, Default)]
pub struct TryRealloc;

impl Realloc for TryRealloc {
    fn realloc(&mut self, buf: &mut Vec<u8>, new_len: usize) -> bool {
        if new_len > buf.len() {
            if buf.try_reserve_exact(new_len - buf.len()).is_err() {
                return false;
            }
            buf.resize(new_len, 0);
        } else {
            buf.truncate(new_len);
            buf.shrink_to_fit();
        }
        true
    }
}

/// [`TryRealloc`] with a hard ceiling on the buffer length.
#[derive(Debug, Clone, Copy)]
pub struct LimitedRealloc {
    pub limit: usize,
}

impl LimitedRealloc {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl Realloc for LimitedRealloc {
    fn realloc(&mut self, buf: &mut Vec<u8>, new_len: usize) -> bool {
        new_len <= self.limit && TryRealloc.realloc(buf, new_len)
    }
}

/// Adapts a closure into a [`Realloc`] strategy.
pub struct FnRealloc<F>(pub F);

impl<F: FnMut(&mut Vec<u8>, usize) -> bool> Realloc for FnRealloc<F> {
    fn realloc(&mut self, buf: &mut Vec<u8>, new_len: usize) -> bool {
        (self.0)(buf, new_len)
    }
}

/// Release action run once when the stream is dropped.
///
/// Receives the buffer truncated to the logical size. For a borrowed vector
/// the caller's vector is emptied into it.
pub type Dispose<'a> = Box<dyn FnOnce(Vec<u8>) + 'a>;

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Read/write position of a memory stream.
///
/// Pushing a byte back at offset 0 moves the cursor one step before the
/// start; reading the pushed-back byte brings it back to 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    At(usize),
    BeforeStart,
}

impl Cursor {
    /// Byte offset, or `None` before the start.
    pub fn offset(self) -> Option<usize> {
        match self {
            Cursor::At(pos) => Some(pos),
            Cursor::BeforeStart => None,
        }
    }

    fn step_forward(self) -> Cursor {
        match self {
            Cursor::At(pos) => Cursor::At(pos.saturating_add(1)),
            Cursor::BeforeStart => Cursor::At(0),
        }
    }

    fn step_back(self) -> Cursor {
        match self {
            Cursor::At(0) | Cursor::BeforeStart => Cursor::BeforeStart,
            Cursor::At(pos) => Cursor::At(pos - 1),
        }
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// Memory-backed stream.
///
/// Invariants: `size <= capacity`; pushback holds at most one byte; `eof`
/// and `error` stay set until cleared explicitly or by a successful
/// repositioning (`eof` only). `error` is never raised by this backing.
pub struct MemStream<'a> {
    buf: MemBuffer<'a>,
    size: usize,
    cursor: Cursor,
    pushback: Option<u8>,
    grow: Option<Box<dyn Realloc + 'a>>,
    dispose: Option<Dispose<'a>>,
    eof: bool,
    error: bool,
}

impl fmt::Debug for MemStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemStream")
            .field("size", &self.size)
            .field("capacity", &self.capacity())
            .field("cursor", &self.cursor)
            .field("pushback", &self.pushback)
            .field("growable", &self.grow.is_some())
            .field("eof", &self.eof)
            .field("error", &self.error)
            .finish()
    }
}

impl<'a> MemStream<'a> {
    /// Stream over `buf`, whose full length is the initial logical size.
    ///
    /// Without `grow` the stream is fixed-size. A dispose action cannot be
    /// attached to a [`MemBuffer::Fixed`] slice.
    pub fn new(
        buf: MemBuffer<'a>,
        grow: Option<Box<dyn Realloc + 'a>>,
        dispose: Option<Dispose<'a>>,
    ) -> Result<Self> {
        if dispose.is_some() && matches!(buf, MemBuffer::Fixed(_)) {
            return Err(StreamError::InvalidArgument);
        }
        let size = buf.bytes().len();
        Ok(Self {
            buf,
            size,
            cursor: Cursor::At(0),
            pushback: None,
            grow,
            dispose,
            eof: false,
            error: false,
        })
    }

    /// Growable stream owning `data`.
    pub fn growable(data: Vec<u8>) -> Self {
        Self {
            size: data.len(),
            buf: MemBuffer::Owned(data),
            cursor: Cursor::At(0),
            pushback: None,
            grow: Some(Box::new(TryRealloc)),
            dispose: None,
            eof: false,
            error: false,
        }
    }

    /// Fixed-size stream over a caller slice.
    pub fn fixed(data: &'a mut [u8]) -> Self {
        Self {
            size: data.len(),
            buf: MemBuffer::Fixed(data),
            cursor: Cursor::At(0),
            pushback: None,
            grow: None,
            dispose: None,
            eof: false,
            error: false,
        }
    }

    // -- accessors ----------------------------------------------------------

    /// Logical size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes currently allocated.
    pub fn capacity(&self) -> usize {
        self.buf.bytes().len()
    }

    /// Logical content, `[0, size)`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf.bytes()[..self.size]
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn pushback(&self) -> Option<u8> {
        self.pushback
    }

    pub fn is_growable(&self) -> bool {
        self.grow.is_some()
    }

    /// Hand back an owned buffer, truncated to the logical size, without
    /// running the dispose action. Borrowed storage yields `None`.
    pub fn into_vec(mut self) -> Option<Vec<u8>> {
        let size = self.size;
        self.dispose = None;
        match &mut self.buf {
            MemBuffer::Owned(v) => {
                let mut data = std::mem::take(v);
                data.truncate(size);
                Some(data)
            }
            _ => None,
        }
    }

    // -- reading ------------------------------------------------------------

    /// Read up to `nmemb` elements of `size` bytes into `dst`.
    ///
    /// The pushback byte comes first. Every available byte up to the request
    /// is copied, including a trailing partial element, but only whole
    /// elements are counted. `eof` is set when the request outran the data.
    pub fn read(&mut self, dst: &mut [u8], size: usize, nmemb: usize) -> usize {
        if size == 0 || nmemb == 0 {
            return 0;
        }
        let nmemb = nmemb.min(dst.len() / size);
        if nmemb == 0 {
            return 0;
        }
        let wanted = size * nmemb;

        let mut copied = 0;
        if let Some(byte) = self.pushback.take() {
            dst[0] = byte;
            self.cursor = self.cursor.step_forward();
            copied = 1;
        }

        let pos = self.buffer_offset();
        let take = (wanted - copied).min(self.size.saturating_sub(pos));
        if take > 0 {
            dst[copied..copied + take].copy_from_slice(&self.buf.bytes()[pos..pos + take]);
            self.cursor = Cursor::At(pos + take);
            copied += take;
        }

        if copied < wanted {
            self.eof = true;
        }
        copied / size
    }

    /// Read one byte; `None` at end of stream (and `eof` is set).
    pub fn getc(&mut self) -> Option<u8> {
        if let Some(byte) = self.pushback.take() {
            self.cursor = self.cursor.step_forward();
            return Some(byte);
        }
        let pos = self.buffer_offset();
        if pos < self.size {
            self.cursor = Cursor::At(pos + 1);
            Some(self.buf.bytes()[pos])
        } else {
            self.eof = true;
            None
        }
    }

    /// Read a line into `dst` the way `fgets` does.
    ///
    /// Copies at most `dst.len() - 1` bytes, stopping after a newline, and
    /// NUL-terminates. Returns the bytes copied (without the terminator), or
    /// `None` if nothing was copied.
    pub fn gets<'b>(&mut self, dst: &'b mut [u8]) -> Option<&'b [u8]> {
        let limit = dst.len().checked_sub(1)?;
        let mut copied = 0;
        let mut line_done = false;

        if limit > 0
            && let Some(byte) = self.pushback.take()
        {
            dst[0] = byte;
            self.cursor = self.cursor.step_forward();
            copied = 1;
            line_done = byte == b'\n';
        }

        while !line_done && copied < limit {
            let pos = self.buffer_offset();
            if pos >= self.size {
                self.eof = true;
                break;
            }
            let byte = self.buf.bytes()[pos];
            dst[copied] = byte;
            copied += 1;
            self.cursor = Cursor::At(pos + 1);
            line_done = byte == b'\n';
        }

        if copied == 0 {
            return None;
        }
        dst[copied] = 0;
        Some(&dst[..copied])
    }

    /// Push `byte` back; the next read returns it first.
    ///
    /// Fails (returns `None`) while a pushback is already pending. Clears
    /// `eof`. The buffer itself is not modified.
    pub fn ungetc(&mut self, byte: u8) -> Option<u8> {
        if self.pushback.is_some() {
            return None;
        }
        self.pushback = Some(byte);
        self.cursor = self.cursor.step_back();
        self.eof = false;
        Some(byte)
    }

    // -- writing ------------------------------------------------------------

    /// Write `nmemb` elements of `size` bytes from `src`.
    ///
    /// All-or-nothing: returns `nmemb` on success and 0 when the buffer could
    /// not hold the data, in which case nothing changed.
    pub fn write(&mut self, src: &[u8], size: usize, nmemb: usize) -> usize {
        if size == 0 || nmemb == 0 {
            return 0;
        }
        let nmemb = nmemb.min(src.len() / size);
        if nmemb == 0 {
            return 0;
        }
        match self.write_bytes(&src[..size * nmemb]) {
            Ok(()) => nmemb,
            Err(_) => 0,
        }
    }

    /// Write one byte; `None` when there is no room.
    pub fn putc(&mut self, byte: u8) -> Option<u8> {
        self.write_bytes(&[byte]).ok().map(|()| byte)
    }

    /// Write `s` (no terminator); returns the byte count written.
    pub fn puts(&mut self, s: &[u8]) -> Result<usize> {
        self.write_bytes(s)?;
        Ok(s.len())
    }

    /// printf into the stream at the cursor.
    ///
    /// The output length is probed first, room for it plus a terminator is
    /// ensured, then the output is rendered in place. The byte the terminator
    /// lands on is restored afterwards, so content past the output survives.
    pub fn vprintf(&mut self, fmt: &[u8], args: &[Arg<'_>]) -> Result<usize> {
        let old_size = self.size;
        let pos = self.buffer_offset();

        let n = printf::format_bounded(&mut [0u8; 1], fmt, args)?;
        let room = n.checked_add(1).ok_or(StreamError::Overflow)?;
        self.ensure_space(pos, room)?;

        let saved = self.buf.bytes()[pos + n];
        let rendered = printf::format_bounded(&mut self.buf.bytes_mut()[pos..pos + room], fmt, args);
        self.buf.bytes_mut()[pos + n] = saved;

        match rendered {
            Ok(written) if written == n => {
                self.size = old_size.max(pos + n);
                self.cursor = Cursor::At(pos + n);
                self.pushback = None;
                Ok(n)
            }
            Ok(written) => {
                self.size = old_size;
                Err(FormatError::LengthMismatch {
                    probe: n,
                    rendered: written,
                }
                .into())
            }
            Err(err) => {
                self.size = old_size;
                Err(err.into())
            }
        }
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let pos = self.buffer_offset();
        self.ensure_space(pos, data.len())?;
        let end = pos + data.len();
        self.buf.bytes_mut()[pos..end].copy_from_slice(data);
        self.cursor = Cursor::At(end);
        // A write replaces the logical byte a pending pushback stood for.
        self.pushback = None;
        Ok(())
    }

    /// Make `[pos, pos + n)` part of the logical content.
    fn ensure_space(&mut self, pos: usize, n: usize) -> Result<()> {
        let end = pos.checked_add(n).ok_or(StreamError::Overflow)?;
        if end > self.size {
            self.try_resize(end)?;
        }
        Ok(())
    }

    /// Change the logical size to `new_size`.
    ///
    /// Growing within capacity only moves `size`. Growing past it asks the
    /// strategy for at least [`CHUNK_SIZE`] more bytes. Shrinking reallocates
    /// to exactly `new_size`. Fails without change when the stream has no
    /// strategy or the strategy refuses.
    pub fn try_resize(&mut self, new_size: usize) -> Result<()> {
        let Some(grow) = self.grow.as_mut() else {
            return Err(StreamError::NoSpace {
                requested: new_size,
            });
        };
        if new_size == usize::MAX {
            return Err(StreamError::Overflow);
        }
        let capacity = self.buf.bytes().len();

        if new_size > self.size && new_size <= capacity {
            self.size = new_size;
            return Ok(());
        }

        let target = if new_size > self.size {
            capacity.saturating_add(CHUNK_SIZE).max(new_size)
        } else {
            new_size
        };
        let Some(vec) = self.buf.vec_mut() else {
            return Err(StreamError::NoSpace {
                requested: new_size,
            });
        };
        if !grow.realloc(vec, target) || vec.len() != target {
            // A strategy may claim success without resizing; keep
            // `size <= capacity` either way.
            vec.resize(capacity, 0);
            return Err(StreamError::OutOfMemory { requested: target });
        }
        self.size = new_size;
        Ok(())
    }

    // -- flags --------------------------------------------------------------

    pub fn clear_err(&mut self) {
        self.eof = false;
        self.error = false;
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    // -- positioning --------------------------------------------------------

    /// Move the cursor to `offset` from `whence`.
    ///
    /// The target must lie within `[0, size]`. On success the pushback is
    /// dropped and `eof` cleared; on failure nothing changes.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<()> {
        let base: i128 = match whence {
            Whence::Set => 0,
            Whence::Cur => match self.cursor {
                Cursor::At(pos) => pos as i128,
                Cursor::BeforeStart => -1,
            },
            Whence::End => self.size as i128,
        };
        let target = base + i128::from(offset);
        if target < 0 || target > self.size as i128 {
            return Err(StreamError::InvalidArgument);
        }
        self.reposition(target as usize);
        Ok(())
    }

    /// Current offset; `Overflow` when it is not representable as `i64`
    /// (which includes the before-start cursor).
    pub fn tell(&self) -> Result<i64> {
        match self.cursor {
            Cursor::At(pos) => i64::try_from(pos).map_err(|_| StreamError::Overflow),
            Cursor::BeforeStart => Err(StreamError::Overflow),
        }
    }

    /// Back to offset 0, dropping pushback and both flags.
    pub fn rewind(&mut self) {
        self.reposition(0);
        self.error = false;
    }

    /// Snapshot of the cursor; `Io` while it sits before the start.
    pub fn get_pos(&self) -> Result<usize> {
        self.cursor.offset().ok_or(StreamError::Io)
    }

    /// Restore a snapshot taken by [`get_pos`](Self::get_pos).
    pub fn set_pos(&mut self, pos: usize) -> Result<()> {
        if pos > self.size {
            return Err(StreamError::InvalidArgument);
        }
        self.reposition(pos);
        Ok(())
    }

    fn reposition(&mut self, pos: usize) {
        self.cursor = Cursor::At(pos);
        self.pushback = None;
        self.eof = false;
    }

    /// Offset of the next buffer byte. Only a pending pushback can leave the
    /// cursor before the start; readers consume it first and writers drop it.
    fn buffer_offset(&self) -> usize {
        self.cursor.offset().unwrap_or(0)
    }
}

impl Drop for MemStream<'_> {
    fn drop(&mut self) {
        let size = self.size;
        let dispose = self.dispose.take();
        let Some(vec) = self.buf.vec_mut() else {
            return;
        };
        vec.truncate(size);
        if let Some(dispose) = dispose {
            dispose(std::mem::take(vec));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn stream(content: &[u8]) -> MemStream<'static> {
        MemStream::growable(content.to_vec())
    }

    #[test]
    fn test_new_sets_size_from_buffer() {
        let s = stream(b"abc");
        assert_eq!(s.size(), 3);
        assert_eq!(s.capacity(), 3);
        assert_eq!(s.cursor(), Cursor::At(0));
        assert!(!s.is_eof());
        assert!(!s.is_error());
    }

    #[test]
    fn test_fixed_with_dispose_rejected() {
        let mut backing = [0u8; 4];
        let err = MemStream::new(MemBuffer::Fixed(&mut backing), None, Some(Box::new(|_: Vec<u8>| {})))
            .unwrap_err();
        assert!(matches!(err, StreamError::InvalidArgument));
    }

    #[test]
    fn test_read_whole_elements() {
        let mut s = stream(b"abcdef");
        let mut dst = [0u8; 8];
        assert_eq!(s.read(&mut dst, 2, 2), 2);
        assert_eq!(&dst[..4], b"abcd");
        assert_eq!(s.cursor(), Cursor::At(4));
        assert!(!s.is_eof());
    }

    #[test]
    fn test_read_exact_fit_defers_eof() {
        let mut s = stream(b"abcd");
        let mut dst = [0u8; 4];
        assert_eq!(s.read(&mut dst, 1, 4), 4);
        assert!(!s.is_eof());
        assert_eq!(s.read(&mut dst, 1, 1), 0);
        assert!(s.is_eof());
    }

    #[test]
    fn test_read_partial_element_not_counted() {
        let mut s = stream(b"abcde");
        let mut dst = [0u8; 8];
        assert_eq!(s.read(&mut dst, 2, 4), 2);
        assert_eq!(&dst[..5], b"abcde");
        assert_eq!(s.cursor(), Cursor::At(5));
        assert!(s.is_eof());
    }

    #[test]
    fn test_read_zero_request() {
        let mut s = stream(b"ab");
        let mut dst = [0u8; 2];
        assert_eq!(s.read(&mut dst, 0, 3), 0);
        assert_eq!(s.read(&mut dst, 1, 0), 0);
        assert_eq!(s.cursor(), Cursor::At(0));
        assert!(!s.is_eof());
    }

    #[test]
    fn test_read_with_pushback_completes_element() {
        let mut s = stream(b"xyz");
        assert_eq!(s.getc(), Some(b'x'));
        assert_eq!(s.ungetc(b'Q'), Some(b'Q'));
        let mut dst = [0u8; 3];
        assert_eq!(s.read(&mut dst, 3, 1), 1);
        assert_eq!(&dst, b"Qyz");
        assert_eq!(s.pushback(), None);
        assert_eq!(s.cursor(), Cursor::At(3));
    }

    #[test]
    fn test_read_past_truncated_size_sees_eof() {
        let mut s = stream(b"abcdef");
        s.seek(5, Whence::Set).unwrap();
        s.try_resize(2).unwrap();
        assert_eq!(s.cursor(), Cursor::At(5));
        let mut dst = [0u8; 2];
        assert_eq!(s.read(&mut dst, 1, 2), 0);
        assert!(s.is_eof());
        assert_eq!(s.getc(), None);
    }

    #[test]
    fn test_getc_sets_eof_at_end() {
        let mut s = stream(b"a");
        assert_eq!(s.getc(), Some(b'a'));
        assert!(!s.is_eof());
        assert_eq!(s.getc(), None);
        assert!(s.is_eof());
    }

    #[test]
    fn test_ungetc_single_slot() {
        let mut s = stream(b"ab");
        s.getc();
        assert_eq!(s.ungetc(b'z'), Some(b'z'));
        assert_eq!(s.ungetc(b'y'), None);
        assert_eq!(s.getc(), Some(b'z'));
        assert_eq!(s.getc(), Some(b'b'));
        // The buffer still holds the original byte.
        assert_eq!(s.as_bytes(), b"ab");
    }

    #[test]
    fn test_ungetc_clears_eof() {
        let mut s = stream(b"");
        assert_eq!(s.getc(), None);
        assert!(s.is_eof());
        s.ungetc(b'k');
        assert!(!s.is_eof());
        assert_eq!(s.getc(), Some(b'k'));
    }

    #[test]
    fn test_ungetc_at_start_moves_before_start() {
        let mut s = stream(b"ab");
        s.ungetc(b'X');
        assert_eq!(s.cursor(), Cursor::BeforeStart);
        assert!(matches!(s.get_pos(), Err(StreamError::Io)));
        assert!(matches!(s.tell(), Err(StreamError::Overflow)));
        assert_eq!(s.getc(), Some(b'X'));
        assert_eq!(s.cursor(), Cursor::At(0));
        assert_eq!(s.get_pos().unwrap(), 0);
    }

    #[test]
    fn test_gets_stops_after_newline() {
        let mut s = stream(b"one\ntwo");
        let mut dst = [0xFFu8; 16];
        assert_eq!(s.gets(&mut dst), Some(&b"one\n"[..]));
        assert_eq!(dst[4], 0);
        assert!(!s.is_eof());
        assert_eq!(s.gets(&mut dst), Some(&b"two"[..]));
        assert!(s.is_eof());
        assert_eq!(s.gets(&mut dst), None);
    }

    #[test]
    fn test_gets_respects_limit() {
        let mut s = stream(b"abcdef");
        let mut dst = [0u8; 4];
        assert_eq!(s.gets(&mut dst), Some(&b"abc"[..]));
        assert_eq!(dst[3], 0);
        assert_eq!(s.cursor(), Cursor::At(3));
    }

    #[test]
    fn test_gets_limit_at_end_does_not_set_eof() {
        let mut s = stream(b"abc");
        let mut dst = [0u8; 4];
        assert_eq!(s.gets(&mut dst), Some(&b"abc"[..]));
        assert!(!s.is_eof());
    }

    #[test]
    fn test_gets_tiny_destinations() {
        let mut s = stream(b"abc");
        assert_eq!(s.gets(&mut []), None);
        let mut one = [0xEEu8; 1];
        assert_eq!(s.gets(&mut one), None);
        assert_eq!(one, [0xEE]);
        assert_eq!(s.cursor(), Cursor::At(0));
        assert!(!s.is_eof());
    }

    #[test]
    fn test_gets_pushed_back_newline_ends_line() {
        let mut s = stream(b"rest");
        s.ungetc(b'\n');
        let mut dst = [0u8; 8];
        assert_eq!(s.gets(&mut dst), Some(&b"\n"[..]));
        assert_eq!(s.cursor(), Cursor::At(0));
    }

    #[test]
    fn test_write_overwrites_then_extends() {
        let mut s = stream(b"abcd");
        s.seek(2, Whence::Set).unwrap();
        assert_eq!(s.write(b"XYZ", 1, 3), 3);
        assert_eq!(s.as_bytes(), b"abXYZ");
        assert_eq!(s.cursor(), Cursor::At(5));
    }

    #[test]
    fn test_write_growth_uses_chunk() {
        let mut s = MemStream::growable(Vec::new());
        assert_eq!(s.write(b"hi", 1, 2), 2);
        assert_eq!(s.size(), 2);
        assert_eq!(s.capacity(), CHUNK_SIZE);
        let big = vec![b'x'; CHUNK_SIZE * 2];
        assert_eq!(s.write(&big, 1, big.len()), big.len());
        assert_eq!(s.size(), 2 + CHUNK_SIZE * 2);
        assert_eq!(s.capacity(), 2 + CHUNK_SIZE * 2);
    }

    #[test]
    fn test_write_fixed_is_all_or_nothing() {
        let mut backing = *b"....";
        let mut s = MemStream::fixed(&mut backing);
        s.seek(2, Whence::Set).unwrap();
        assert_eq!(s.write(b"abc", 1, 3), 0);
        assert_eq!(s.cursor(), Cursor::At(2));
        assert_eq!(s.size(), 4);
        assert_eq!(s.write(b"ab", 2, 1), 1);
        assert_eq!(s.as_bytes(), b"..ab");
        assert_eq!(s.putc(b'!'), None);
    }

    #[test]
    fn test_write_discards_pushback() {
        let mut s = stream(b"abc");
        s.getc();
        s.ungetc(b'Z');
        assert_eq!(s.putc(b'q'), Some(b'q'));
        assert_eq!(s.pushback(), None);
        assert_eq!(s.as_bytes(), b"qbc");
        assert_eq!(s.getc(), Some(b'b'));
    }

    #[test]
    fn test_puts_returns_length() {
        let mut s = MemStream::growable(Vec::new());
        assert_eq!(s.puts(b"hello").unwrap(), 5);
        assert_eq!(s.puts(b"").unwrap(), 0);
        assert_eq!(s.as_bytes(), b"hello");
    }

    #[test]
    fn test_limited_realloc_refuses() {
        let mut s = MemStream::new(
            MemBuffer::Owned(Vec::new()),
            Some(Box::new(LimitedRealloc::new(8))),
            None,
        )
        .unwrap();
        // The first growth asks for a whole chunk.
        let err = s.puts(b"abc").unwrap_err();
        assert!(matches!(err, StreamError::OutOfMemory { requested } if requested == CHUNK_SIZE));
        assert_eq!(s.size(), 0);
    }

    #[test]
    fn test_realloc_claiming_success_without_resizing_fails() {
        let mut s = MemStream::new(
            MemBuffer::Owned(b"ab".to_vec()),
            Some(Box::new(FnRealloc(|_: &mut Vec<u8>, _: usize| true))),
            None,
        )
        .unwrap();
        s.seek(0, Whence::End).unwrap();
        assert_eq!(s.putc(b'x'), None);
        let err = s.try_resize(1).unwrap_err();
        assert!(matches!(err, StreamError::OutOfMemory { requested: 1 }));
        assert_eq!(s.size(), 2);
        assert_eq!(s.capacity(), 2);
        assert_eq!(s.as_bytes(), b"ab");
        assert_eq!(s.cursor(), Cursor::At(2));
    }

    #[test]
    fn test_realloc_shrinking_on_grow_keeps_capacity() {
        let mut s = MemStream::new(
            MemBuffer::Owned(b"abcd".to_vec()),
            Some(Box::new(FnRealloc(|buf: &mut Vec<u8>, _: usize| {
                buf.clear();
                true
            }))),
            None,
        )
        .unwrap();
        s.seek(0, Whence::End).unwrap();
        assert_eq!(s.write(b"zz", 1, 2), 0);
        assert_eq!(s.size(), 4);
        assert!(s.capacity() >= s.size());
        assert_eq!(s.as_bytes().len(), 4);
    }

    #[test]
    fn test_fn_realloc_sees_requests() {
        let requests = Rc::new(RefCell::new(Vec::<usize>::new()));
        let seen = Rc::clone(&requests);
        let grow = FnRealloc(move |buf: &mut Vec<u8>, len: usize| {
            seen.borrow_mut().push(len);
            TryRealloc.realloc(buf, len)
        });
        let mut s = MemStream::new(MemBuffer::Owned(vec![0; 10]), Some(Box::new(grow)), None).unwrap();
        s.seek(0, Whence::End).unwrap();
        s.putc(b'x');
        s.try_resize(3).unwrap();
        assert_eq!(*requests.borrow(), vec![10 + CHUNK_SIZE, 3]);
        assert_eq!(s.capacity(), 3);
    }

    #[test]
    fn test_try_resize_rules() {
        let mut s = stream(b"abcdef");
        assert!(matches!(s.try_resize(usize::MAX), Err(StreamError::Overflow)));
        s.try_resize(2).unwrap();
        assert_eq!((s.size(), s.capacity()), (2, 2));
        s.try_resize(5).unwrap();
        assert_eq!(s.size(), 5);
        assert_eq!(s.capacity(), 2 + CHUNK_SIZE);
        s.try_resize(100).unwrap();
        assert_eq!((s.size(), s.capacity()), (100, 2 + CHUNK_SIZE));

        let mut fixed_backing = [0u8; 3];
        let mut fixed = MemStream::fixed(&mut fixed_backing);
        assert!(matches!(fixed.try_resize(4), Err(StreamError::NoSpace { .. })));
    }

    #[test]
    fn test_vprintf_in_place() {
        let mut s = stream(b"0123456789");
        s.seek(2, Whence::Set).unwrap();
        let n = s.vprintf(b"%d!", &[Arg::Int(42)]).unwrap();
        assert_eq!(n, 3);
        // The terminator slot is restored.
        assert_eq!(s.as_bytes(), b"0142!56789");
        assert_eq!(s.size(), 10);
        assert_eq!(s.cursor(), Cursor::At(5));
    }

    #[test]
    fn test_vprintf_extends_and_sizes() {
        let mut s = MemStream::growable(Vec::new());
        assert_eq!(s.vprintf(b"x=%d", &[Arg::Int(5)]).unwrap(), 3);
        assert_eq!(s.size(), 3);
        assert_eq!(s.as_bytes(), b"x=5");
    }

    #[test]
    fn test_vprintf_fixed_needs_terminator_room() {
        let mut backing = [0u8; 4];
        let mut s = MemStream::fixed(&mut backing);
        let err = s.vprintf(b"abcd", &[]).unwrap_err();
        assert!(matches!(err, StreamError::NoSpace { .. }));
        assert_eq!(s.vprintf(b"abc", &[]).unwrap(), 3);
        assert_eq!(s.as_bytes(), b"abc\0");
    }

    #[test]
    fn test_vprintf_error_leaves_stream_unchanged() {
        let mut s = stream(b"keep");
        let err = s.vprintf(b"%s", &[]).unwrap_err();
        assert!(matches!(err, StreamError::Format(FormatError::MissingArgument { .. })));
        assert_eq!(s.as_bytes(), b"keep");
        assert_eq!(s.cursor(), Cursor::At(0));
    }

    #[test]
    fn test_seek_bounds() {
        let mut s = stream(b"abcd");
        s.seek(4, Whence::Set).unwrap();
        assert!(matches!(s.seek(5, Whence::Set), Err(StreamError::InvalidArgument)));
        assert!(matches!(s.seek(-5, Whence::Cur), Err(StreamError::InvalidArgument)));
        assert!(matches!(s.seek(1, Whence::End), Err(StreamError::InvalidArgument)));
        assert_eq!(s.tell().unwrap(), 4);
        s.seek(-1, Whence::End).unwrap();
        assert_eq!(s.tell().unwrap(), 3);
        s.seek(-2, Whence::Cur).unwrap();
        assert_eq!(s.tell().unwrap(), 1);
    }

    #[test]
    fn test_seek_clears_eof_and_pushback() {
        let mut s = stream(b"ab");
        s.getc();
        s.ungetc(b'z');
        s.seek(0, Whence::Cur).unwrap();
        assert_eq!(s.pushback(), None);
        assert_eq!(s.getc(), Some(b'a'));

        s.seek(0, Whence::End).unwrap();
        s.getc();
        assert!(s.is_eof());
        s.seek(0, Whence::Set).unwrap();
        assert!(!s.is_eof());
    }

    #[test]
    fn test_seek_cur_from_before_start() {
        let mut s = stream(b"ab");
        s.ungetc(b'q');
        assert!(s.seek(0, Whence::Cur).is_err());
        s.seek(1, Whence::Cur).unwrap();
        assert_eq!(s.cursor(), Cursor::At(0));
    }

    #[test]
    fn test_rewind_clears_everything() {
        let mut s = stream(b"ab");
        s.seek(0, Whence::End).unwrap();
        s.getc();
        s.ungetc(b'x');
        s.rewind();
        assert_eq!(s.cursor(), Cursor::At(0));
        assert_eq!(s.pushback(), None);
        assert!(!s.is_eof());
        assert!(!s.is_error());
    }

    #[test]
    fn test_set_pos_validates_and_clears_eof() {
        let mut s = stream(b"abc");
        let saved = s.get_pos().unwrap();
        s.seek(0, Whence::End).unwrap();
        s.getc();
        assert!(s.is_eof());
        assert!(matches!(s.set_pos(4), Err(StreamError::InvalidArgument)));
        assert!(s.is_eof());
        s.set_pos(saved).unwrap();
        assert!(!s.is_eof());
        assert_eq!(s.getc(), Some(b'a'));
    }

    #[test]
    fn test_clear_err() {
        let mut s = stream(b"");
        s.getc();
        assert!(s.is_eof());
        s.clear_err();
        assert!(!s.is_eof());
    }

    #[test]
    fn test_drop_truncates_borrowed_vec() {
        let mut data = b"abc".to_vec();
        {
            let mut s = MemStream::new(MemBuffer::Borrowed(&mut data), Some(Box::new(TryRealloc)), None)
                .unwrap();
            s.seek(0, Whence::End).unwrap();
            s.puts(b"de").unwrap();
            assert_eq!(s.capacity(), 3 + CHUNK_SIZE);
        }
        assert_eq!(data, b"abcde");
    }

    #[test]
    fn test_dispose_runs_once_with_logical_content() {
        let released = Rc::new(RefCell::new(Vec::<Vec<u8>>::new()));
        let sink = Rc::clone(&released);
        {
            let mut s = MemStream::new(
                MemBuffer::Owned(Vec::new()),
                Some(Box::new(TryRealloc)),
                Some(Box::new(move |buf: Vec<u8>| sink.borrow_mut().push(buf))),
            )
            .unwrap();
            s.puts(b"bye").unwrap();
        }
        assert_eq!(*released.borrow(), vec![b"bye".to_vec()]);
    }

    #[test]
    fn test_into_vec_skips_dispose() {
        let called = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&called);
        let mut s = MemStream::new(
            MemBuffer::Owned(b"xy".to_vec()),
            None,
            Some(Box::new(move |_: Vec<u8>| *flag.borrow_mut() = true)),
        )
        .unwrap();
        s.getc();
        assert_eq!(s.into_vec(), Some(b"xy".to_vec()));
        assert!(!*called.borrow());
    }
}
