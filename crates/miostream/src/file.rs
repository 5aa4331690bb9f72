//! File-backed stream over a host `FILE*`.
//!
//! Every operation forwards to the host stdio routine of the same name. This
//! module only translates sizes, sentinels and errno into Rust types, and
//! releases the handle according to its [`CloseAction`].

use std::ffi::{CStr, CString, c_char, c_int, c_long};
use std::fs::File;
use std::io;
use std::mem::ManuallyDrop;
use std::os::fd::{FromRawFd, IntoRawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr::NonNull;

use libc::FILE;
use miostream_core::stdio::EOF;
use miostream_core::stdio::printf::{self, Arg};
use miostream_core::{Result, StreamError, Whence};

use crate::host;
use crate::pos::RawFpos;

/// What happens to the handle when the stream is dropped or closed.
#[derive(Debug, Clone, Copy)]
pub enum CloseAction {
    /// `fclose` it.
    Close,
    /// Leave it open; the caller keeps ownership.
    Leave,
    /// Release it through another routine, e.g. `pclose`.
    Custom(unsafe extern "C" fn(*mut FILE) -> c_int),
}

#[derive(Debug)]
pub struct FileStream {
    fp: NonNull<FILE>,
    close: CloseAction,
}

fn os_error() -> StreamError {
    StreamError::Os(io::Error::last_os_error())
}

fn c_mode(mode: &str) -> Result<CString> {
    CString::new(mode).map_err(|_| StreamError::InvalidArgument)
}

impl FileStream {
    /// `fopen(path, mode)`. The mode goes to the host as given; only an
    /// interior NUL is refused.
    pub fn open(path: &Path, mode: &str) -> Result<Self> {
        let mode = c_mode(mode)?;
        let path =
            CString::new(path.as_os_str().as_bytes()).map_err(|_| StreamError::InvalidArgument)?;
        // SAFETY: both strings are NUL-terminated and live across the call.
        let fp = unsafe { host::fopen(path.as_ptr(), mode.as_ptr()) };
        let fp = NonNull::new(fp).ok_or_else(os_error)?;
        Ok(Self {
            fp,
            close: CloseAction::Close,
        })
    }

    /// Adopt an open [`File`] through `fdopen`. The stream owns the
    /// descriptor from then on; on failure it is closed.
    pub fn from_file(file: File, mode: &str) -> Result<Self> {
        let mode = c_mode(mode)?;
        let fd = file.into_raw_fd();
        // SAFETY: `fd` is an open descriptor we own; `mode` is NUL-terminated.
        let fp = unsafe { host::fdopen(fd, mode.as_ptr()) };
        match NonNull::new(fp) {
            Some(fp) => Ok(Self {
                fp,
                close: CloseAction::Close,
            }),
            None => {
                let err = os_error();
                // SAFETY: fdopen failed, so the descriptor is still ours alone.
                drop(unsafe { File::from_raw_fd(fd) });
                Err(err)
            }
        }
    }

    /// Wrap an existing host handle.
    ///
    /// # Safety
    ///
    /// `fp` must be an open stream that stays valid for the lifetime of the
    /// returned value and is not used through any other path meanwhile. With
    /// [`CloseAction::Close`] or [`CloseAction::Custom`] the returned value
    /// takes over releasing it.
    pub unsafe fn from_raw(fp: NonNull<FILE>, close: CloseAction) -> Self {
        Self { fp, close }
    }

    /// The underlying host handle.
    pub fn as_ptr(&self) -> *mut FILE {
        self.fp.as_ptr()
    }

    pub fn read(&mut self, dst: &mut [u8], size: usize, nmemb: usize) -> usize {
        if size == 0 {
            return 0;
        }
        let nmemb = nmemb.min(dst.len() / size);
        // SAFETY: `dst` holds at least `size * nmemb` bytes.
        unsafe { host::fread(dst.as_mut_ptr().cast(), size, nmemb, self.as_ptr()) }
    }

    pub fn write(&mut self, src: &[u8], size: usize, nmemb: usize) -> usize {
        if size == 0 {
            return 0;
        }
        let nmemb = nmemb.min(src.len() / size);
        // SAFETY: `src` holds at least `size * nmemb` bytes.
        unsafe { host::fwrite(src.as_ptr().cast(), size, nmemb, self.as_ptr()) }
    }

    pub fn getc(&mut self) -> Option<u8> {
        // SAFETY: `fp` is a live stream.
        let c = unsafe { host::fgetc(self.as_ptr()) };
        u8::try_from(c).ok()
    }

    /// `fgets`. Destinations longer than `INT_MAX` are refused.
    pub fn gets<'b>(&mut self, dst: &'b mut [u8]) -> Option<&'b [u8]> {
        let n = c_int::try_from(dst.len()).ok().filter(|&n| n > 0)?;
        // SAFETY: `dst` is writable for `n` bytes.
        let ret = unsafe { host::fgets(dst.as_mut_ptr().cast::<c_char>(), n, self.as_ptr()) };
        if ret.is_null() {
            return None;
        }
        let len = dst.iter().position(|&b| b == 0).unwrap_or(dst.len());
        Some(&dst[..len])
    }

    pub fn ungetc(&mut self, byte: u8) -> Option<u8> {
        // SAFETY: `fp` is a live stream.
        let c = unsafe { host::ungetc(c_int::from(byte), self.as_ptr()) };
        (c != EOF).then_some(byte)
    }

    pub fn putc(&mut self, byte: u8) -> Option<u8> {
        // SAFETY: `fp` is a live stream.
        let c = unsafe { host::fputc(c_int::from(byte), self.as_ptr()) };
        (c != EOF).then_some(byte)
    }

    /// `fputs`; returns the number of bytes handed to the host.
    pub fn puts(&mut self, s: &CStr) -> Result<usize> {
        // SAFETY: `s` is NUL-terminated.
        let rc = unsafe { host::fputs(s.as_ptr(), self.as_ptr()) };
        if rc < 0 {
            return Err(os_error());
        }
        Ok(s.to_bytes().len())
    }

    /// Renders with the shared printf engine and writes the bytes in one
    /// `fwrite`.
    pub fn vprintf(&mut self, fmt: &[u8], args: &[Arg<'_>]) -> Result<usize> {
        let mut out = Vec::new();
        let n = printf::render(fmt, args, &mut out)?;
        if n > 0 && self.write(&out, 1, n) != n {
            return Err(os_error());
        }
        Ok(n)
    }

    pub fn clear_err(&mut self) {
        // SAFETY: `fp` is a live stream.
        unsafe { host::clearerr(self.as_ptr()) }
    }

    pub fn is_eof(&self) -> bool {
        // SAFETY: `fp` is a live stream.
        unsafe { host::feof(self.as_ptr()) != 0 }
    }

    pub fn is_error(&self) -> bool {
        // SAFETY: `fp` is a live stream.
        unsafe { host::ferror(self.as_ptr()) != 0 }
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<()> {
        let offset = c_long::try_from(offset).map_err(|_| StreamError::Overflow)?;
        // SAFETY: `fp` is a live stream.
        let rc = unsafe { host::fseek(self.as_ptr(), offset, whence.to_posix()) };
        if rc != 0 {
            return Err(os_error());
        }
        Ok(())
    }

    pub fn tell(&self) -> Result<i64> {
        // SAFETY: `fp` is a live stream.
        let pos = unsafe { host::ftell(self.as_ptr()) };
        if pos < 0 {
            return Err(os_error());
        }
        Ok(i64::from(pos))
    }

    pub fn rewind(&mut self) {
        // SAFETY: `fp` is a live stream.
        unsafe { host::rewind(self.as_ptr()) }
    }

    pub fn get_pos(&self) -> Result<RawFpos> {
        let mut pos = RawFpos::zeroed();
        // SAFETY: `pos` is larger and at least as aligned as the host fpos_t.
        let rc = unsafe { host::fgetpos(self.as_ptr(), pos.as_mut_ptr()) };
        if rc != 0 {
            return Err(os_error());
        }
        Ok(pos)
    }

    pub fn set_pos(&mut self, pos: &RawFpos) -> Result<()> {
        // SAFETY: `pos` holds a cookie produced by fgetpos.
        let rc = unsafe { host::fsetpos(self.as_ptr(), pos.as_ptr()) };
        if rc != 0 {
            return Err(os_error());
        }
        Ok(())
    }

    /// Release the handle now and report the host's close status.
    pub fn close(self) -> Result<()> {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the handle is released once.
        let rc = unsafe { this.release() };
        if rc < 0 {
            return Err(os_error());
        }
        Ok(())
    }

    /// # Safety
    ///
    /// Must run at most once per stream.
    unsafe fn release(&self) -> c_int {
        match self.close {
            CloseAction::Close => unsafe { host::fclose(self.as_ptr()) },
            CloseAction::Leave => 0,
            CloseAction::Custom(close) => unsafe { close(self.as_ptr()) },
        }
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        // SAFETY: drop runs once; `close` forgets the value before releasing.
        unsafe {
            self.release();
        }
    }
}
