//! Host C stdio entry points used by the file backing.
//!
//! Position cookies go through `*mut c_void` because `fpos_t` is opaque and
//! its size differs between C libraries; see [`crate::pos::RawFpos`].

use std::ffi::{c_char, c_int, c_long, c_void};

use libc::{FILE, size_t};

unsafe extern "C" {
    pub fn fopen(path: *const c_char, mode: *const c_char) -> *mut FILE;
    pub fn fdopen(fd: c_int, mode: *const c_char) -> *mut FILE;
    pub fn fclose(stream: *mut FILE) -> c_int;

    pub fn fread(ptr: *mut c_void, size: size_t, nmemb: size_t, stream: *mut FILE) -> size_t;
    pub fn fwrite(ptr: *const c_void, size: size_t, nmemb: size_t, stream: *mut FILE) -> size_t;
    pub fn fgetc(stream: *mut FILE) -> c_int;
    pub fn fgets(s: *mut c_char, n: c_int, stream: *mut FILE) -> *mut c_char;
    pub fn ungetc(c: c_int, stream: *mut FILE) -> c_int;
    pub fn fputc(c: c_int, stream: *mut FILE) -> c_int;
    pub fn fputs(s: *const c_char, stream: *mut FILE) -> c_int;

    pub fn clearerr(stream: *mut FILE);
    pub fn feof(stream: *mut FILE) -> c_int;
    pub fn ferror(stream: *mut FILE) -> c_int;

    pub fn fseek(stream: *mut FILE, offset: c_long, whence: c_int) -> c_int;
    pub fn ftell(stream: *mut FILE) -> c_long;
    pub fn rewind(stream: *mut FILE);
    pub fn fgetpos(stream: *mut FILE, pos: *mut c_void) -> c_int;
    pub fn fsetpos(stream: *mut FILE, pos: *const c_void) -> c_int;
}
