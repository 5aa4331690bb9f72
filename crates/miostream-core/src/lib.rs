//! # miostream-core
//!
//! Safe Rust building blocks for stdio-style streams.
//!
//! This crate holds everything that can be written without touching the host
//! C library: the memory-backed stream, the printf engine it shares with the
//! file backing, seek origins, and the error type used
//! across the workspace. No `unsafe` code is permitted at the crate level.

#![deny(unsafe_code)]

pub mod errno;
pub mod error;
pub mod stdio;

pub use error::{Result, StreamError};
pub use stdio::mem::{
    CHUNK_SIZE, Cursor, Dispose, FnRealloc, LimitedRealloc, MemBuffer, MemStream, Realloc,
    TryRealloc,
};
pub use stdio::printf::{Arg, FormatError};
pub use stdio::whence::Whence;
