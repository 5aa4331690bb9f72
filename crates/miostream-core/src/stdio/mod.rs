//! Standard I/O stream pieces.
//!
//! `mem` is the memory-backed stream, `printf` the formatting engine shared
//! with the file backing and `whence` the
//! seek origin.

pub mod mem;
pub mod printf;
pub mod whence;

/// End-of-stream sentinel of the C character functions.
pub const EOF: i32 = -1;
