//! Position snapshots.
//!
//! A snapshot remembers which backing produced it. Restoring it on a stream
//! of the other backing fails with `EINVAL`; restoring it on a different
//! stream of the same backing is not detected.

use std::ffi::c_void;
use std::fmt;

use crate::StreamKind;

/// Storage for a host `fpos_t`.
///
/// glibc and musl use 16 bytes, the BSDs 8; the extra room and alignment
/// cover any C library this crate links against.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
pub struct RawFpos([u8; 64]);

impl RawFpos {
    pub(crate) fn zeroed() -> Self {
        Self([0; 64])
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut c_void {
        self.0.as_mut_ptr().cast()
    }

    pub(crate) fn as_ptr(&self) -> *const c_void {
        self.0.as_ptr().cast()
    }
}

impl fmt::Debug for RawFpos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RawFpos(..)")
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum PosRepr {
    File(RawFpos),
    Memory(usize),
}

/// Opaque position snapshot from [`Stream::get_pos`](crate::Stream::get_pos).
#[derive(Debug, Clone, Copy)]
pub struct StreamPos(pub(crate) PosRepr);

impl StreamPos {
    /// Backing the snapshot was taken from.
    pub fn kind(&self) -> StreamKind {
        match self.0 {
            PosRepr::File(_) => StreamKind::File,
            PosRepr::Memory(_) => StreamKind::Memory,
        }
    }

    /// Byte offset of a memory snapshot.
    pub fn memory_offset(&self) -> Option<usize> {
        match self.0 {
            PosRepr::Memory(offset) => Some(offset),
            PosRepr::File(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_fpos_alignment() {
        assert_eq!(std::mem::align_of::<RawFpos>(), 16);
        assert!(std::mem::size_of::<RawFpos>() >= 16);
    }

    #[test]
    fn test_snapshot_kind() {
        let mem = StreamPos(PosRepr::Memory(7));
        assert_eq!(mem.kind(), StreamKind::Memory);
        assert_eq!(mem.memory_offset(), Some(7));
        let file = StreamPos(PosRepr::File(RawFpos::zeroed()));
        assert_eq!(file.kind(), StreamKind::File);
        assert_eq!(file.memory_offset(), None);
    }
}
