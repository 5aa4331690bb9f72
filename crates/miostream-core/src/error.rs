//! Stream error type.
//!
//! Every failing stream operation reports one of these. `errno()` gives the
//! code a C caller of the equivalent stdio function would have seen.

use thiserror::Error;

use crate::errno;
use crate::stdio::printf::FormatError;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("stream offset does not fit the signed offset range")]
    Overflow,
    #[error("stream position cannot be represented")]
    Io,
    #[error("fixed-size memory stream cannot hold {requested} bytes")]
    NoSpace { requested: usize },
    #[error("memory stream could not grow to {requested} bytes")]
    OutOfMemory { requested: usize },
    #[error("format: {0}")]
    Format(#[from] FormatError),
    #[error("os: {0}")]
    Os(#[from] std::io::Error),
}

impl StreamError {
    /// The errno value equivalent to this failure.
    pub fn errno(&self) -> i32 {
        match self {
            Self::InvalidArgument | Self::Format(_) => errno::EINVAL,
            Self::Overflow => errno::EOVERFLOW,
            Self::Io => errno::EIO,
            Self::NoSpace { .. } => errno::ENOSPC,
            Self::OutOfMemory { .. } => errno::ENOMEM,
            Self::Os(err) => err.raw_os_error().unwrap_or(errno::EIO),
        }
    }
}

pub type Result<T, E = StreamError> = std::result::Result<T, E>;
