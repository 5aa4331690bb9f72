//! Script operations and what each one observes.

use std::ffi::CString;

use miostream::{Arg, Stream, StreamError, StreamPos, Whence, errno};
use serde::{Deserialize, Serialize};

/// Longest read or line buffer a script may request.
pub const MAX_TRANSFER: usize = 1 << 20;

/// Seek origin as written in fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Set,
    Cur,
    End,
}

impl From<Origin> for Whence {
    fn from(origin: Origin) -> Self {
        match origin {
            Origin::Set => Whence::Set,
            Origin::Cur => Whence::Cur,
            Origin::End => Whence::End,
        }
    }
}

/// printf argument as written in fixtures. Pointers are left out since
/// their rendering is address dependent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FixtureArg {
    Int(i64),
    Uint(u64),
    Float(f64),
    Char(u8),
    Str(String),
}

impl FixtureArg {
    #[must_use]
    pub fn as_arg(&self) -> Arg<'_> {
        match self {
            Self::Int(v) => Arg::Int(*v),
            Self::Uint(v) => Arg::Uint(*v),
            Self::Float(v) => Arg::Float(*v),
            Self::Char(c) => Arg::Char(*c),
            Self::Str(s) => Arg::Str(s.as_bytes()),
        }
    }
}

/// One stream operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Read { size: usize, nmemb: usize },
    Getc,
    Gets { len: usize },
    Ungetc { byte: u8 },
    /// `bytes.len() / size` elements.
    Write { bytes: Vec<u8>, size: usize },
    Putc { byte: u8 },
    Puts { text: String },
    Printf {
        format: String,
        #[serde(default)]
        args: Vec<FixtureArg>,
    },
    Seek { offset: i64, whence: Origin },
    Tell,
    Rewind,
    ClearErr,
    Eof,
    Error,
    GetPos,
    SetPos,
}

/// Direction an operation moves data in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
    /// Repositions, which ends the current direction.
    Reposition,
    Neutral,
}

impl Op {
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            Self::Read { .. } | Self::Getc | Self::Gets { .. } | Self::Ungetc { .. } => {
                Direction::Read
            }
            Self::Write { .. } | Self::Putc { .. } | Self::Puts { .. } | Self::Printf { .. } => {
                Direction::Write
            }
            Self::Seek { .. } | Self::Rewind | Self::SetPos => Direction::Reposition,
            Self::Tell | Self::ClearErr | Self::Eof | Self::Error | Self::GetPos => {
                Direction::Neutral
            }
        }
    }

    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read { .. } => "read",
            Self::Getc => "getc",
            Self::Gets { .. } => "gets",
            Self::Ungetc { .. } => "ungetc",
            Self::Write { .. } => "write",
            Self::Putc { .. } => "putc",
            Self::Puts { .. } => "puts",
            Self::Printf { .. } => "printf",
            Self::Seek { .. } => "seek",
            Self::Tell => "tell",
            Self::Rewind => "rewind",
            Self::ClearErr => "clear_err",
            Self::Eof => "eof",
            Self::Error => "error",
            Self::GetPos => "get_pos",
            Self::SetPos => "set_pos",
        }
    }
}

/// Return value of one operation, normalized so both backings compare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ret {
    /// Elements transferred, with the bytes of the whole elements read.
    Count { count: usize, data: Vec<u8> },
    Byte { value: Option<u8> },
    Line { value: Option<Vec<u8>> },
    Written { bytes: usize },
    Offset { value: i64 },
    Flag { value: bool },
    /// Success without a value. Also `puts`, whose byte count is host
    /// specific.
    Done,
    Failed { errno: i32 },
}

impl Ret {
    fn from_result<T>(result: Result<T, StreamError>, ok: impl FnOnce(T) -> Ret) -> Ret {
        match result {
            Ok(v) => ok(v),
            Err(err) => Ret::Failed { errno: err.errno() },
        }
    }
}

/// Everything recorded after one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub ret: Ret,
    pub eof: bool,
    pub error: bool,
    /// `None` when the position cannot be reported.
    pub tell: Option<i64>,
}

/// A stream plus the snapshot slot `GetPos`/`SetPos` share.
#[derive(Debug)]
pub struct Driver<'a> {
    pub stream: Stream<'a>,
    saved: Option<StreamPos>,
}

impl<'a> Driver<'a> {
    #[must_use]
    pub fn new(stream: Stream<'a>) -> Self {
        Self {
            stream,
            saved: None,
        }
    }

    #[must_use]
    pub fn has_snapshot(&self) -> bool {
        self.saved.is_some()
    }

    /// Apply `op` and observe the stream afterwards.
    pub fn apply(&mut self, op: &Op) -> Observation {
        let s = &mut self.stream;
        let ret = match op {
            Op::Read { size, nmemb } => {
                let len = size.saturating_mul(*nmemb).min(MAX_TRANSFER);
                let mut dst = vec![0u8; len];
                let count = s.read(&mut dst, *size, *nmemb);
                dst.truncate(count * size);
                Ret::Count { count, data: dst }
            }
            Op::Getc => Ret::Byte { value: s.getc() },
            Op::Gets { len } => {
                let mut dst = vec![0u8; (*len).min(MAX_TRANSFER)];
                Ret::Line {
                    value: s.gets(&mut dst).map(<[u8]>::to_vec),
                }
            }
            Op::Ungetc { byte } => Ret::Byte {
                value: s.ungetc(*byte),
            },
            Op::Write { bytes, size } => {
                let nmemb = bytes.len().checked_div(*size).unwrap_or(0);
                Ret::Count {
                    count: s.write(bytes, *size, nmemb),
                    data: Vec::new(),
                }
            }
            Op::Putc { byte } => Ret::Byte {
                value: s.putc(*byte),
            },
            Op::Puts { text } => {
                let end = text.find('\0').unwrap_or(text.len());
                match CString::new(&text[..end]) {
                    Ok(text) => Ret::from_result(s.puts(&text), |_| Ret::Done),
                    Err(_) => Ret::Failed {
                        errno: errno::EINVAL,
                    },
                }
            }
            Op::Printf { format, args } => {
                let args: Vec<Arg<'_>> = args.iter().map(FixtureArg::as_arg).collect();
                Ret::from_result(s.vprintf(format.as_bytes(), &args), |bytes| {
                    Ret::Written { bytes }
                })
            }
            Op::Seek { offset, whence } => {
                Ret::from_result(s.seek(*offset, (*whence).into()), |()| Ret::Done)
            }
            Op::Tell => Ret::from_result(s.tell(), |value| Ret::Offset { value }),
            Op::Rewind => {
                s.rewind();
                Ret::Done
            }
            Op::ClearErr => {
                s.clear_err();
                Ret::Done
            }
            Op::Eof => Ret::Flag {
                value: s.is_eof(),
            },
            Op::Error => Ret::Flag {
                value: s.is_error(),
            },
            Op::GetPos => match s.get_pos() {
                Ok(pos) => {
                    self.saved = Some(pos);
                    Ret::Done
                }
                Err(err) => Ret::Failed { errno: err.errno() },
            },
            Op::SetPos => match &self.saved {
                Some(pos) => Ret::from_result(s.set_pos(pos), |()| Ret::Done),
                None => Ret::Failed {
                    errno: errno::EINVAL,
                },
            },
        };
        self.observe(ret)
    }

    fn observe(&self, ret: Ret) -> Observation {
        Observation {
            ret,
            eof: self.stream.is_eof(),
            error: self.stream.is_error(),
            tell: self.stream.tell().ok(),
        }
    }
}
