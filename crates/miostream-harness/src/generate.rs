//! Seeded random scripts.
//!
//! Generated scripts stay inside the envelope where file and memory streams
//! must agree: seeks never pass the end, a pushback is never stacked or made
//! at offset 0 and is always consumed by the next operation, line buffers
//! hold at least two bytes, and a `Seek { 0, Cur }` separates every switch
//! between reading and writing. A memory stream is run alongside as the
//! model that keeps track of size and position.

use miostream::Stream;

use crate::fixtures::{FixtureSet, ScriptCase};
use crate::script::{Direction, Driver, FixtureArg, Op, Origin};

/// Longest generated initial content.
const MAX_CONTENT: usize = 96;

pub struct Generator {
    rng: fastrand::Rng,
}

impl Generator {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// A set of `cases` scripts with `ops` operations each.
    #[must_use]
    pub fn fixture_set(seed: u64, cases: usize, ops: usize) -> FixtureSet {
        let mut generator = Self::new(seed);
        let cases = (0..cases)
            .map(|i| generator.case(format!("gen-{seed}-{i:04}"), ops))
            .collect();
        FixtureSet::new(Some(seed), cases)
    }

    /// One script with at least `ops` operations.
    pub fn case(&mut self, name: String, ops: usize) -> ScriptCase {
        let content = self.content();
        let mut model = Driver::new(Stream::growable(content.clone()));
        let mut script = Vec::with_capacity(ops + ops / 4);
        let mut last = None;

        while script.len() < ops {
            let op = self.pick(&model);
            let unget = matches!(op, Op::Ungetc { .. });
            push_op(&mut model, &mut script, &mut last, op);
            if unget {
                let follow = self.read_op();
                push_op(&mut model, &mut script, &mut last, follow);
            }
        }

        ScriptCase {
            name,
            content,
            ops: script,
        }
    }

    fn content(&mut self) -> Vec<u8> {
        let len = self.rng.usize(0..=MAX_CONTENT);
        (0..len)
            .map(|_| {
                if self.rng.u8(0..8) == 0 {
                    b'\n'
                } else {
                    self.rng.u8(b'a'..=b'z')
                }
            })
            .collect()
    }

    fn byte(&mut self) -> u8 {
        self.rng.u8(1..=u8::MAX)
    }

    fn word(&mut self, max: usize) -> String {
        let len = self.rng.usize(0..=max);
        std::iter::repeat_with(|| self.rng.alphanumeric())
            .take(len)
            .collect()
    }

    fn read_op(&mut self) -> Op {
        match self.rng.usize(0..3) {
            0 => Op::Read {
                size: self.rng.usize(1..=4),
                nmemb: self.rng.usize(1..=8),
            },
            1 => Op::Getc,
            _ => Op::Gets {
                len: self.rng.usize(2..=24),
            },
        }
    }

    fn printf_op(&mut self) -> Op {
        let (format, args) = match self.rng.usize(0..6) {
            0 => ("%d", vec![FixtureArg::Int(self.rng.i64(-99_999..=99_999))]),
            1 => ("[%5x]", vec![FixtureArg::Uint(self.rng.u64(0..=0xffff))]),
            2 => ("%-6s|", vec![FixtureArg::Str(self.word(8))]),
            3 => (
                "%.3f",
                vec![FixtureArg::Float(f64::from(self.rng.i32(-10_000..=10_000)) / 8.0)],
            ),
            4 => (
                "%c%c",
                vec![FixtureArg::Char(self.byte()), FixtureArg::Char(self.byte())],
            ),
            _ => (
                "%e %g\n",
                vec![
                    FixtureArg::Float(f64::from(self.rng.i32(..)) / 64.0),
                    FixtureArg::Float(f64::from(self.rng.i32(-500..=500)) / 4.0),
                ],
            ),
        };
        Op::Printf {
            format: format.to_string(),
            args,
        }
    }

    fn seek_op(&mut self, tell: i64, size: i64) -> Op {
        match self.rng.usize(0..3) {
            0 => Op::Seek {
                offset: self.rng.i64(0..=size),
                whence: Origin::Set,
            },
            1 => Op::Seek {
                offset: self.rng.i64(-tell..=size - tell),
                whence: Origin::Cur,
            },
            _ => Op::Seek {
                offset: self.rng.i64(-size..=0),
                whence: Origin::End,
            },
        }
    }

    fn pick(&mut self, model: &Driver<'_>) -> Op {
        let (tell, size) = match model.stream.as_memory() {
            Some(mem) => (
                mem.tell().unwrap_or(0),
                i64::try_from(mem.size()).unwrap_or(i64::MAX),
            ),
            None => (0, 0),
        };
        match self.rng.usize(0..16) {
            0..=2 => self.read_op(),
            3 if tell > 0 => Op::Ungetc { byte: self.byte() },
            3 => Op::Getc,
            4 => {
                let size = self.rng.usize(1..=3);
                let len = size * self.rng.usize(0..=6);
                Op::Write {
                    bytes: (0..len).map(|_| self.byte()).collect(),
                    size,
                }
            }
            5 => Op::Putc { byte: self.byte() },
            6 => {
                let mut text = self.word(10);
                if self.rng.bool() {
                    text.push('\n');
                }
                Op::Puts { text }
            }
            7 => self.printf_op(),
            8 | 9 => self.seek_op(tell, size),
            10 => Op::Tell,
            11 => Op::Rewind,
            12 => Op::ClearErr,
            13 => {
                if self.rng.bool() {
                    Op::Eof
                } else {
                    Op::Error
                }
            }
            14 => Op::GetPos,
            _ if model.has_snapshot() => Op::SetPos,
            _ => Op::GetPos,
        }
    }
}

fn push_op(
    model: &mut Driver<'_>,
    script: &mut Vec<Op>,
    last: &mut Option<Direction>,
    op: Op,
) {
    let direction = op.direction();
    match direction {
        Direction::Read | Direction::Write => {
            if last.is_some_and(|prev| prev != direction) {
                let sync = Op::Seek {
                    offset: 0,
                    whence: Origin::Cur,
                };
                model.apply(&sync);
                script.push(sync);
            }
            *last = Some(direction);
        }
        Direction::Reposition => *last = None,
        Direction::Neutral => {}
    }
    model.apply(&op);
    script.push(op);
}
