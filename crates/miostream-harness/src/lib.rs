//! Behavioural-equivalence harness for miostream.
//!
//! This crate provides:
//! - Scripts: serde-encoded operation sequences over an initial content
//! - Runner: applies each script to a host file stream and a memory stream
//!   and reports the first divergence
//! - Generator: seeded random scripts that stay inside the documented
//!   equivalence envelope
//! - Structured JSONL logging and markdown/JSON run reports

#![forbid(unsafe_code)]

pub mod error;
pub mod fixtures;
pub mod generate;
pub mod report;
pub mod runner;
pub mod script;
pub mod structured_log;

pub use error::HarnessError;
pub use fixtures::{FixtureSet, ScriptCase};
pub use generate::Generator;
pub use report::{CaseResult, RunReport};
pub use runner::TestRunner;
pub use script::{FixtureArg, Observation, Op, Ret};

pub(crate) fn hex_lower(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// SHA-256 of `data` as lowercase hex.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::Digest;
    hex_lower(&sha2::Sha256::digest(data))
}
