//! Test execution engine.
//!
//! Each script runs against a temporary file opened `"r+b"` and a growable
//! memory stream holding the same bytes. After every operation both
//! observations must match; at the end both contents must match.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use miostream::Stream;

use crate::error::HarnessError;
use crate::fixtures::{FixtureSet, ScriptCase};
use crate::report::{CaseResult, Deviation, Divergence};
use crate::script::{Driver, Op, Origin};
use crate::sha256_hex;
use crate::structured_log::{Backing, LogEmitter, LogEntry, LogLevel, Outcome};

/// Why `op` cannot be compared in the memory stream's current state, if it
/// cannot.
#[must_use]
pub fn deviation(op: &Op, memory: &Stream<'_>) -> Option<&'static str> {
    let mem = memory.as_memory()?;
    match op {
        Op::Seek { offset, whence } => {
            let base = match whence {
                Origin::Set => 0,
                Origin::Cur => mem.tell().unwrap_or(-1),
                Origin::End => i64::try_from(mem.size()).unwrap_or(i64::MAX),
            };
            let target = i128::from(base) + i128::from(*offset);
            (target > mem.size() as i128).then_some("seek past end of memory data")
        }
        Op::Ungetc { .. } => mem
            .pushback()
            .is_some()
            .then_some("second consecutive pushback"),
        Op::Gets { len } => (*len < 2).then_some("line buffer shorter than two bytes"),
        _ => None,
    }
}

/// Runs scripts and collects results.
pub struct TestRunner {
    /// Name of the campaign; used in temp file names.
    pub campaign: String,
    /// Directory for temporary files.
    pub workdir: PathBuf,
}

impl TestRunner {
    /// Create a new test runner.
    #[must_use]
    pub fn new(campaign: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            campaign: campaign.into(),
            workdir: workdir.into(),
        }
    }

    /// Run every case in `set`, logging one record per case and per
    /// divergence or deviation.
    pub fn run<W: Write>(
        &self,
        set: &FixtureSet,
        log: &mut LogEmitter<W>,
    ) -> Result<Vec<CaseResult>, HarnessError> {
        let mut results = Vec::with_capacity(set.cases.len());
        for (index, case) in set.cases.iter().enumerate() {
            let result = self.run_case(index, case)?;
            log_case(log, &result)?;
            results.push(result);
        }
        log.flush()?;
        Ok(results)
    }

    /// Run one case.
    pub fn run_case(&self, index: usize, case: &ScriptCase) -> Result<CaseResult, HarnessError> {
        let path = self.temp_path(index);
        std::fs::write(&path, &case.content)?;
        let outcome = run_on(&path, case);
        let cleanup = std::fs::remove_file(&path);
        let result = outcome?;
        cleanup?;
        Ok(result)
    }

    fn temp_path(&self, index: usize) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        self.workdir.join(format!(
            "{}-{index}-{}-{nanos}.bin",
            self.campaign,
            std::process::id()
        ))
    }
}

fn run_on(path: &Path, case: &ScriptCase) -> Result<CaseResult, HarnessError> {
    let mut file = Driver::new(Stream::open(path, "r+b")?);
    let mut memory = Driver::new(Stream::growable(case.content.clone()));

    let mut deviations = Vec::new();
    let mut divergence = None;
    let mut steps_run = 0;

    for (step, op) in case.ops.iter().enumerate() {
        if let Some(reason) = deviation(op, &memory.stream) {
            deviations.push(Deviation {
                step,
                op: op.clone(),
                reason: reason.to_string(),
            });
            continue;
        }
        let from_file = file.apply(op);
        let from_memory = memory.apply(op);
        steps_run += 1;
        if from_file != from_memory {
            divergence = Some(Divergence::Observation {
                step,
                op: op.clone(),
                file: from_file,
                memory: from_memory,
            });
            break;
        }
    }

    file.stream.close()?;
    let file_bytes = std::fs::read(path)?;
    let memory_bytes = memory
        .stream
        .as_memory()
        .map(|mem| mem.as_bytes().to_vec())
        .unwrap_or_default();

    let final_sha256 = sha256_hex(&memory_bytes);
    if divergence.is_none() && file_bytes != memory_bytes {
        divergence = Some(Divergence::Content {
            file_len: file_bytes.len(),
            memory_len: memory_bytes.len(),
            file_sha256: sha256_hex(&file_bytes),
            memory_sha256: final_sha256.clone(),
        });
    }

    let passed = divergence.is_none();
    Ok(CaseResult {
        name: case.name.clone(),
        content_sha256: sha256_hex(&case.content),
        steps_run,
        passed,
        divergence,
        deviations,
        final_sha256: passed.then_some(final_sha256),
    })
}

fn log_case<W: Write>(log: &mut LogEmitter<W>, result: &CaseResult) -> std::io::Result<()> {
    for d in &result.deviations {
        log.emit_entry(
            LogEntry::new("", LogLevel::Warn, "deviation_skipped")
                .with_case(&result.name)
                .with_backing(Backing::Memory)
                .with_operation(d.op.name())
                .with_outcome(Outcome::Deviation)
                .with_details(serde_json::json!({ "step": d.step, "reason": d.reason })),
        )?;
    }
    if let Some(divergence) = &result.divergence {
        let details = serde_json::to_value(divergence).map_err(std::io::Error::other)?;
        let mut entry = LogEntry::new("", LogLevel::Error, "divergence")
            .with_case(&result.name)
            .with_backing(Backing::Both)
            .with_outcome(Outcome::Fail)
            .with_details(details);
        if let Divergence::Observation { op, .. } = divergence {
            entry = entry.with_operation(op.name());
        }
        log.emit_entry(entry)?;
    }
    let outcome = if result.passed {
        Outcome::Pass
    } else {
        Outcome::Fail
    };
    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "case_done")
            .with_case(&result.name)
            .with_backing(Backing::Both)
            .with_outcome(outcome)
            .with_details(serde_json::json!({
                "steps_run": result.steps_run,
                "content_sha256": result.content_sha256,
            })),
    )
}
