//! Structured JSONL logging for harness runs.
//!
//! Provides:
//! - [`LogEntry`]: one JSONL record with required and optional fields.
//! - [`LogEmitter`]: writes records to a file, a buffer or any writer.
//! - [`validate_log_line`] / [`validate_log_file`]: schema checks.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Component prefix of every trace id.
pub const COMPONENT: &str = "miostream";

// ---------------------------------------------------------------------------
// Log entry
// ---------------------------------------------------------------------------

/// Record severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Case or step outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    /// Skipped because it falls into a documented backing difference.
    Deviation,
    Error,
}

/// Which backing a record is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backing {
    File,
    Memory,
    Both,
}

/// One line of the harness log. `timestamp`, `trace_id`, `level` and
/// `event` are always present; the rest are omitted when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backing: Option<Backing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl LogEntry {
    /// Record stamped with the current time and no optional fields.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            case: None,
            backing: None,
            operation: None,
            outcome: None,
            errno: None,
            details: None,
        }
    }

    #[must_use]
    pub fn with_case(mut self, case: impl Into<String>) -> Self {
        self.case = Some(case.into());
        self
    }

    #[must_use]
    pub fn with_backing(mut self, backing: Backing) -> Self {
        self.backing = Some(backing);
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    #[must_use]
    pub fn with_errno(mut self, errno: i32) -> Self {
        self.errno = Some(errno);
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// The record as one line of JSON, without the newline.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Appends [`LogEntry`] records to a writer, one JSON object per line,
/// numbering trace ids `miostream::<run>::<seq>`.
pub struct LogEmitter<W: Write> {
    writer: W,
    prefix: String,
    seq: u32,
}

impl LogEmitter<BufWriter<File>> {
    /// Log to a freshly created file at `path`.
    pub fn to_file(path: &Path, run_id: &str) -> std::io::Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?), run_id))
    }
}

impl LogEmitter<Vec<u8>> {
    /// Log into memory; recover the bytes with [`LogEmitter::into_inner`].
    #[must_use]
    pub fn to_buffer(run_id: &str) -> Self {
        Self::new(Vec::new(), run_id)
    }
}

impl<W: Write> LogEmitter<W> {
    #[must_use]
    pub fn new(writer: W, run_id: &str) -> Self {
        Self {
            writer,
            prefix: format!("{COMPONENT}::{run_id}"),
            seq: 0,
        }
    }

    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{:03}", self.prefix, self.seq)
    }

    /// Write a record carrying only the required fields.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let entry = LogEntry::new(self.next_trace_id(), level, event);
        self.write_line(&entry)?;
        Ok(entry)
    }

    /// Write a built record, numbering it if its trace id is blank.
    pub fn emit_entry(&mut self, mut entry: LogEntry) -> std::io::Result<()> {
        if entry.trace_id.is_empty() {
            entry.trace_id = self.next_trace_id();
        }
        self.write_line(&entry)
    }

    fn write_line(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, entry).map_err(std::io::Error::other)?;
        self.writer.write_all(b"\n")
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

// ---------------------------------------------------------------------------
// Schema checks
// ---------------------------------------------------------------------------

/// One schema problem found in a log record.
#[derive(Debug)]
pub struct LogValidationError {
    pub line_number: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for LogValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line_number, self.field, self.message)
    }
}

const LEVELS: &[&str] = &["debug", "info", "warn", "error"];
const OUTCOMES: &[&str] = &["pass", "fail", "deviation", "error"];
const BACKINGS: &[&str] = &["file", "memory", "both"];

/// Problems collected while checking a single line.
struct Findings {
    line_number: usize,
    errors: Vec<LogValidationError>,
}

impl Findings {
    fn flag(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(LogValidationError {
            line_number: self.line_number,
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn fail(mut self, field: &str, message: impl Into<String>) -> Vec<LogValidationError> {
        self.flag(field, message);
        self.errors
    }

    fn one_of(&mut self, obj: &Map<String, Value>, field: &str, allowed: &[&str]) {
        match obj.get(field) {
            None => {}
            Some(Value::String(s)) if allowed.contains(&s.as_str()) => {}
            Some(other) => self.flag(field, format!("{other} is not one of {allowed:?}")),
        }
    }
}

fn trace_id_is_well_formed(trace_id: &str) -> bool {
    let mut parts = trace_id.split("::");
    let (Some(component), Some(run), Some(seq), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    component == COMPONENT && !run.is_empty() && !seq.is_empty() && seq.bytes().all(|b| b.is_ascii_digit())
}

/// Check one JSONL line and parse it into a [`LogEntry`].
///
/// All problems on the line are reported together.
pub fn validate_log_line(
    line: &str,
    line_number: usize,
) -> Result<LogEntry, Vec<LogValidationError>> {
    let mut findings = Findings {
        line_number,
        errors: Vec::new(),
    };

    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Err(findings.fail("<json>", format!("not JSON: {e}"))),
    };
    let Some(obj) = value.as_object() else {
        return Err(findings.fail("<root>", "record must be a JSON object"));
    };

    for field in ["timestamp", "trace_id", "level", "event"] {
        if !obj.contains_key(field) {
            findings.flag(field, "missing");
        }
    }
    findings.one_of(obj, "level", LEVELS);
    findings.one_of(obj, "outcome", OUTCOMES);
    findings.one_of(obj, "backing", BACKINGS);

    if let Some(trace_id) = obj.get("trace_id").and_then(Value::as_str)
        && !trace_id_is_well_formed(trace_id)
    {
        findings.flag(
            "trace_id",
            format!("expected {COMPONENT}::<run>::<seq>, got '{trace_id}'"),
        );
    }
    if let Some(errno) = obj.get("errno")
        && !errno.as_i64().is_some_and(|e| e > 0)
    {
        findings.flag("errno", format!("expected a positive code, got {errno}"));
    }
    if obj.get("outcome").and_then(Value::as_str) == Some("deviation")
        && !obj.contains_key("case")
    {
        findings.flag("case", "deviation records must name their case");
    }

    if !findings.errors.is_empty() {
        return Err(findings.errors);
    }
    serde_json::from_value(value).map_err(|e| findings.fail("<record>", e.to_string()))
}

/// Check every non-blank line of a JSONL file.
///
/// Returns how many records were checked and every problem found.
pub fn validate_log_file(path: &Path) -> std::io::Result<(usize, Vec<LogValidationError>)> {
    let content = std::fs::read_to_string(path)?;
    let mut checked = 0;
    let mut problems = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        checked += 1;
        if let Err(errs) = validate_log_line(line, index + 1) {
            problems.extend(errs);
        }
    }
    Ok((checked, problems))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn now_utc() -> String {
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_utc(duration.as_secs(), duration.subsec_millis())
}

fn format_utc(secs: u64, millis: u32) -> String {
    let days = secs / 86_400;
    let rem = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}.{millis:03}Z",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60,
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}
