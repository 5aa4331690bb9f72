//! Run results and report rendering.

use serde::{Deserialize, Serialize};

use crate::script::{Observation, Op};

/// An operation skipped because the backings are documented to differ on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    pub step: usize,
    pub op: Op,
    pub reason: String,
}

/// Where file and memory first disagreed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Divergence {
    /// An operation returned or left behind different state.
    Observation {
        step: usize,
        op: Op,
        file: Observation,
        memory: Observation,
    },
    /// Every operation agreed but the final contents differ.
    Content {
        file_len: usize,
        memory_len: usize,
        file_sha256: String,
        memory_sha256: String,
    },
}

impl Divergence {
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Observation { step, op, .. } => format!("step {step} ({})", op.name()),
            Self::Content {
                file_len,
                memory_len,
                ..
            } => format!("content (file {file_len} bytes, memory {memory_len} bytes)"),
        }
    }
}

/// Result of running one script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    /// Digest of the initial content.
    pub content_sha256: String,
    /// Operations applied to both backings.
    pub steps_run: usize,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divergence: Option<Divergence>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deviations: Vec<Deviation>,
    /// Digest of the final content when both backings agree.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_sha256: Option<String>,
}

/// Aggregate report for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub title: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub deviations: usize,
    pub cases: Vec<CaseResult>,
}

impl RunReport {
    /// Build a report from a list of results.
    #[must_use]
    pub fn from_results(
        title: impl Into<String>,
        timestamp: impl Into<String>,
        seed: Option<u64>,
        cases: Vec<CaseResult>,
    ) -> Self {
        let total = cases.len();
        let passed = cases.iter().filter(|c| c.passed).count();
        let deviations = cases.iter().map(|c| c.deviations.len()).sum();
        Self {
            title: title.into(),
            timestamp: timestamp.into(),
            seed,
            total,
            passed,
            failed: total - passed,
            deviations,
            cases,
        }
    }

    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Render the report as markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- Timestamp: {}\n", self.timestamp));
        if let Some(seed) = self.seed {
            out.push_str(&format!("- Seed: {seed}\n"));
        }
        out.push_str(&format!("- Total: {}\n", self.total));
        out.push_str(&format!("- Passed: {}\n", self.passed));
        out.push_str(&format!("- Failed: {}\n", self.failed));
        out.push_str(&format!("- Deviations skipped: {}\n\n", self.deviations));

        out.push_str("| Case | Steps | Status | First divergence |\n");
        out.push_str("|------|-------|--------|------------------|\n");
        for c in &self.cases {
            let status = if c.passed { "PASS" } else { "FAIL" };
            let divergence = c
                .divergence
                .as_ref()
                .map_or_else(|| "-".to_string(), Divergence::summary);
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                c.name, c.steps_run, status, divergence
            ));
        }
        out
    }

    /// Render the report as JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}
