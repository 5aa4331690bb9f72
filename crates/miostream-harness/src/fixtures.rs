//! Fixture loading and management.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HarnessError;
use crate::script::Op;

/// Current fixture schema version.
pub const FIXTURE_VERSION: &str = "v1";

/// One script: initial stream content and the operations to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptCase {
    /// Case identifier.
    pub name: String,
    /// Initial bytes of both the file and the memory buffer.
    #[serde(default)]
    pub content: Vec<u8>,
    pub ops: Vec<Op>,
}

/// A collection of scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSet {
    /// Schema version.
    pub version: String,
    /// Seed the set was generated from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub cases: Vec<ScriptCase>,
}

impl FixtureSet {
    #[must_use]
    pub fn new(seed: Option<u64>, cases: Vec<ScriptCase>) -> Self {
        Self {
            version: FIXTURE_VERSION.to_string(),
            seed,
            cases,
        }
    }

    /// Load fixture set from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize fixture set to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load fixture set from a file path. Unknown schema versions are
    /// rejected.
    pub fn from_file(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path)?;
        let set = Self::from_json(&content)?;
        if set.version != FIXTURE_VERSION {
            return Err(HarnessError::Fixture {
                path: path.display().to_string(),
                message: format!(
                    "unsupported version '{}', expected '{FIXTURE_VERSION}'",
                    set.version
                ),
            });
        }
        Ok(set)
    }

    /// Load every `*.json` fixture in `dir`, in file-name order.
    pub fn from_dir(dir: &Path) -> Result<Vec<Self>, HarnessError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("json"))
            .collect();
        paths.sort();
        paths.iter().map(|path| Self::from_file(path)).collect()
    }
}
