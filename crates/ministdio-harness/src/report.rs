//! JSONL check records and run summaries.

use serde::{Deserialize, Serialize};

/// Check outcome. `Skip` marks environment gaps, never assertion
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
}

/// One executed check as a JSONL record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecord {
    /// Check identifier, stable across runs.
    pub check: String,
    /// Human-readable statement of the property under test.
    pub property: String,
    pub outcome: Outcome,
    /// Failure or skip reason; absent on pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckRecord {
    /// Serialize to a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Aggregate counts over one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    #[must_use]
    pub fn from_records(records: &[CheckRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            passed: 0,
            failed: 0,
            skipped: 0,
        };
        for record in records {
            match record.outcome {
                Outcome::Pass => summary.passed += 1,
                Outcome::Fail => summary.failed += 1,
                Outcome::Skip => summary.skipped += 1,
            }
        }
        summary
    }

    /// Skips do not count against a run; only failures do.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}
