use std::time::Duration;

use serde::Serialize;

use crate::violation::{DrcItem, ErrorCode, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Complete,
    /// Stopped early; the items are what was found before stopping.
    Cancelled,
}

/// Outcome of one DRC run.
#[derive(Debug, Clone, Serialize)]
pub struct DrcReport {
    pub items: Vec<DrcItem>,
    pub status: RunStatus,
    /// Providers that ran to completion, in order.
    pub providers_run: Vec<String>,
    /// Providers that had nothing to check.
    pub tests_not_run: Vec<String>,
    pub duration: Duration,
}

impl DrcReport {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Complete
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|i| i.severity == severity).count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn by_code(&self, code: ErrorCode) -> impl Iterator<Item = &DrcItem> {
        self.items.iter().filter(move |i| i.error_code == code)
    }

    pub fn summary(&self) -> String {
        let status = match self.status {
            RunStatus::Complete => "complete",
            RunStatus::Cancelled => "cancelled",
        };
        format!(
            "DRC {status} in {:.2?}: {} error(s), {} warning(s), {} provider(s) run, {} skipped",
            self.duration,
            self.error_count(),
            self.warning_count(),
            self.providers_run.len(),
            self.tests_not_run.len()
        )
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
