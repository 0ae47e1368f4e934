use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use opensilicon_core::mm;

use crate::error::DrcError;
use crate::violation::{ErrorCode, Severity};

/// Board-wide minimum values. These become the `board setup` implicit rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardMinimums {
    pub clearance: f64,
    pub track_width: f64,
    pub via_diameter: f64,
    pub hole_size: f64,
    pub hole_clearance: f64,
    pub edge_clearance: f64,
    pub courtyard_clearance: f64,
}

impl Default for BoardMinimums {
    fn default() -> Self {
        Self {
            clearance: 0.0,
            track_width: 0.0,
            via_diameter: mm(0.5),
            hole_size: mm(0.3),
            hole_clearance: mm(0.25),
            edge_clearance: mm(0.5),
            courtyard_clearance: 0.0,
        }
    }
}

/// DRC configuration stored with the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrcSettings {
    /// Per-code severity overrides; codes not listed use their default.
    pub severities: BTreeMap<ErrorCode, Severity>,
    /// Stop reporting a code once this many violations of it were reported.
    pub max_errors_per_code: Option<usize>,
    pub board_minimums: BoardMinimums,
    /// How often parallel sweeps wake up to report progress.
    pub progress_poll_ms: u64,
    /// Worker threads for parallel sweeps; `None` uses the shared pool.
    pub worker_threads: Option<usize>,
    /// Rule document loaded alongside the implicit rules.
    pub rule_file: Option<PathBuf>,
}

impl Default for DrcSettings {
    fn default() -> Self {
        Self {
            severities: BTreeMap::new(),
            max_errors_per_code: None,
            board_minimums: BoardMinimums::default(),
            progress_poll_ms: 250,
            worker_threads: None,
            rule_file: None,
        }
    }
}

impl DrcSettings {
    pub fn severity_override(&self, code: ErrorCode) -> Option<Severity> {
        self.severities.get(&code).copied()
    }

    /// Severity a violation of `code` is reported with.
    pub fn severity(&self, code: ErrorCode) -> Severity {
        self.severity_override(code)
            .unwrap_or_else(|| code.default_severity())
    }

    pub fn set_severity(&mut self, code: ErrorCode, severity: Severity) {
        if severity == code.default_severity() {
            self.severities.remove(&code);
        } else {
            self.severities.insert(code, severity);
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.progress_poll_ms.max(1))
    }

    pub fn load(path: &Path) -> Result<Self, DrcError> {
        let json = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&json)?;
        log::info!("DRC settings loaded from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), DrcError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = DrcSettings::default();
        assert_eq!(settings.severity(ErrorCode::Clearance), Severity::Error);
        assert_eq!(settings.severity(ErrorCode::MissingCourtyard), Severity::Ignore);
        assert_eq!(settings.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_override_and_reset() {
        let mut settings = DrcSettings::default();
        settings.set_severity(ErrorCode::TrackWidth, Severity::Warning);
        assert_eq!(settings.severity_override(ErrorCode::TrackWidth), Some(Severity::Warning));
        settings.set_severity(ErrorCode::TrackWidth, Severity::Error);
        assert!(settings.severities.is_empty());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: DrcSettings =
            serde_json::from_str(r#"{"max_errors_per_code": 5, "severities": {"clearance": "warning"}}"#).unwrap();
        assert_eq!(settings.max_errors_per_code, Some(5));
        assert_eq!(settings.severity(ErrorCode::Clearance), Severity::Warning);
        assert_eq!(settings.progress_poll_ms, 250);
    }

    #[test]
    fn test_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drc.json");
        let mut settings = DrcSettings::default();
        settings.worker_threads = Some(2);
        settings.save(&path).unwrap();
        assert_eq!(DrcSettings::load(&path).unwrap(), settings);
    }
}
