use std::fmt;

use serde::{Deserialize, Serialize};

use opensilicon_core::{ItemId, LayerId, Point};

/// Version of the [`ErrorCode`] set. Bumped whenever a code is added or retired.
pub const ERROR_CODES_VERSION: u32 = 1;

/// Kind of DRC violation. The set is closed; consumers filter and display by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnconnectedItems,
    Clearance,
    HoleClearance,
    CopperEdgeClearance,
    TrackWidth,
    TrackAngle,
    ViaDiameter,
    DrillOutOfRange,
    OverlappingFootprints,
    MissingCourtyard,
    ItemsNotAllowed,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 11] = [
        ErrorCode::UnconnectedItems,
        ErrorCode::Clearance,
        ErrorCode::HoleClearance,
        ErrorCode::CopperEdgeClearance,
        ErrorCode::TrackWidth,
        ErrorCode::TrackAngle,
        ErrorCode::ViaDiameter,
        ErrorCode::DrillOutOfRange,
        ErrorCode::OverlappingFootprints,
        ErrorCode::MissingCourtyard,
        ErrorCode::ItemsNotAllowed,
    ];

    /// Stable key used in settings files and reports.
    pub fn key(&self) -> &'static str {
        match self {
            ErrorCode::UnconnectedItems => "unconnected_items",
            ErrorCode::Clearance => "clearance",
            ErrorCode::HoleClearance => "hole_clearance",
            ErrorCode::CopperEdgeClearance => "copper_edge_clearance",
            ErrorCode::TrackWidth => "track_width",
            ErrorCode::TrackAngle => "track_angle",
            ErrorCode::ViaDiameter => "via_diameter",
            ErrorCode::DrillOutOfRange => "drill_out_of_range",
            ErrorCode::OverlappingFootprints => "overlapping_footprints",
            ErrorCode::MissingCourtyard => "missing_courtyard",
            ErrorCode::ItemsNotAllowed => "items_not_allowed",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    pub fn title(&self) -> &'static str {
        match self {
            ErrorCode::UnconnectedItems => "Missing connection between items",
            ErrorCode::Clearance => "Clearance violation",
            ErrorCode::HoleClearance => "Hole clearance violation",
            ErrorCode::CopperEdgeClearance => "Board edge clearance violation",
            ErrorCode::TrackWidth => "Track width",
            ErrorCode::TrackAngle => "Track angle",
            ErrorCode::ViaDiameter => "Via diameter",
            ErrorCode::DrillOutOfRange => "Drilled hole size out of range",
            ErrorCode::OverlappingFootprints => "Courtyards overlap",
            ErrorCode::MissingCourtyard => "Footprint has no courtyard defined",
            ErrorCode::ItemsNotAllowed => "Items not allowed",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorCode::MissingCourtyard => Severity::Ignore,
            ErrorCode::TrackAngle => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Severity level of a constraint or violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    /// Reported but excluded by the user.
    Exclusion,
    /// Never reported.
    Ignore,
}

impl Severity {
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "error" => Some(Severity::Error),
            "warning" => Some(Severity::Warning),
            "exclusion" => Some(Severity::Exclusion),
            "ignore" => Some(Severity::Ignore),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Exclusion => write!(f, "exclusion"),
            Severity::Ignore => write!(f, "ignore"),
        }
    }
}

/// A single DRC violation with location and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrcItem {
    pub error_code: ErrorCode,
    /// One or two involved items.
    pub items: Vec<ItemId>,
    pub location: Point,
    pub layer: Option<LayerId>,
    pub severity: Severity,
    pub detail: String,
    /// Name of the rule that produced the violated constraint.
    pub rule_name: Option<String>,
}

impl DrcItem {
    pub fn new(error_code: ErrorCode) -> Self {
        Self {
            error_code,
            items: Vec::new(),
            location: Point::new(0.0, 0.0),
            layer: None,
            severity: error_code.default_severity(),
            detail: String::new(),
            rule_name: None,
        }
    }

    pub fn with_items(mut self, a: ItemId, b: Option<ItemId>) -> Self {
        self.items = std::iter::once(a).chain(b).collect();
        self
    }

    pub fn at(mut self, location: Point, layer: Option<LayerId>) -> Self {
        self.location = location;
        self.layer = layer;
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    pub fn with_rule(mut self, rule_name: impl Into<String>) -> Self {
        self.rule_name = Some(rule_name.into());
        self
    }

    pub fn title(&self) -> &'static str {
        self.error_code.title()
    }

    pub fn display_text(&self) -> String {
        match (&self.detail, &self.rule_name) {
            (d, Some(rule)) if !d.is_empty() => format!("{} ({}; rule '{}')", self.title(), d, rule),
            (d, None) if !d.is_empty() => format!("{} ({})", self.title(), d),
            (_, Some(rule)) => format!("{} (rule '{}')", self.title(), rule),
            _ => self.title().to_string(),
        }
    }

    /// Whether two items describe the same violation (ignoring severity and text).
    pub fn same_violation(&self, other: &DrcItem) -> bool {
        let mut a = self.items.clone();
        let mut b = other.items.clone();
        a.sort();
        b.sort();
        self.error_code == other.error_code
            && a == b
            && self.layer == other.layer
            && self.location.distance_to(&other.location) < 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_code_keys_are_unique_and_roundtrip() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_key(code.key()), Some(code));
        }
        let mut keys: Vec<_> = ErrorCode::ALL.iter().map(|c| c.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), ErrorCode::ALL.len());
    }

    #[test]
    fn test_display_text_mentions_rule() {
        let item = DrcItem::new(ErrorCode::Clearance)
            .with_detail("clearance 0.5000 mm; actual 0.3000 mm")
            .with_rule("R1");
        assert_eq!(
            item.display_text(),
            "Clearance violation (clearance 0.5000 mm; actual 0.3000 mm; rule 'R1')"
        );
    }

    #[test]
    fn test_key_matches_serialized_name() {
        for code in ErrorCode::ALL {
            assert_eq!(serde_json::to_string(&code).unwrap(), format!("\"{}\"", code.key()));
            assert_eq!(ErrorCode::from_key(code.key()), Some(code));
        }
    }

    #[test]
    fn test_same_violation_ignores_item_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let x = DrcItem::new(ErrorCode::Clearance).with_items(a, Some(b));
        let y = DrcItem::new(ErrorCode::Clearance)
            .with_items(b, Some(a))
            .with_severity(Severity::Warning);
        assert!(x.same_violation(&y));
        assert!(!x.same_violation(&DrcItem::new(ErrorCode::TrackWidth).with_items(a, Some(b))));
    }

    #[test]
    fn test_severity_keywords() {
        assert_eq!(Severity::from_keyword("Warning"), Some(Severity::Warning));
        assert_eq!(Severity::from_keyword("fatal"), None);
    }
}
