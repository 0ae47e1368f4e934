//! Rules, the constraints they declare, and the constraints a query resolves to.

use std::fmt;
use std::sync::{Arc, Weak};

use serde::Serialize;

use opensilicon_core::{to_mm, ItemType, LayerId, LayerStack};

use crate::condition::{EvalContext, RuleCondition};
use crate::violation::{ErrorCode, Severity};

/// Category of rule outcome. Each has its own value domain and error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintType {
    Clearance,
    HoleClearance,
    EdgeClearance,
    CourtyardClearance,
    TrackWidth,
    TrackAngle,
    ViaDiameter,
    HoleSize,
    Disallow,
}

/// How a constraint's numbers are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Length,
    Angle,
    Flags,
}

impl ConstraintType {
    pub const ALL: [ConstraintType; 9] = [
        ConstraintType::Clearance,
        ConstraintType::HoleClearance,
        ConstraintType::EdgeClearance,
        ConstraintType::CourtyardClearance,
        ConstraintType::TrackWidth,
        ConstraintType::TrackAngle,
        ConstraintType::ViaDiameter,
        ConstraintType::HoleSize,
        ConstraintType::Disallow,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            ConstraintType::Clearance => "clearance",
            ConstraintType::HoleClearance => "hole_clearance",
            ConstraintType::EdgeClearance => "edge_clearance",
            ConstraintType::CourtyardClearance => "courtyard_clearance",
            ConstraintType::TrackWidth => "track_width",
            ConstraintType::TrackAngle => "track_angle",
            ConstraintType::ViaDiameter => "via_diameter",
            ConstraintType::HoleSize => "hole_size",
            ConstraintType::Disallow => "disallow",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.keyword() == word)
    }

    /// Error code reported when this constraint is violated.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ConstraintType::Clearance => ErrorCode::Clearance,
            ConstraintType::HoleClearance => ErrorCode::HoleClearance,
            ConstraintType::EdgeClearance => ErrorCode::CopperEdgeClearance,
            ConstraintType::CourtyardClearance => ErrorCode::OverlappingFootprints,
            ConstraintType::TrackWidth => ErrorCode::TrackWidth,
            ConstraintType::TrackAngle => ErrorCode::TrackAngle,
            ConstraintType::ViaDiameter => ErrorCode::ViaDiameter,
            ConstraintType::HoleSize => ErrorCode::DrillOutOfRange,
            ConstraintType::Disallow => ErrorCode::ItemsNotAllowed,
        }
    }

    pub fn value_kind(&self) -> ValueKind {
        match self {
            ConstraintType::TrackAngle => ValueKind::Angle,
            ConstraintType::Disallow => ValueKind::Flags,
            _ => ValueKind::Length,
        }
    }

    /// Constraints evaluated against one item only; conditions may not mention `B`.
    pub fn is_single_item(&self) -> bool {
        matches!(
            self,
            ConstraintType::TrackWidth
                | ConstraintType::ViaDiameter
                | ConstraintType::HoleSize
                | ConstraintType::Disallow
        )
    }

    /// Render a value in this constraint's unit.
    pub fn format_value(&self, value: f64) -> String {
        match self.value_kind() {
            ValueKind::Angle => format!("{value:.1}°"),
            _ => format!("{:.4} mm", to_mm(value)),
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MinOptMax {
    pub min: Option<f64>,
    pub opt: Option<f64>,
    pub max: Option<f64>,
}

impl MinOptMax {
    pub fn min(value: f64) -> Self {
        Self {
            min: Some(value),
            ..Default::default()
        }
    }

    pub fn is_consistent(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }
}

/// Payload of a constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConstraintValue {
    Range(MinOptMax),
    Disallow(Vec<ItemType>),
}

/// A constraint as written inside a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleConstraint {
    pub constraint_type: ConstraintType,
    pub value: ConstraintValue,
}

/// Where a rule applies.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerCondition {
    Outer,
    Inner,
    Layer(LayerId),
}

impl LayerCondition {
    pub fn matches(&self, layer: LayerId, stack: &LayerStack) -> bool {
        match self {
            LayerCondition::Outer => stack.is_outer_copper(layer),
            LayerCondition::Inner => stack.is_inner_copper(layer),
            LayerCondition::Layer(id) => *id == layer,
        }
    }
}

/// Precedence of a rule. Larger values win; the derived ordering is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
    /// Explicit rules always outrank implicit ones.
    pub explicit: bool,
    /// Weight of the rule's conditions and layer clause.
    pub weight: u32,
    /// Position in the rule document; later definitions win ties.
    pub order: usize,
}

/// A named rule: conditions that must all hold, and the constraints it then imposes.
#[derive(Debug)]
pub struct Rule {
    pub name: String,
    pub conditions: Vec<RuleCondition>,
    pub constraints: Vec<RuleConstraint>,
    pub layer: Option<LayerCondition>,
    pub severity: Option<Severity>,
    pub implicit: bool,
    pub order: usize,
}

impl Rule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conditions: Vec::new(),
            constraints: Vec::new(),
            layer: None,
            severity: None,
            implicit: false,
            order: 0,
        }
    }

    pub fn specificity(&self) -> Specificity {
        let weight = self.conditions.iter().map(|c| c.weight()).sum::<u32>() + u32::from(self.layer.is_some());
        Specificity {
            explicit: !self.implicit,
            weight,
            order: self.order,
        }
    }

    pub fn constraint(&self, constraint_type: ConstraintType) -> Option<&RuleConstraint> {
        self.constraints
            .iter()
            .find(|c| c.constraint_type == constraint_type)
    }

    pub fn references_b(&self) -> bool {
        self.conditions.iter().any(|c| c.references_b())
    }

    /// Whether every condition holds. Conditions that fail to evaluate do not hold.
    pub fn matches(&self, ctx: &EvalContext<'_>) -> bool {
        if let Some(layer_cond) = &self.layer {
            let stack = &ctx.board.layer_stack;
            let on_layer = match ctx.layer {
                Some(layer) => layer_cond.matches(layer, stack),
                None => ctx.a.layers().into_iter().any(|l| layer_cond.matches(l, stack)),
            };
            if !on_layer {
                return false;
            }
        }
        self.conditions.iter().all(|condition| match condition.evaluate(ctx) {
            Ok(result) => result,
            Err(err) => {
                log::trace!("rule '{}': condition '{}' not satisfied: {}", self.name, condition.source(), err);
                false
            }
        })
    }
}

/// The outcome of a constraint query. Immutable; each query yields a fresh value.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub constraint_type: ConstraintType,
    pub severity: Severity,
    pub value: ConstraintValue,
    parent_rule: Option<Weak<Rule>>,
    name: String,
}

impl Constraint {
    /// Result of a query no rule answered.
    pub fn none(constraint_type: ConstraintType) -> Self {
        Self {
            constraint_type,
            severity: Severity::Ignore,
            value: ConstraintValue::Range(MinOptMax::default()),
            parent_rule: None,
            name: String::new(),
        }
    }

    pub fn from_rule(rule: &Arc<Rule>, declared: &RuleConstraint, severity: Severity) -> Self {
        Self {
            constraint_type: declared.constraint_type,
            severity,
            value: declared.value.clone(),
            parent_rule: Some(Arc::downgrade(rule)),
            name: rule.name.clone(),
        }
    }

    /// Name of the rule the constraint came from; empty when unmatched.
    pub fn rule_name(&self) -> &str {
        &self.name
    }

    pub fn parent_rule(&self) -> Option<Arc<Rule>> {
        self.parent_rule.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_ignored(&self) -> bool {
        self.severity == Severity::Ignore
    }

    fn range(&self) -> Option<&MinOptMax> {
        match &self.value {
            ConstraintValue::Range(r) => Some(r),
            ConstraintValue::Disallow(_) => None,
        }
    }

    pub fn min(&self) -> Option<f64> {
        self.range().and_then(|r| r.min)
    }

    pub fn opt(&self) -> Option<f64> {
        self.range().and_then(|r| r.opt)
    }

    pub fn max(&self) -> Option<f64> {
        self.range().and_then(|r| r.max)
    }

    pub fn disallows(&self, item_type: ItemType) -> bool {
        matches!(&self.value, ConstraintValue::Disallow(types) if types.contains(&item_type))
    }

    /// Human-readable name, e.g. `clearance (rule 'HV')`.
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.constraint_type.to_string()
        } else {
            format!("{} (rule '{}')", self.constraint_type, self.name)
        }
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        let same_parent = match (&self.parent_rule, &other.parent_rule) {
            (Some(a), Some(b)) => Weak::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.constraint_type == other.constraint_type
            && self.severity == other.severity
            && self.value == other.value
            && self.name == other.name
            && same_parent
    }
}
