//! Test providers: one pluggable check each, run in order by the engine.
//!
//! Every rule-driven provider follows the same outline:
//!
//! 1. Skip (and say so) when its error limit is already reached or no rule
//!    produces its constraint type.
//! 2. Announce a stage; stop if that reports cancellation.
//! 3. Sweep the board, asking the engine for the constraint that applies to
//!    each item or pair, and report what falls outside it.

mod clearance;
mod connectivity;
mod courtyard;
mod disallow;
mod edge_clearance;
mod track_angle;
mod track_width;
mod via_size;

use std::sync::{Arc, OnceLock};

use opensilicon_core::{BoardItem, LayerId, Point};

use crate::engine::DrcEngine;
use crate::rule::{Constraint, ConstraintType};
use crate::violation::DrcItem;

pub use clearance::ClearanceProvider;
pub use connectivity::{unconnected_item, ConnectivityProvider};
pub use courtyard::CourtyardProvider;
pub use disallow::DisallowProvider;
pub use edge_clearance::EdgeClearanceProvider;
pub use track_angle::TrackAngleProvider;
pub use track_width::TrackWidthProvider;
pub use via_size::ViaSizeProvider;

/// Sequential sweeps report progress once per this many items.
pub const PROGRESS_DELTA: usize = 250;

pub trait TestProvider: Send + Sync {
    /// Stable identifier used in reports and logs.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Constraint types this provider checks.
    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[]
    }

    /// Run the check. Returns false when the whole DRC pass should stop.
    fn run(&self, engine: &DrcEngine) -> bool;
}

pub type ProviderFactory = Arc<dyn Fn() -> Box<dyn TestProvider> + Send + Sync>;

/// Named provider factories, instantiated in registration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    entries: Vec<(&'static str, ProviderFactory)>,
}

static GLOBAL_REGISTRY: OnceLock<ProviderRegistry> = OnceLock::new();

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in provider.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DisallowProvider::NAME, || Box::new(DisallowProvider));
        registry.register(TrackWidthProvider::NAME, || Box::new(TrackWidthProvider));
        registry.register(ViaSizeProvider::NAME, || Box::new(ViaSizeProvider));
        registry.register(ClearanceProvider::NAME, || Box::new(ClearanceProvider));
        registry.register(EdgeClearanceProvider::NAME, || Box::new(EdgeClearanceProvider));
        registry.register(TrackAngleProvider::NAME, || Box::new(TrackAngleProvider));
        registry.register(CourtyardProvider::NAME, || Box::new(CourtyardProvider));
        registry.register(ConnectivityProvider::NAME, || Box::new(ConnectivityProvider));
        registry
    }

    /// The process-wide registry, holding the built-in providers.
    pub fn global() -> &'static ProviderRegistry {
        GLOBAL_REGISTRY.get_or_init(Self::builtin)
    }

    /// Add a provider, replacing any registered under the same name in place.
    pub fn register<F>(&mut self, name: &'static str, factory: F)
    where
        F: Fn() -> Box<dyn TestProvider> + Send + Sync + 'static,
    {
        let factory: ProviderFactory = Arc::new(factory);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = factory,
            None => self.entries.push((name, factory)),
        }
    }

    /// Keep only the providers named in `names`.
    pub fn retain(&mut self, names: &[&str]) {
        self.entries.retain(|(n, _)| names.contains(n));
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn instantiate(&self) -> Vec<Box<dyn TestProvider>> {
        self.entries.iter().map(|(_, factory)| factory()).collect()
    }
}

// ── Shared helpers ───────────────────────────────────────────────────

/// Step 1 of the outline: true when `constraint_type` needs no checking.
fn nothing_to_check(engine: &DrcEngine, provider: &str, constraint_type: ConstraintType) -> bool {
    if engine.is_error_limit_exceeded(constraint_type.error_code())
        || !engine.has_rules_for_constraint_type(constraint_type)
    {
        engine.report_test_not_run(provider);
        return true;
    }
    false
}

fn layer_enabled(engine: &DrcEngine, layer: LayerId) -> bool {
    engine.board().layer_stack.is_enabled(layer)
}

/// Describe how `actual` falls outside `constraint`, if it does.
fn out_of_range(constraint: &Constraint, actual: f64) -> Option<String> {
    let kind = constraint.constraint_type;
    let (bound, limit) = match (constraint.min(), constraint.max()) {
        (Some(min), _) if actual < min => ("min", min),
        (_, Some(max)) if actual > max => ("max", max),
        _ => return None,
    };
    Some(format!(
        "{} {} {}; actual {}",
        kind,
        bound,
        kind.format_value(limit),
        kind.format_value(actual)
    ))
}

/// A violation of `constraint` by `a` (and `b`).
fn violation(
    constraint: &Constraint,
    a: &BoardItem,
    b: Option<&BoardItem>,
    location: Point,
    layer: Option<LayerId>,
    detail: String,
) -> DrcItem {
    let item = DrcItem::new(constraint.constraint_type.error_code())
        .with_items(a.id, b.map(|b| b.id))
        .at(location, layer)
        .with_severity(constraint.severity)
        .with_detail(detail);
    match constraint.rule_name() {
        "" => item,
        rule => item.with_rule(rule),
    }
}

fn midpoint(a: Point, b: Point) -> Point {
    Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl TestProvider for Noop {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn description(&self) -> &'static str {
            "does nothing"
        }

        fn run(&self, _engine: &DrcEngine) -> bool {
            true
        }
    }

    #[test]
    fn test_builtin_order() {
        assert_eq!(
            ProviderRegistry::builtin().names(),
            [
                "disallow",
                "track_width",
                "via_size",
                "clearance",
                "edge_clearance",
                "track_angle",
                "courtyard",
                "connectivity"
            ]
        );
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = ProviderRegistry::builtin();
        registry.register("clearance", || Box::new(Noop));
        registry.register("extra", || Box::new(Noop));
        assert_eq!(registry.len(), 9);
        assert_eq!(registry.names()[3], "clearance");
        assert_eq!(registry.instantiate()[3].name(), "noop");
    }

    #[test]
    fn test_retain() {
        let mut registry = ProviderRegistry::builtin();
        registry.retain(&["track_angle", "clearance"]);
        assert_eq!(registry.names(), ["clearance", "track_angle"]);
    }
}
