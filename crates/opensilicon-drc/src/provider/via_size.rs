use opensilicon_core::{BoardItem, ItemType};

use super::{layer_enabled, out_of_range, violation, TestProvider, PROGRESS_DELTA};
use crate::engine::DrcEngine;
use crate::rule::ConstraintType;

/// Checks via diameters and drilled hole sizes.
pub struct ViaSizeProvider;

impl ViaSizeProvider {
    pub const NAME: &'static str = "via_size";

    /// Check `actual` against the rules on each enabled layer of `item`,
    /// reporting at most once.
    fn check(engine: &DrcEngine, kind: ConstraintType, item: &BoardItem, actual: f64) {
        for layer in item.layers() {
            if engine.is_error_limit_exceeded(kind.error_code()) {
                return;
            }
            if !layer_enabled(engine, layer) {
                continue;
            }
            let constraint = engine.eval_rules_for_items(kind, item, None, Some(layer));
            if constraint.is_ignored() {
                continue;
            }
            if let Some(detail) = out_of_range(&constraint, actual) {
                engine.report_violation(violation(&constraint, item, None, item.anchor(), Some(layer), detail));
                return;
            }
        }
    }
}

impl TestProvider for ViaSizeProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Tests via diameters and drill sizes"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::ViaDiameter, ConstraintType::HoleSize]
    }

    fn run(&self, engine: &DrcEngine) -> bool {
        let wanted = |kind: ConstraintType| {
            engine.has_rules_for_constraint_type(kind) && !engine.is_error_limit_exceeded(kind.error_code())
        };
        let check_diameter = wanted(ConstraintType::ViaDiameter);
        let check_holes = wanted(ConstraintType::HoleSize);
        if !check_diameter && !check_holes {
            engine.report_test_not_run(Self::NAME);
            return true;
        }
        if !engine.report_stage("Checking via sizes") {
            return false;
        }

        let items: Vec<&BoardItem> = engine
            .board()
            .items()
            .iter()
            .filter(|i| matches!(i.item_type(), ItemType::Via | ItemType::Pad))
            .collect();

        for (i, item) in items.iter().enumerate() {
            if i % PROGRESS_DELTA == 0 && !engine.report_progress(i, items.len()) {
                return false;
            }
            if check_diameter {
                if let Some(via) = item.as_via() {
                    Self::check(engine, ConstraintType::ViaDiameter, item, via.diameter);
                }
            }
            if check_holes {
                if let Some(drill) = item.drill() {
                    Self::check(engine, ConstraintType::HoleSize, item, drill);
                }
            }
        }
        !engine.is_cancelled()
    }
}
