use super::{layer_enabled, nothing_to_check, violation, TestProvider, PROGRESS_DELTA};
use crate::engine::DrcEngine;
use crate::rule::ConstraintType;

/// Flags items a `disallow` constraint forbids where they are.
pub struct DisallowProvider;

impl DisallowProvider {
    pub const NAME: &'static str = "disallow";
}

impl TestProvider for DisallowProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Tests for disallowed items"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::Disallow]
    }

    fn run(&self, engine: &DrcEngine) -> bool {
        let kind = ConstraintType::Disallow;
        if nothing_to_check(engine, Self::NAME, kind) {
            return true;
        }
        if !engine.report_stage("Checking keepouts") {
            return false;
        }

        let items = engine.board().items();
        for (i, item) in items.iter().enumerate() {
            if i % PROGRESS_DELTA == 0 && !engine.report_progress(i, items.len()) {
                return false;
            }
            if engine.is_error_limit_exceeded(kind.error_code()) {
                break;
            }
            for layer in item.layers() {
                if !layer_enabled(engine, layer) {
                    continue;
                }
                let constraint = engine.eval_rules_for_items(kind, item, None, Some(layer));
                if constraint.is_ignored() || !constraint.disallows(item.item_type()) {
                    continue;
                }
                let detail = format!("{} not allowed", item.type_name());
                engine.report_violation(violation(&constraint, item, None, item.anchor(), Some(layer), detail));
                break;
            }
        }
        !engine.is_cancelled()
    }
}
