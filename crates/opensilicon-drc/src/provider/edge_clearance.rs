use opensilicon_core::{Point, Shape};

use super::{layer_enabled, nothing_to_check, out_of_range, violation, TestProvider, PROGRESS_DELTA};
use crate::engine::DrcEngine;
use crate::rule::ConstraintType;

/// Spacing between copper and the board outline.
pub struct EdgeClearanceProvider;

impl EdgeClearanceProvider {
    pub const NAME: &'static str = "edge_clearance";
}

fn outline_edges(outline: &[Point]) -> Vec<Shape> {
    (0..outline.len())
        .map(|i| Shape::Segment {
            start: outline[i],
            end: outline[(i + 1) % outline.len()],
            width: 0.0,
        })
        .collect()
}

impl TestProvider for EdgeClearanceProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Tests copper to board edge clearance"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::EdgeClearance]
    }

    fn run(&self, engine: &DrcEngine) -> bool {
        let kind = ConstraintType::EdgeClearance;
        if nothing_to_check(engine, Self::NAME, kind) {
            return true;
        }
        let Some(outline) = engine.board().outline.as_deref().filter(|o| o.len() >= 3) else {
            engine.report_aux("No board outline; skipping board edge clearance");
            engine.report_test_not_run(Self::NAME);
            return true;
        };
        if !engine.report_stage("Checking board edge clearance") {
            return false;
        }

        let edges = outline_edges(outline);
        let items = engine.board().items();
        for (i, item) in items.iter().enumerate() {
            if i % PROGRESS_DELTA == 0 && !engine.report_progress(i, items.len()) {
                return false;
            }
            if engine.is_error_limit_exceeded(kind.error_code()) {
                break;
            }
            if !item.is_copper() {
                continue;
            }
            for layer in item.layers() {
                if !layer_enabled(engine, layer) {
                    continue;
                }
                let Some(shape) = item.shape_on_layer(layer) else {
                    continue;
                };
                let constraint = engine.eval_rules_for_items(kind, item, None, Some(layer));
                if constraint.is_ignored() {
                    continue;
                }
                let distance = edges.iter().map(|e| shape.distance_to(e)).fold(f64::MAX, f64::min);
                if let Some(detail) = out_of_range(&constraint, distance) {
                    engine.report_violation(violation(&constraint, item, None, item.anchor(), Some(layer), detail));
                    break;
                }
            }
        }
        !engine.is_cancelled()
    }
}
