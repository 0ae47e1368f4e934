use opensilicon_core::{BoardItem, ItemType, LayerId, SpatialIndex};

use super::{layer_enabled, midpoint, out_of_range, violation, TestProvider};
use crate::engine::DrcEngine;
use crate::rule::ConstraintType;

/// Copper-to-copper and hole-to-copper spacing between items on different nets.
///
/// Zones are not checked: their copper depends on a fill this tool does not compute.
pub struct ClearanceProvider;

impl ClearanceProvider {
    pub const NAME: &'static str = "clearance";

    fn on_copper(engine: &DrcEngine, layer: LayerId) -> bool {
        layer_enabled(engine, layer)
            && engine
                .board()
                .layer_stack
                .get_layer(layer)
                .is_some_and(|l| l.is_copper())
    }

    fn check_copper(engine: &DrcEngine, a: &BoardItem, b: &BoardItem) {
        let kind = ConstraintType::Clearance;
        for layer in a.layers() {
            if !b.is_on_layer(layer) || !Self::on_copper(engine, layer) {
                continue;
            }
            let (Some(sa), Some(sb)) = (a.shape_on_layer(layer), b.shape_on_layer(layer)) else {
                continue;
            };
            let constraint = engine.eval_rules_for_items(kind, a, Some(b), Some(layer));
            if constraint.is_ignored() {
                continue;
            }
            let distance = sa.distance_to(&sb);
            if let Some(detail) = out_of_range(&constraint, distance) {
                let at = midpoint(a.anchor(), b.anchor());
                engine.report_violation(violation(&constraint, a, Some(b), at, Some(layer), detail));
                return;
            }
        }
    }

    /// Spacing from `drilled`'s hole to `other`'s copper on any layer.
    fn check_hole(engine: &DrcEngine, drilled: &BoardItem, other: &BoardItem) {
        let kind = ConstraintType::HoleClearance;
        let Some(hole) = drilled.hole() else { return };
        for layer in other.layers() {
            if !Self::on_copper(engine, layer) {
                continue;
            }
            let Some(copper) = other.shape_on_layer(layer) else {
                continue;
            };
            let constraint = engine.eval_rules_for_items(kind, drilled, Some(other), Some(layer));
            if constraint.is_ignored() {
                continue;
            }
            if let Some(detail) = out_of_range(&constraint, hole.distance_to(&copper)) {
                engine.report_violation(violation(
                    &constraint,
                    drilled,
                    Some(other),
                    drilled.anchor(),
                    Some(layer),
                    detail,
                ));
                return;
            }
        }
    }
}

impl TestProvider for ClearanceProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Tests copper and hole clearances"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::Clearance, ConstraintType::HoleClearance]
    }

    fn run(&self, engine: &DrcEngine) -> bool {
        let wanted = |kind: ConstraintType| {
            engine.has_rules_for_constraint_type(kind) && !engine.is_error_limit_exceeded(kind.error_code())
        };
        let (copper, holes) = (wanted(ConstraintType::Clearance), wanted(ConstraintType::HoleClearance));
        if !copper && !holes {
            engine.report_test_not_run(Self::NAME);
            return true;
        }
        if !engine.report_stage("Checking copper clearances") {
            return false;
        }

        // Largest spacing any rule asks for bounds the neighbour search.
        let margin = [ConstraintType::Clearance, ConstraintType::HoleClearance]
            .into_iter()
            .flat_map(|kind| engine.query_constraints_by_id(kind))
            .filter_map(|c| c.min())
            .fold(0.0, f64::max);

        let board = engine.board();
        let items = board.items();
        let checked = |item: &BoardItem| item.is_copper() && item.item_type() != ItemType::Zone;
        let index = SpatialIndex::from_board(board, checked);
        let candidates: Vec<usize> = (0..items.len()).filter(|&i| checked(&items[i])).collect();
        log::debug!("Clearance sweep over {} items, search margin {margin}", candidates.len());

        engine.for_each_parallel(candidates.len(), |n| {
            let i = candidates[n];
            let a = &items[i];
            let Some(bbox) = a.bbox() else { return };
            for j in index.near(&bbox.inflate(margin)) {
                if j <= i {
                    continue;
                }
                let b = &items[j];
                if a.net.is_some() && a.net == b.net {
                    continue;
                }
                if copper && !engine.is_error_limit_exceeded(ConstraintType::Clearance.error_code()) {
                    Self::check_copper(engine, a, b);
                }
                if holes && !engine.is_error_limit_exceeded(ConstraintType::HoleClearance.error_code()) {
                    Self::check_hole(engine, a, b);
                    Self::check_hole(engine, b, a);
                }
            }
        })
    }
}
