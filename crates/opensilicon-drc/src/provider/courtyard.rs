use opensilicon_core::{BoardItem, ItemType, SpatialIndex};

use super::{layer_enabled, midpoint, violation, TestProvider, PROGRESS_DELTA};
use crate::engine::DrcEngine;
use crate::rule::ConstraintType;
use crate::violation::{DrcItem, ErrorCode, Severity};

/// Footprint courtyards: missing outlines, and overlaps or spacing between them.
///
/// Courtyards that merely touch count as overlapping.
pub struct CourtyardProvider;

impl CourtyardProvider {
    pub const NAME: &'static str = "courtyard";

    fn report_missing(engine: &DrcEngine, footprints: &[&BoardItem]) {
        let code = ErrorCode::MissingCourtyard;
        let severity = engine.settings().severity(code);
        for item in footprints {
            if engine.is_error_limit_exceeded(code) {
                return;
            }
            let Some(footprint) = item.as_footprint() else { continue };
            if footprint.courtyard_outline().is_some() || !layer_enabled(engine, footprint.courtyard_layer) {
                continue;
            }
            engine.report_violation(
                DrcItem::new(code)
                    .with_items(item.id, None)
                    .at(footprint.position(), Some(footprint.courtyard_layer))
                    .with_severity(severity)
                    .with_detail(format!("{} has no courtyard", footprint.reference)),
            );
        }
    }

    fn check_pair(engine: &DrcEngine, a: &BoardItem, b: &BoardItem) {
        let kind = ConstraintType::CourtyardClearance;
        let (Some(fa), Some(fb)) = (a.as_footprint(), b.as_footprint()) else {
            return;
        };
        let layer = fa.courtyard_layer;
        let (Some(sa), Some(sb)) = (a.shape_on_layer(layer), b.shape_on_layer(layer)) else {
            return;
        };
        let constraint = engine.eval_rules_for_items(kind, a, Some(b), Some(layer));
        if constraint.is_ignored() {
            return;
        }
        let min = constraint.min().unwrap_or(0.0);
        let distance = sa.distance_to(&sb);
        if distance > 0.0 && distance >= min {
            return;
        }
        let detail = if distance <= 0.0 {
            format!("{} overlaps {}", fa.reference, fb.reference)
        } else {
            format!(
                "{} to {}: {} min {}; actual {}",
                fa.reference,
                fb.reference,
                kind,
                kind.format_value(min),
                kind.format_value(distance)
            )
        };
        let at = midpoint(fa.position(), fb.position());
        engine.report_violation(violation(&constraint, a, Some(b), at, Some(layer), detail));
    }
}

impl TestProvider for CourtyardProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Tests footprint courtyards"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::CourtyardClearance]
    }

    fn run(&self, engine: &DrcEngine) -> bool {
        let kind = ConstraintType::CourtyardClearance;
        let overlaps =
            engine.has_rules_for_constraint_type(kind) && !engine.is_error_limit_exceeded(kind.error_code());
        let missing = engine.settings().severity(ErrorCode::MissingCourtyard) != Severity::Ignore
            && !engine.is_error_limit_exceeded(ErrorCode::MissingCourtyard);
        if !overlaps && !missing {
            engine.report_test_not_run(Self::NAME);
            return true;
        }
        if !engine.report_stage("Checking footprint courtyards") {
            return false;
        }

        let board = engine.board();
        let items = board.items();
        let footprints: Vec<&BoardItem> = board.footprints().collect();
        if missing {
            Self::report_missing(engine, &footprints);
        }
        if !overlaps {
            return !engine.is_cancelled();
        }

        let margin = engine
            .query_constraints_by_id(kind)
            .iter()
            .filter_map(|c| c.min())
            .fold(0.0, f64::max);
        let index = SpatialIndex::from_board(board, |i| i.item_type() == ItemType::Footprint);
        log::debug!("Courtyard check over {} footprints, search margin {margin}", index.len());

        for (i, a) in items.iter().enumerate() {
            if i % PROGRESS_DELTA == 0 && !engine.report_progress(i, items.len()) {
                return false;
            }
            if engine.is_error_limit_exceeded(kind.error_code()) {
                break;
            }
            let Some(footprint) = a.as_footprint() else { continue };
            let layer = footprint.courtyard_layer;
            if !layer_enabled(engine, layer) {
                continue;
            }
            let Some(bbox) = a.bbox() else { continue };
            for j in index.near_on_layer(&bbox.inflate(margin), layer) {
                if j > i {
                    Self::check_pair(engine, a, &items[j]);
                }
            }
        }
        !engine.is_cancelled()
    }
}
