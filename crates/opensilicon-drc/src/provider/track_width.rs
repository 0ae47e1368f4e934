use opensilicon_core::BoardItem;

use super::{layer_enabled, nothing_to_check, out_of_range, violation, TestProvider};
use crate::engine::DrcEngine;
use crate::rule::ConstraintType;

/// Checks every track's width against `track_width` constraints.
pub struct TrackWidthProvider;

impl TrackWidthProvider {
    pub const NAME: &'static str = "track_width";
}

impl TestProvider for TrackWidthProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Tests track widths"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::TrackWidth]
    }

    fn run(&self, engine: &DrcEngine) -> bool {
        let kind = ConstraintType::TrackWidth;
        if nothing_to_check(engine, Self::NAME, kind) {
            return true;
        }
        if !engine.report_stage("Checking track widths") {
            return false;
        }

        let tracks: Vec<&BoardItem> = engine.board().tracks().collect();
        let code = kind.error_code();
        engine.for_each_parallel(tracks.len(), |i| {
            if engine.is_error_limit_exceeded(code) {
                return;
            }
            let item = tracks[i];
            let Some(track) = item.as_track() else { return };
            if track.is_degenerate() || !layer_enabled(engine, track.layer) {
                return;
            }
            let constraint = engine.eval_rules_for_items(kind, item, None, Some(track.layer));
            if constraint.is_ignored() {
                return;
            }
            if let Some(detail) = out_of_range(&constraint, track.width) {
                engine.report_violation(violation(
                    &constraint,
                    item,
                    None,
                    item.anchor(),
                    Some(track.layer),
                    detail,
                ));
            }
        })
    }
}
