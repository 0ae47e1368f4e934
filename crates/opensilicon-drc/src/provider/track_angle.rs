use opensilicon_core::geometry::angle_between;
use opensilicon_core::{BoardItem, ItemType, LayerId, Point, SpatialIndex, Track};

use super::{layer_enabled, nothing_to_check, out_of_range, violation, TestProvider};
use crate::engine::DrcEngine;
use crate::rule::ConstraintType;

/// Track endpoints closer than this share a joint (nm).
const JOINT_EPSILON: f64 = 1.0;

/// Checks the angle formed where two tracks of one net meet.
///
/// The angle is measured between the two tracks as they leave the joint, so a
/// straight continuation is 180°. Joints that sit on a pad or via are exempt.
pub struct TrackAngleProvider;

impl TrackAngleProvider {
    pub const NAME: &'static str = "track_angle";
}

/// The far end of `track` when `joint` is one of its endpoints.
fn far_end(track: &Track, joint: &Point) -> Option<Point> {
    if track.start.distance_to(joint) <= JOINT_EPSILON {
        Some(track.end)
    } else if track.end.distance_to(joint) <= JOINT_EPSILON {
        Some(track.start)
    } else {
        None
    }
}

fn on_pad_or_via(board_items: &[BoardItem], anchors: &SpatialIndex, joint: &Point, layer: LayerId) -> bool {
    anchors.at_point(joint, layer).any(|j| {
        board_items[j]
            .shape_on_layer(layer)
            .is_some_and(|shape| shape.contains_point(joint))
    })
}

impl TestProvider for TrackAngleProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Tests angles between connected tracks"
    }

    fn constraint_types(&self) -> &'static [ConstraintType] {
        &[ConstraintType::TrackAngle]
    }

    fn run(&self, engine: &DrcEngine) -> bool {
        let kind = ConstraintType::TrackAngle;
        if nothing_to_check(engine, Self::NAME, kind) {
            return true;
        }
        if !engine.report_stage("Checking track angles") {
            return false;
        }

        let board = engine.board();
        let items = board.items();
        let tracks = SpatialIndex::from_board(board, |i| i.item_type() == ItemType::Track);
        let anchors = SpatialIndex::from_board(board, |i| matches!(i.item_type(), ItemType::Pad | ItemType::Via));
        let candidates: Vec<usize> = (0..items.len())
            .filter(|&i| items[i].as_track().is_some_and(|t| !t.is_degenerate()))
            .collect();
        let code = kind.error_code();

        engine.for_each_parallel(candidates.len(), |n| {
            let i = candidates[n];
            let a = &items[i];
            let Some(ta) = a.as_track() else { return };
            if !layer_enabled(engine, ta.layer) {
                return;
            }
            for joint in [ta.start, ta.end] {
                if engine.is_error_limit_exceeded(code) {
                    return;
                }
                for j in tracks.at_point(&joint, ta.layer) {
                    if j <= i {
                        continue;
                    }
                    let b = &items[j];
                    let Some(tb) = b.as_track() else { continue };
                    if b.net != a.net || tb.is_degenerate() {
                        continue;
                    }
                    let (Some(end_a), Some(end_b)) = (far_end(ta, &joint), far_end(tb, &joint)) else {
                        continue;
                    };
                    if on_pad_or_via(items, &anchors, &joint, ta.layer) {
                        continue;
                    }
                    let Some(angle) = angle_between(&joint, &end_a, &end_b) else {
                        continue;
                    };
                    let constraint = engine.eval_rules_for_items(kind, a, Some(b), Some(ta.layer));
                    if constraint.is_ignored() {
                        continue;
                    }
                    if let Some(detail) = out_of_range(&constraint, angle) {
                        engine.report_violation(violation(&constraint, a, Some(b), joint, Some(ta.layer), detail));
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_far_end() {
        let track = Track {
            start: Point::new(0.0, 0.0),
            end: Point::new(100.0, 0.0),
            width: 10.0,
            layer: 0,
        };
        assert_eq!(far_end(&track, &Point::new(0.0, 0.0)), Some(Point::new(100.0, 0.0)));
        assert_eq!(far_end(&track, &Point::new(100.0, 0.5)), Some(Point::new(0.0, 0.0)));
        assert_eq!(far_end(&track, &Point::new(50.0, 0.0)), None);
    }
}
