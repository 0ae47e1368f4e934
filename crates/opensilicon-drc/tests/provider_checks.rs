use std::sync::Arc;

use opensilicon_core::{mm, Board, BoardItem, Footprint, NetClass, Point, Transform};
use opensilicon_drc::{DrcEngine, DrcReport, DrcSettings, ErrorCode, ProviderRegistry, Severity, WorkerPool};

const F_CU: u32 = 0;
const B_CU: u32 = 31;
const F_COURTYARD: u32 = 40;
const B_COURTYARD: u32 = 41;

fn track(layer: u32, x0: f64, y0: f64, x1: f64, y1: f64) -> BoardItem {
    BoardItem::track(layer, Point::new(mm(x0), mm(y0)), Point::new(mm(x1), mm(y1)), mm(0.2))
}

fn via(x: f64, y: f64, diameter: f64, drill: f64) -> BoardItem {
    BoardItem::via(Point::new(mm(x), mm(y)), mm(diameter), mm(drill), vec![F_CU, B_CU])
}

fn footprint(reference: &str, layer: u32, x: f64, y: f64, size: Option<f64>) -> BoardItem {
    let fp = Footprint::new(reference, layer, Transform::translate(mm(x), mm(y)));
    BoardItem::footprint(match size {
        Some(size) => fp.with_rect_courtyard(mm(size), mm(size)),
        None => fp,
    })
}

/// Run one provider over `board` with `rules` on top of the implicit rules.
fn run_provider(board: Board, provider: &str, rules: &str, settings: DrcSettings) -> DrcReport {
    let mut registry = ProviderRegistry::builtin();
    registry.retain(&[provider]);
    let mut engine = DrcEngine::new(Arc::new(board), settings)
        .with_registry(&registry)
        .with_worker_pool(Arc::new(WorkerPool::new(Some(2)).unwrap()));
    engine.load_rules_from_str(rules, "test.rules").unwrap();
    engine.compile_rules().unwrap();
    let report = engine.run_tests().unwrap();
    assert!(report.is_complete());
    report
}

// ── Track angle ──────────────────────────────────────────────────────

const SHARP_CORNERS: &str = "(rule corners (constraint track_angle (min 135deg)))";

fn right_angle_board() -> Board {
    let mut board = Board::new("corner");
    board.add_item(track(F_CU, 0.0, 0.0, 5.0, 0.0)).unwrap();
    board.add_item(track(F_CU, 5.0, 0.0, 5.0, 5.0)).unwrap();
    board
}

#[test]
fn test_right_angle_joint_reported() {
    let report = run_provider(right_angle_board(), "track_angle", SHARP_CORNERS, DrcSettings::default());
    let found: Vec<_> = report.by_code(ErrorCode::TrackAngle).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].items.len(), 2);
    assert_eq!(found[0].location, Point::new(mm(5.0), 0.0));
    assert_eq!(found[0].severity, Severity::Warning);
    assert_eq!(found[0].rule_name.as_deref(), Some("corners"));
}

#[test]
fn test_joint_on_via_is_exempt() {
    let mut board = right_angle_board();
    board.add_item(via(5.0, 0.0, 0.6, 0.3)).unwrap();
    let report = run_provider(board, "track_angle", SHARP_CORNERS, DrcSettings::default());
    assert!(report.items.is_empty());
}

#[test]
fn test_track_angle_skips_disabled_layer() {
    let mut board = right_angle_board();
    board.layer_stack.set_enabled(F_CU, false);
    let report = run_provider(board, "track_angle", SHARP_CORNERS, DrcSettings::default());
    assert!(report.items.is_empty());
}

#[test]
fn test_zero_length_track_ignored() {
    let mut board = Board::new("stub");
    board.add_item(track(F_CU, 0.0, 0.0, 5.0, 0.0)).unwrap();
    board.add_item(track(F_CU, 5.0, 0.0, 5.0, 0.0)).unwrap();
    board.add_item(track(F_CU, 5.0, 0.0, 10.0, 0.0)).unwrap();
    let report = run_provider(board, "track_angle", SHARP_CORNERS, DrcSettings::default());
    assert!(report.items.is_empty());
}

#[test]
fn test_tracks_on_other_nets_do_not_form_joints() {
    let mut board = Board::new("nets");
    let (a, b) = (board.add_net("A", None), board.add_net("B", None));
    board.add_item(track(F_CU, 0.0, 0.0, 5.0, 0.0).with_net(a)).unwrap();
    board.add_item(track(F_CU, 5.0, 0.0, 5.0, 5.0).with_net(b)).unwrap();
    let report = run_provider(board, "track_angle", SHARP_CORNERS, DrcSettings::default());
    assert!(report.items.is_empty());
}

// ── Clearance ────────────────────────────────────────────────────────

/// A via and a track on another net with 0.2 mm between the hole and the copper.
fn hole_board() -> Board {
    let mut board = Board::new("holes");
    let (a, b) = (board.add_net("A", None), board.add_net("B", None));
    board.add_item(via(0.0, 0.0, 0.6, 0.3).with_net(a)).unwrap();
    board.add_item(track(F_CU, 0.4, -1.0, 0.4, 1.0).with_net(b)).unwrap();
    board
}

#[test]
fn test_hole_clearance_from_board_minimum() {
    let report = run_provider(hole_board(), "clearance", "", DrcSettings::default());
    let holes: Vec<_> = report.by_code(ErrorCode::HoleClearance).collect();
    assert_eq!(holes.len(), 1);
    assert_eq!(holes[0].rule_name.as_deref(), Some("board setup"));
    assert_eq!(holes[0].layer, Some(F_CU));
    assert!(holes[0].detail.contains("0.2500 mm"));
}

#[test]
fn test_explicit_hole_clearance_rule_relaxes_minimum() {
    let rules = "(rule holes (constraint hole_clearance (min 0.1mm)))";
    let report = run_provider(hole_board(), "clearance", rules, DrcSettings::default());
    assert_eq!(report.by_code(ErrorCode::HoleClearance).count(), 0);
}

#[test]
fn test_same_net_items_have_no_clearance() {
    let mut board = Board::new("same");
    let net = board.add_net("GND", None);
    board.add_item(track(F_CU, 0.0, 0.0, 5.0, 0.0).with_net(net)).unwrap();
    board.add_item(track(F_CU, 0.0, 0.3, 5.0, 0.3).with_net(net)).unwrap();
    let report = run_provider(board, "clearance", "", DrcSettings::default());
    assert!(report.items.is_empty());
}

// ── Via size ─────────────────────────────────────────────────────────

#[test]
fn test_small_via_reported_for_diameter_and_drill() {
    let mut board = Board::new("vias");
    let small = board.add_item(via(0.0, 0.0, 0.4, 0.2)).unwrap();
    board.add_item(via(5.0, 0.0, 0.6, 0.3)).unwrap();
    let report = run_provider(board, "via_size", "", DrcSettings::default());

    let diameter: Vec<_> = report.by_code(ErrorCode::ViaDiameter).collect();
    let drill: Vec<_> = report.by_code(ErrorCode::DrillOutOfRange).collect();
    assert_eq!(diameter.len(), 1);
    assert_eq!(drill.len(), 1);
    assert_eq!(diameter[0].items, vec![small]);
    assert_eq!(drill[0].items, vec![small]);
    assert!(drill[0].detail.contains("min"));
}

#[test]
fn test_drill_above_maximum() {
    let mut board = Board::new("vias");
    board.add_item(via(0.0, 0.0, 1.2, 0.8)).unwrap();
    let rules = "(rule drills (constraint hole_size (max 0.5mm)))";
    let report = run_provider(board, "via_size", rules, DrcSettings::default());
    let drill: Vec<_> = report.by_code(ErrorCode::DrillOutOfRange).collect();
    assert_eq!(drill.len(), 1);
    assert!(drill[0].detail.contains("max 0.5000 mm"));
    assert_eq!(report.by_code(ErrorCode::ViaDiameter).count(), 0);
}

const BACK_VIAS: &str = "(rule back (layer B.Cu) (constraint via_diameter (min 0.8mm)))";

#[test]
fn test_layer_rule_applies_to_via() {
    let mut board = Board::new("vias");
    board.add_item(via(0.0, 0.0, 0.6, 0.3)).unwrap();
    let report = run_provider(board, "via_size", BACK_VIAS, DrcSettings::default());
    let diameter: Vec<_> = report.by_code(ErrorCode::ViaDiameter).collect();
    assert_eq!(diameter.len(), 1);
    assert_eq!(diameter[0].layer, Some(B_CU));
    assert_eq!(diameter[0].rule_name.as_deref(), Some("back"));
}

#[test]
fn test_via_size_skips_disabled_layer() {
    let mut board = Board::new("vias");
    board.add_item(via(0.0, 0.0, 0.6, 0.3)).unwrap();
    board.layer_stack.set_enabled(B_CU, false);
    let report = run_provider(board, "via_size", BACK_VIAS, DrcSettings::default());
    assert!(report.items.is_empty());
}

// ── Disallow ─────────────────────────────────────────────────────────

fn keepout_board() -> Board {
    let mut board = Board::new("keepout");
    board.set_net_class(NetClass::new("HV", mm(0.5), mm(0.3)));
    let hv = board.add_net("HV1", Some("HV"));
    let gnd = board.add_net("GND", None);
    board.add_item(via(0.0, 0.0, 0.6, 0.3).with_net(hv)).unwrap();
    board.add_item(via(5.0, 0.0, 0.6, 0.3).with_net(gnd)).unwrap();
    board.add_item(track(F_CU, 0.0, 5.0, 5.0, 5.0).with_net(hv)).unwrap();
    board
}

#[test]
fn test_disallowed_items_reported() {
    let rules = r#"(rule no_hv_vias (condition "A.NetClass == 'HV'") (constraint disallow via))"#;
    let board = keepout_board();
    let hv_via = board.items()[0].id;
    let report = run_provider(board, "disallow", rules, DrcSettings::default());
    let found: Vec<_> = report.by_code(ErrorCode::ItemsNotAllowed).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].items, vec![hv_via]);
    assert_eq!(found[0].detail, "Via not allowed");
}

#[test]
fn test_disallow_skips_disabled_layer() {
    let rules = "(rule no_back_tracks (layer B.Cu) (constraint disallow track))";
    let mut board = keepout_board();
    board.add_item(track(B_CU, 0.0, 8.0, 5.0, 8.0)).unwrap();
    let enabled = run_provider(board, "disallow", rules, DrcSettings::default());
    assert_eq!(enabled.by_code(ErrorCode::ItemsNotAllowed).count(), 1);

    let mut board = keepout_board();
    board.add_item(track(B_CU, 0.0, 8.0, 5.0, 8.0)).unwrap();
    board.layer_stack.set_enabled(B_CU, false);
    let disabled = run_provider(board, "disallow", rules, DrcSettings::default());
    assert!(disabled.items.is_empty());
}

// ── Courtyards ───────────────────────────────────────────────────────

fn placed_board() -> Board {
    let mut board = Board::new("placement");
    board.add_item(footprint("U1", F_COURTYARD, 0.0, 0.0, Some(2.0))).unwrap();
    board.add_item(footprint("U2", F_COURTYARD, 1.5, 0.0, Some(2.0))).unwrap();
    board.add_item(footprint("U3", F_COURTYARD, 10.0, 0.0, Some(2.0))).unwrap();
    board.add_item(footprint("U4", B_COURTYARD, 0.5, 0.0, Some(2.0))).unwrap();
    board
}

#[test]
fn test_overlapping_courtyards_on_same_side() {
    let report = run_provider(placed_board(), "courtyard", "", DrcSettings::default());
    let found: Vec<_> = report.by_code(ErrorCode::OverlappingFootprints).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].detail, "U1 overlaps U2");
    assert_eq!(found[0].layer, Some(F_COURTYARD));
    assert_eq!(report.by_code(ErrorCode::MissingCourtyard).count(), 0);
}

#[test]
fn test_courtyard_spacing_rule() {
    let rules = "(rule spacing (constraint courtyard_clearance (min 9mm)))";
    let report = run_provider(placed_board(), "courtyard", rules, DrcSettings::default());
    // U2 to U3 is 6.5 mm apart; U1 to U3 is 8 mm.
    assert_eq!(report.by_code(ErrorCode::OverlappingFootprints).count(), 3);
}

#[test]
fn test_missing_courtyard_when_enabled() {
    let mut board = placed_board();
    board.add_item(footprint("J1", F_COURTYARD, 20.0, 0.0, None)).unwrap();

    let quiet = run_provider(board, "courtyard", "", DrcSettings::default());
    assert_eq!(quiet.by_code(ErrorCode::MissingCourtyard).count(), 0);

    let mut board = placed_board();
    board.add_item(footprint("J1", F_COURTYARD, 20.0, 0.0, None)).unwrap();
    let mut settings = DrcSettings::default();
    settings.set_severity(ErrorCode::MissingCourtyard, Severity::Warning);
    let report = run_provider(board, "courtyard", "", settings);
    let missing: Vec<_> = report.by_code(ErrorCode::MissingCourtyard).collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].detail, "J1 has no courtyard");
    assert_eq!(missing[0].severity, Severity::Warning);
}

#[test]
fn test_courtyard_skips_disabled_layer() {
    let mut board = placed_board();
    board.layer_stack.set_enabled(F_COURTYARD, false);
    let report = run_provider(board, "courtyard", "", DrcSettings::default());
    assert!(report.items.is_empty());
}

// ── Board edge ───────────────────────────────────────────────────────

fn outlined_board() -> Board {
    let mut board = Board::new("edge");
    board.outline = Some(vec![
        Point::new(0.0, 0.0),
        Point::new(mm(20.0), 0.0),
        Point::new(mm(20.0), mm(20.0)),
        Point::new(0.0, mm(20.0)),
    ]);
    board
}

#[test]
fn test_copper_near_board_edge() {
    let mut board = outlined_board();
    let near = board.add_item(track(F_CU, 0.2, 5.0, 0.2, 15.0)).unwrap();
    board.add_item(track(F_CU, 10.0, 5.0, 10.0, 15.0)).unwrap();
    let report = run_provider(board, "edge_clearance", "", DrcSettings::default());
    let found: Vec<_> = report.by_code(ErrorCode::CopperEdgeClearance).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].items, vec![near]);
    assert!(found[0].detail.contains("actual 0.1000 mm"));
}

#[test]
fn test_edge_clearance_without_outline_not_run() {
    let mut board = Board::new("no outline");
    board.add_item(track(F_CU, 0.2, 5.0, 0.2, 15.0)).unwrap();
    let report = run_provider(board, "edge_clearance", "", DrcSettings::default());
    assert!(report.items.is_empty());
    assert_eq!(report.tests_not_run, vec!["edge_clearance".to_string()]);
}

// ── Connectivity ─────────────────────────────────────────────────────

fn pads_board(routed: bool) -> Board {
    let mut board = Board::new("pads");
    let net = board.add_net("SIG", None);
    for (n, x) in [("1", 0.0), ("2", 10.0)] {
        board
            .add_item(BoardItem::smd_pad(n, F_CU, Point::new(mm(x), 0.0), mm(1.0), mm(1.0)).with_net(net))
            .unwrap();
    }
    if routed {
        board.add_item(track(F_CU, 0.0, 0.0, 10.0, 0.0).with_net(net)).unwrap();
    }
    board
}

#[test]
fn test_unrouted_net_reported() {
    let report = run_provider(pads_board(false), "connectivity", "", DrcSettings::default());
    let found: Vec<_> = report.by_code(ErrorCode::UnconnectedItems).collect();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].detail, "Missing connection on net SIG");
    assert_eq!(found[0].severity, Severity::Error);
}

#[test]
fn test_routed_net_is_clean() {
    let report = run_provider(pads_board(true), "connectivity", "", DrcSettings::default());
    assert!(report.items.is_empty());
}

#[test]
fn test_connectivity_not_run_when_ignored() {
    let mut settings = DrcSettings::default();
    settings.set_severity(ErrorCode::UnconnectedItems, Severity::Ignore);
    let report = run_provider(pads_board(false), "connectivity", "", settings);
    assert!(report.items.is_empty());
    assert_eq!(report.tests_not_run, vec!["connectivity".to_string()]);
}

// ── Error limit ──────────────────────────────────────────────────────

#[test]
fn test_error_limit_caps_each_code_during_run() {
    let mut board = Board::new("limit");
    for i in 0..50 {
        let y = i as f64;
        board.add_item(track(F_CU, 0.0, y, 2.0, y)).unwrap();
    }
    let settings = DrcSettings {
        max_errors_per_code: Some(5),
        ..Default::default()
    };
    let rules = "(rule thin (constraint track_width (min 0.3mm)))";
    let report = run_provider(board, "track_width", rules, settings);
    assert_eq!(report.by_code(ErrorCode::TrackWidth).count(), 5);
    assert_eq!(report.items.len(), 5);
}
