use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use opensilicon_core::{mm, Board, BoardItem, NetClass, Point};
use opensilicon_drc::{
    BoardMarkersProvider, CancellationToken, ConstraintType, DrcEngine, DrcSettings, ErrorCode, MarkerList, ProgressReporter,
    ProviderRegistry, RcItemsProvider, RunStatus, Severity, SeverityMask, WorkerPool,
};

fn track(x0: f64, y0: f64, x1: f64, y1: f64, width: f64) -> BoardItem {
    BoardItem::track(0, Point::new(mm(x0), mm(y0)), Point::new(mm(x1), mm(y1)), mm(width))
}

/// An HV track and a GND track with 0.3 mm of copper between them.
fn hv_board() -> Arc<Board> {
    let mut board = Board::new("hv");
    board.set_net_class(NetClass::new("HV", mm(0.4), mm(0.2)));
    let hv = board.add_net("HV1", Some("HV"));
    let gnd = board.add_net("GND", None);
    board.add_item(track(0.0, 0.0, 5.0, 0.0, 0.2).with_net(hv)).unwrap();
    board.add_item(track(0.0, 0.5, 5.0, 0.5, 0.2).with_net(gnd)).unwrap();
    Arc::new(board)
}

fn many_tracks(count: usize) -> Arc<Board> {
    let mut board = Board::new("many");
    for i in 0..count {
        let y = i as f64;
        board.add_item(track(0.0, y, 2.0, y, 0.2)).unwrap();
    }
    Arc::new(board)
}

fn engine(board: Arc<Board>, rules: &str) -> DrcEngine {
    let mut engine = DrcEngine::new(board, DrcSettings::default())
        .with_worker_pool(Arc::new(WorkerPool::new(Some(2)).unwrap()));
    engine.load_rules_from_str(rules, "test.rules").unwrap();
    engine.compile_rules().unwrap();
    engine
}

#[test]
fn test_netclass_rule_reports_clearance_violation() {
    let rules = r#"
        (version 1)
        (rule R1
          (condition "A.NetClass == 'HV'")
          (constraint clearance (min 0.5mm)))
    "#;
    let mut engine = engine(hv_board(), rules);
    let report = engine.run_tests().unwrap();

    assert!(report.is_complete());
    let clearance: Vec<_> = report.by_code(ErrorCode::Clearance).collect();
    assert_eq!(clearance.len(), 1);
    assert_eq!(clearance[0].rule_name.as_deref(), Some("R1"));
    assert_eq!(clearance[0].severity, Severity::Error);
    assert_eq!(clearance[0].items.len(), 2);
    assert!(clearance[0].detail.contains("0.5000 mm"));
    assert!(clearance[0].display_text().contains("rule 'R1'"));
}

#[test]
fn test_more_specific_and_later_rules_win() {
    let mut board = Board::new("precedence");
    board.set_net_class(NetClass::new("HV", mm(0.4), mm(0.2)));
    let hv = board.add_net("HV1", Some("HV"));
    let gnd = board.add_net("GND", None);
    let sig = board.add_net("SIG", None);
    board.add_item(track(0.0, 0.0, 1.0, 0.0, 0.2).with_net(hv)).unwrap();
    board.add_item(track(0.0, 1.0, 1.0, 1.0, 0.2).with_net(gnd)).unwrap();
    board.add_item(track(0.0, 2.0, 1.0, 2.0, 0.2).with_net(sig)).unwrap();
    let board = Arc::new(board);

    let rules = r#"
        (rule general (constraint clearance (min 0.3mm)))
        (rule hv (condition "A.NetClass == 'HV'") (constraint clearance (min 0.6mm)))
        (rule hv_to_gnd
          (condition "A.NetClass == 'HV' && B.NetName == 'GND'")
          (constraint clearance (min 1mm)))
        (rule hv_late (condition "A.NetClass == 'HV'") (constraint clearance (min 0.7mm)))
    "#;
    let engine = engine(Arc::clone(&board), rules);
    let items = board.items();
    let (hv, gnd, sig) = (&items[0], &items[1], &items[2]);
    let kind = ConstraintType::Clearance;

    let c = engine.eval_rules_for_items(kind, hv, Some(gnd), Some(0));
    assert_eq!(c.rule_name(), "hv_to_gnd");
    assert_eq!(c.min(), Some(mm(1.0)));

    let c = engine.eval_rules_for_items(kind, gnd, Some(hv), Some(0));
    assert_eq!(c.rule_name(), "hv_to_gnd");

    let c = engine.eval_rules_for_items(kind, hv, Some(sig), Some(0));
    assert_eq!(c.rule_name(), "hv_late");
    assert_eq!(c.min(), Some(mm(0.7)));

    // Explicit rules outrank the implicit netclass and board setup rules.
    let c = engine.eval_rules_for_items(kind, sig, Some(gnd), Some(0));
    assert_eq!(c.rule_name(), "general");
}

#[test]
fn test_no_matching_rule_is_ignored() {
    let board = hv_board();
    let engine = engine(Arc::clone(&board), "");
    let c = engine.eval_rules_for_items(ConstraintType::TrackAngle, &board.items()[0], None, Some(0));
    assert_eq!(c.severity, Severity::Ignore);
    assert!(c.is_ignored());
    assert_eq!(c.rule_name(), "");
    assert_eq!(c.min(), None);
}

#[test]
fn test_repeated_runs_give_the_same_report() {
    let rules = r#"
        (rule R1 (condition "A.NetClass == 'HV'") (constraint clearance (min 0.5mm)))
        (rule thin (constraint track_width (min 0.25mm)))
    "#;
    let mut engine = engine(hv_board(), rules);
    let first = engine.run_tests().unwrap();
    let second = engine.run_tests().unwrap();

    assert_eq!(first.items.len(), 3);
    assert_eq!(first.items.len(), second.items.len());
    for item in &first.items {
        assert!(second.items.iter().any(|other| other.same_violation(item)));
    }
    assert_eq!(first.providers_run, second.providers_run);
    assert_eq!(first.tests_not_run, second.tests_not_run);
}

#[test]
fn test_provider_without_rules_does_no_work() {
    let mut registry = ProviderRegistry::builtin();
    registry.retain(&["track_angle"]);
    let mut engine = DrcEngine::new(many_tracks(10_000), DrcSettings::default()).with_registry(&registry);
    engine.compile_rules().unwrap();

    let report = engine.run_tests().unwrap();
    assert!(report.is_complete());
    assert!(report.items.is_empty());
    assert_eq!(report.tests_not_run, vec!["track_angle".to_string()]);
    assert_eq!(engine.rule_eval_count(), 0);
}

/// Cancels once the engine reaches its second provider, while armed.
struct CancelAtSecondStage {
    armed: AtomicBool,
    cancelled: AtomicBool,
    stages: Mutex<Vec<String>>,
}

impl Default for CancelAtSecondStage {
    fn default() -> Self {
        Self {
            armed: AtomicBool::new(true),
            cancelled: AtomicBool::new(false),
            stages: Mutex::new(Vec::new()),
        }
    }
}

impl CancelAtSecondStage {
    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

impl ProgressReporter for CancelAtSecondStage {
    fn report_stage(&self, name: &str, index: usize, _total: usize) {
        self.stages.lock().unwrap().push(name.to_string());
        if index >= 1 && self.armed.load(Ordering::SeqCst) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

fn cancellable_engine(reporter: Arc<CancelAtSecondStage>) -> DrcEngine {
    let mut registry = ProviderRegistry::builtin();
    registry.retain(&["track_width", "clearance"]);
    let mut engine = DrcEngine::new(many_tracks(10_000), DrcSettings::default())
        .with_registry(&registry)
        .with_worker_pool(Arc::new(WorkerPool::new(Some(2)).unwrap()))
        .with_progress(reporter);
    engine
        .load_rules_from_str("(rule thin (constraint track_width (min 0.3mm)))", "test.rules")
        .unwrap();
    engine.compile_rules().unwrap();
    engine
}

#[test]
fn test_cancellation_stops_between_providers() {
    let reporter = Arc::new(CancelAtSecondStage::default());
    let mut engine = cancellable_engine(reporter.clone());

    let report = engine.run_tests().unwrap();
    assert_eq!(report.status, RunStatus::Cancelled);
    assert_eq!(report.providers_run, vec!["track_width".to_string()]);
    assert_eq!(report.items.len(), 10_000);
    assert!(report.items.iter().all(|i| i.error_code == ErrorCode::TrackWidth));
    assert_eq!(reporter.stages.lock().unwrap().len(), 2);
    assert!(report.summary().starts_with("DRC cancelled"));
}

#[test]
fn test_run_after_cancelled_run_completes() {
    let reporter = Arc::new(CancelAtSecondStage::default());
    let mut engine = cancellable_engine(reporter.clone());
    assert_eq!(engine.run_tests().unwrap().status, RunStatus::Cancelled);

    reporter.disarm();
    let report = engine.run_tests().unwrap();
    assert_eq!(report.status, RunStatus::Complete);
    assert_eq!(report.providers_run, vec!["track_width".to_string(), "clearance".to_string()]);
    assert_eq!(report.items.len(), 10_000);
    assert!(!engine.is_cancelled());
}

#[test]
fn test_injected_token_stays_cancelled() {
    let mut engine = engine(hv_board(), "").with_cancellation(CancellationToken::cancelled());
    assert_eq!(engine.run_tests().unwrap().status, RunStatus::Cancelled);
    assert_eq!(engine.run_tests().unwrap().status, RunStatus::Cancelled);
}

#[test]
fn test_deep_delete_removes_marker_from_board() {
    let rules = r#"
        (rule R1 (condition "A.NetClass == 'HV'") (constraint clearance (min 0.5mm)))
        (rule thin (constraint track_width (min 0.25mm)))
    "#;
    let mut engine = engine(hv_board(), rules);
    let report = engine.run_tests().unwrap();
    let mut markers = MarkerList::new();
    markers.replace_with_run(report.items);
    assert_eq!(markers.len(), 3);

    let settings = DrcSettings::default();
    let mut view = BoardMarkersProvider::new(&mut markers, &settings);
    view.set_severities(SeverityMask::ERRORS | SeverityMask::WARNINGS);
    assert_eq!(view.count(None), 3);
    view.delete_item(0, true);
    assert_eq!(view.count(None), 2);
    view.set_severities(SeverityMask::ALL);
    assert_eq!(view.count(None), 2);
    assert_eq!(markers.len(), 2);
}
