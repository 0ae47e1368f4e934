use opensilicon_core::{Board, Connectivity, RatsnestEdge};

use super::{TestProvider, PROGRESS_DELTA};
use crate::engine::DrcEngine;
use crate::violation::{DrcItem, ErrorCode, Severity};

/// Reports every ratsnest connection still missing on the board.
pub struct ConnectivityProvider;

impl ConnectivityProvider {
    pub const NAME: &'static str = "connectivity";
}

/// The unconnected-items violation describing one ratsnest edge.
pub fn unconnected_item(board: &Board, edge: &RatsnestEdge, severity: Severity) -> DrcItem {
    DrcItem::new(ErrorCode::UnconnectedItems)
        .with_items(edge.from, Some(edge.to))
        .at(edge.from_pos, None)
        .with_severity(severity)
        .with_detail(format!("Missing connection on net {}", board.net_name(Some(edge.net))))
}

impl TestProvider for ConnectivityProvider {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn description(&self) -> &'static str {
        "Tests for unconnected items"
    }

    fn run(&self, engine: &DrcEngine) -> bool {
        let code = ErrorCode::UnconnectedItems;
        let severity = engine.settings().severity(code);
        if severity == Severity::Ignore || engine.is_error_limit_exceeded(code) {
            engine.report_test_not_run(Self::NAME);
            return true;
        }
        if !engine.report_stage("Checking connectivity") {
            return false;
        }

        let board = engine.board();
        let edges = Connectivity::build(board).ratsnest(board);
        for (i, edge) in edges.iter().enumerate() {
            if i % PROGRESS_DELTA == 0 && !engine.report_progress(i, edges.len()) {
                return false;
            }
            if engine.is_error_limit_exceeded(code) {
                break;
            }
            engine.report_violation(unconnected_item(board, edge, severity));
        }
        if !edges.is_empty() {
            engine.report_aux(&format!("{} unconnected items", edges.len()));
        }
        !engine.is_cancelled()
    }
}
