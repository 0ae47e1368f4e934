//! Rules synthesised from board setup and net classes.
//!
//! Providers only ever query the engine; these rules make the legacy numeric
//! settings answer through the same path as hand-written rules.

use opensilicon_core::{Board, NetClass, DEFAULT_NETCLASS};

use crate::condition::RuleCondition;
use crate::rule::{ConstraintType, ConstraintValue, MinOptMax, Rule, RuleConstraint};
use crate::settings::DrcSettings;

pub const BOARD_SETUP_RULE: &str = "board setup";

fn range(constraint_type: ConstraintType, range: MinOptMax) -> RuleConstraint {
    RuleConstraint {
        constraint_type,
        value: ConstraintValue::Range(range),
    }
}

fn positive(value: f64) -> Option<f64> {
    (value > 0.0).then_some(value)
}

fn implicit(name: String, constraints: Vec<RuleConstraint>) -> Rule {
    let mut rule = Rule::new(name);
    rule.implicit = true;
    rule.constraints = constraints;
    rule
}

/// Quote `value` as a condition string literal.
fn quoted(value: &str) -> Option<String> {
    if !value.contains('\'') {
        Some(format!("'{value}'"))
    } else if !value.contains('"') {
        Some(format!("\"{value}\""))
    } else {
        None
    }
}

/// Build the implicit rules for `board`. Orders start at zero; explicit rules
/// always outrank these regardless of order.
pub fn implicit_rules(board: &Board, settings: &DrcSettings) -> Vec<Rule> {
    let min = &settings.board_minimums;
    let default_class = board.net_class(DEFAULT_NETCLASS).cloned().unwrap_or_default();

    let mut setup = vec![
        range(
            ConstraintType::Clearance,
            MinOptMax::min(min.clearance.max(default_class.clearance)),
        ),
        range(ConstraintType::CourtyardClearance, MinOptMax::min(min.courtyard_clearance)),
    ];
    let optional = [
        (ConstraintType::HoleClearance, min.hole_clearance),
        (ConstraintType::EdgeClearance, min.edge_clearance),
        (ConstraintType::TrackWidth, min.track_width),
        (ConstraintType::ViaDiameter, min.via_diameter),
        (ConstraintType::HoleSize, min.hole_size),
    ];
    for (constraint_type, value) in optional {
        if let Some(value) = positive(value) {
            setup.push(range(constraint_type, MinOptMax::min(value)));
        }
    }

    let mut rules = vec![implicit(BOARD_SETUP_RULE.to_string(), setup)];

    // Larger clearances get later orders so they win when both items match.
    let mut classes: Vec<&NetClass> = board
        .net_classes()
        .iter()
        .filter(|c| c.name != DEFAULT_NETCLASS)
        .collect();
    classes.sort_by(|a, b| a.clearance.total_cmp(&b.clearance));

    for class in classes {
        let Some(name) = quoted(&class.name) else {
            log::warn!("Net class {:?} cannot be quoted in a condition; skipping its rules", class.name);
            continue;
        };
        let rule_name = format!("netclass '{}'", class.name);

        let pair_condition = format!("A.NetClass == {name} || B.NetClass == {name}");
        let item_condition = format!("A.NetClass == {name}");
        let (Ok(pair), Ok(item)) = (RuleCondition::parse(&pair_condition), RuleCondition::parse(&item_condition))
        else {
            log::warn!("Could not build net class condition for {:?}", class.name);
            continue;
        };

        let mut clearance = implicit(
            rule_name.clone(),
            vec![range(
                ConstraintType::Clearance,
                MinOptMax::min(class.clearance.max(min.clearance)),
            )],
        );
        clearance.conditions.push(pair);
        rules.push(clearance);

        let mut sizes = implicit(
            rule_name,
            vec![
                range(
                    ConstraintType::TrackWidth,
                    MinOptMax {
                        min: positive(min.track_width),
                        opt: Some(class.track_width),
                        max: None,
                    },
                ),
                range(
                    ConstraintType::ViaDiameter,
                    MinOptMax {
                        min: positive(min.via_diameter),
                        opt: Some(class.via_diameter),
                        max: None,
                    },
                ),
            ],
        );
        sizes.conditions.push(item);
        rules.push(sizes);
    }

    for (order, rule) in rules.iter_mut().enumerate() {
        rule.order = order;
    }
    log::debug!("Synthesised {} implicit rules", rules.len());
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensilicon_core::mm;

    #[test]
    fn test_board_setup_only() {
        let board = Board::new("t");
        let rules = implicit_rules(&board, &DrcSettings::default());
        assert_eq!(rules.len(), 1);
        let setup = &rules[0];
        assert!(setup.implicit);
        assert!(setup.conditions.is_empty());
        assert!(setup.constraint(ConstraintType::Clearance).is_some());
        assert!(setup.constraint(ConstraintType::TrackWidth).is_none());
        assert!(setup.constraint(ConstraintType::TrackAngle).is_none());
    }

    #[test]
    fn test_netclass_rules_ordered_by_clearance() {
        let mut board = Board::new("t");
        board.set_net_class(NetClass::new("HV", mm(0.8), mm(0.5)));
        board.set_net_class(NetClass::new("Fine", mm(0.1), mm(0.1)));
        let rules = implicit_rules(&board, &DrcSettings::default());
        assert_eq!(rules.len(), 5);
        let clearance_rules: Vec<_> = rules
            .iter()
            .filter(|r| r.name != BOARD_SETUP_RULE && r.constraint(ConstraintType::Clearance).is_some())
            .collect();
        assert_eq!(clearance_rules[0].name, "netclass 'Fine'");
        assert_eq!(clearance_rules[1].name, "netclass 'HV'");
        assert!(clearance_rules[1].specificity() > clearance_rules[0].specificity());
        assert!(rules
            .iter()
            .filter(|r| r.constraint(ConstraintType::TrackWidth).is_some())
            .all(|r| !r.references_b()));
    }
}
