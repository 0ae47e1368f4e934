use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::condition::EvalContext;
use crate::error::DrcError;
use crate::rule::{ConstraintType, ConstraintValue, Rule, RuleConstraint, Specificity};

/// One rule able to produce a constraint of the set's type.
#[derive(Debug, Clone)]
pub struct RuleSetEntry {
    pub rule: Arc<Rule>,
    pub constraint: RuleConstraint,
    pub specificity: Specificity,
}

/// Rules producing one constraint type, most specific first.
#[derive(Debug, Clone)]
pub struct RuleSet {
    constraint_type: ConstraintType,
    entries: Vec<RuleSetEntry>,
    owning_provider: Option<&'static str>,
}

impl RuleSet {
    pub fn constraint_type(&self) -> ConstraintType {
        self.constraint_type
    }

    pub fn entries(&self) -> &[RuleSetEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most specific entry whose rule matches any of `contexts`.
    pub fn first_match(&self, contexts: &[EvalContext<'_>]) -> Option<&RuleSetEntry> {
        self.entries
            .iter()
            .find(|entry| contexts.iter().any(|ctx| entry.rule.matches(ctx)))
    }
}

fn validate(rule: &Rule) -> Result<(), DrcError> {
    for constraint in &rule.constraints {
        let compile_error = |message: &str| DrcError::Compile {
            rule: rule.name.clone(),
            constraint: constraint.constraint_type,
            message: message.to_string(),
        };
        if let ConstraintValue::Range(range) = &constraint.value {
            if !range.is_consistent() {
                return Err(compile_error("min is greater than max"));
            }
        }
        if constraint.constraint_type.is_single_item() && rule.references_b() {
            return Err(compile_error("condition refers to B but the constraint applies to one item"));
        }
    }
    Ok(())
}

/// Group `rules` by constraint type, sorted by descending specificity.
///
/// Fails on duplicate explicit rule names and on constraints that can never
/// be satisfied or evaluated.
pub fn compile_rule_sets(
    rules: &[Arc<Rule>],
    owners: &HashMap<ConstraintType, &'static str>,
) -> Result<HashMap<ConstraintType, RuleSet>, DrcError> {
    let mut names = HashSet::new();
    for rule in rules.iter().filter(|r| !r.implicit) {
        if !names.insert(rule.name.as_str()) {
            return Err(DrcError::DuplicateRule(rule.name.clone()));
        }
    }
    for rule in rules {
        validate(rule)?;
    }

    let mut sets: HashMap<ConstraintType, RuleSet> = HashMap::new();
    for rule in rules {
        for constraint in &rule.constraints {
            let set = sets
                .entry(constraint.constraint_type)
                .or_insert_with(|| RuleSet {
                    constraint_type: constraint.constraint_type,
                    entries: Vec::new(),
                    owning_provider: owners.get(&constraint.constraint_type).copied(),
                });
            set.entries.push(RuleSetEntry {
                rule: Arc::clone(rule),
                constraint: constraint.clone(),
                specificity: rule.specificity(),
            });
        }
    }

    for set in sets.values_mut() {
        set.entries.sort_by(|a, b| b.specificity.cmp(&a.specificity));
        if set.owning_provider.is_none() {
            log::warn!("No provider checks {} constraints; {} rule(s) unused", set.constraint_type, set.len());
        }
        log::debug!("Rule set {}: {} rule(s)", set.constraint_type, set.len());
    }
    Ok(sets)
}
