//! Reader for rule documents.
//!
//! ```text
//! (version 1)
//! (rule "HV"
//!   (layer outer)
//!   (condition "A.NetClass == 'HV'")
//!   (constraint clearance (min 0.5mm))
//!   (severity warning))
//! ```
//!
//! `#` or `;` starts a comment that runs to the end of the line.

use opensilicon_core::{ItemType, LayerStack};

use crate::condition::RuleCondition;
use crate::error::DrcError;
use crate::rule::{ConstraintType, ConstraintValue, LayerCondition, MinOptMax, Rule, RuleConstraint, ValueKind};
use crate::units::parse_quantity;
use crate::violation::Severity;

/// Newest rule document version this reader understands.
pub const RULES_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
enum SExpr {
    Atom {
        text: String,
        quoted: bool,
        line: usize,
        column: usize,
    },
    List {
        items: Vec<SExpr>,
        line: usize,
        column: usize,
    },
}

impl SExpr {
    fn position(&self) -> (usize, usize) {
        match self {
            SExpr::Atom { line, column, .. } | SExpr::List { line, column, .. } => (*line, *column),
        }
    }

    fn atom(&self) -> Option<&str> {
        match self {
            SExpr::Atom { text, .. } => Some(text.as_str()),
            SExpr::List { .. } => None,
        }
    }

    /// Head keyword and arguments of a list like `(min 0.5mm)`.
    fn clause(&self) -> Option<(&str, &[SExpr])> {
        match self {
            SExpr::List { items, .. } => {
                let (head, rest) = items.split_first()?;
                match head {
                    SExpr::Atom { text, quoted: false, .. } => Some((text.as_str(), rest)),
                    _ => None,
                }
            }
            SExpr::Atom { .. } => None,
        }
    }
}

/// Parses one rule document. `source` names it in error messages.
pub struct RuleParser<'a> {
    source: &'a str,
    stack: &'a LayerStack,
}

impl<'a> RuleParser<'a> {
    pub fn new(source: &'a str, stack: &'a LayerStack) -> Self {
        Self { source, stack }
    }

    fn error(&self, (line, column): (usize, usize), message: impl Into<String>) -> DrcError {
        DrcError::Parse {
            file: self.source.to_string(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Parse `text` into rules, numbered in document order.
    pub fn parse(&self, text: &str) -> Result<Vec<Rule>, DrcError> {
        let mut rules = Vec::new();
        for node in self.read(text)? {
            match node.clause() {
                Some(("version", [value])) => {
                    let found: u32 = value
                        .atom()
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| self.error(value.position(), "expected a version number"))?;
                    if found > RULES_VERSION {
                        return Err(DrcError::UnsupportedVersion {
                            file: self.source.to_string(),
                            found,
                            supported: RULES_VERSION,
                        });
                    }
                }
                Some(("rule", args)) => {
                    let mut rule = self.rule(&node, args)?;
                    rule.order = rules.len();
                    rules.push(rule);
                }
                Some((other, _)) => {
                    return Err(self.error(node.position(), format!("unknown clause '{other}'")));
                }
                None => return Err(self.error(node.position(), "expected '(version ...)' or '(rule ...)'")),
            }
        }
        Ok(rules)
    }

    fn rule(&self, node: &SExpr, args: &[SExpr]) -> Result<Rule, DrcError> {
        let (name, clauses) = args
            .split_first()
            .ok_or_else(|| self.error(node.position(), "rule needs a name"))?;
        let name = name
            .atom()
            .ok_or_else(|| self.error(name.position(), "rule name must be a string"))?;
        let mut rule = Rule::new(name);

        for clause in clauses {
            match clause.clause() {
                Some(("condition", [expr])) => rule.conditions.push(self.condition(expr)?),
                Some(("constraint", args)) => {
                    let constraint = self.constraint(clause, args)?;
                    rule.constraints.push(constraint);
                }
                Some(("layer", [layer])) => rule.layer = Some(self.layer(layer)?),
                Some(("severity", [word])) => {
                    let severity = word
                        .atom()
                        .and_then(Severity::from_keyword)
                        .ok_or_else(|| self.error(word.position(), "unknown severity"))?;
                    rule.severity = Some(severity);
                }
                Some((other, _)) => {
                    return Err(self.error(clause.position(), format!("unexpected '{other}' in rule '{name}'")));
                }
                None => return Err(self.error(clause.position(), format!("unexpected token in rule '{name}'"))),
            }
        }

        if rule.constraints.is_empty() {
            return Err(self.error(node.position(), format!("rule '{name}' has no constraint")));
        }
        Ok(rule)
    }

    fn condition(&self, expr: &SExpr) -> Result<RuleCondition, DrcError> {
        let SExpr::Atom { text, quoted, line, column } = expr else {
            return Err(self.error(expr.position(), "condition must be a quoted expression"));
        };
        RuleCondition::parse(text).map_err(|e| {
            let offset = usize::from(*quoted);
            self.error((*line, column + offset + e.column - 1), e.message)
        })
    }

    fn constraint(&self, node: &SExpr, args: &[SExpr]) -> Result<RuleConstraint, DrcError> {
        let (kind, values) = args
            .split_first()
            .ok_or_else(|| self.error(node.position(), "constraint needs a type"))?;
        let constraint_type = kind
            .atom()
            .and_then(ConstraintType::from_keyword)
            .ok_or_else(|| self.error(kind.position(), "unknown constraint type"))?;

        let value = if constraint_type == ConstraintType::Disallow {
            let types = values
                .iter()
                .map(|v| {
                    v.atom()
                        .and_then(ItemType::from_name)
                        .ok_or_else(|| self.error(v.position(), "unknown item type"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            ConstraintValue::Disallow(types)
        } else {
            let mut range = MinOptMax::default();
            for v in values {
                let (slot, amount) = match v.clause() {
                    Some(("min", [amount])) => (&mut range.min, amount),
                    Some(("opt", [amount])) => (&mut range.opt, amount),
                    Some(("max", [amount])) => (&mut range.max, amount),
                    _ => return Err(self.error(v.position(), "expected (min ...), (opt ...) or (max ...)")),
                };
                *slot = Some(self.quantity(amount, constraint_type.value_kind())?);
            }
            ConstraintValue::Range(range)
        };

        Ok(RuleConstraint {
            constraint_type,
            value,
        })
    }

    fn quantity(&self, node: &SExpr, kind: ValueKind) -> Result<f64, DrcError> {
        let quantity = node
            .atom()
            .and_then(parse_quantity)
            .ok_or_else(|| self.error(node.position(), "invalid number or unit"))?;
        let value = match kind {
            ValueKind::Angle => quantity.to_angle(),
            _ => quantity.to_length(),
        };
        value.ok_or_else(|| self.error(node.position(), "invalid unit for this constraint"))
    }

    fn layer(&self, node: &SExpr) -> Result<LayerCondition, DrcError> {
        match node.atom() {
            Some(word) if word.eq_ignore_ascii_case("outer") => Ok(LayerCondition::Outer),
            Some(word) if word.eq_ignore_ascii_case("inner") => Ok(LayerCondition::Inner),
            Some(name) => self
                .stack
                .get_layer_by_name(name)
                .map(|l| LayerCondition::Layer(l.id))
                .ok_or_else(|| self.error(node.position(), format!("unknown layer '{name}'"))),
            None => Err(self.error(node.position(), "expected a layer name")),
        }
    }

    // ── S-expression reader ──────────────────────────────────────────

    fn read(&self, text: &str) -> Result<Vec<SExpr>, DrcError> {
        let mut stack: Vec<(Vec<SExpr>, usize, usize)> = Vec::new();
        let mut top = Vec::new();
        let mut chars = text.chars().peekable();
        let (mut line, mut column) = (1, 0);

        while let Some(c) = chars.next() {
            column += 1;
            let pos = (line, column);
            match c {
                '\n' => {
                    line += 1;
                    column = 0;
                }
                c if c.is_whitespace() => {}
                '#' | ';' => {
                    while chars.peek().is_some_and(|&n| n != '\n') {
                        chars.next();
                    }
                }
                '(' => stack.push((Vec::new(), line, column)),
                ')' => {
                    let (items, l, col) = stack
                        .pop()
                        .ok_or_else(|| self.error(pos, "unbalanced ')'"))?;
                    let list = SExpr::List {
                        items,
                        line: l,
                        column: col,
                    };
                    match stack.last_mut() {
                        Some((parent, ..)) => parent.push(list),
                        None => top.push(list),
                    }
                }
                '"' => {
                    let mut value = String::new();
                    loop {
                        let next = chars.next().ok_or_else(|| self.error(pos, "unterminated string"))?;
                        column += 1;
                        match next {
                            '"' => break,
                            '\\' => {
                                let escaped = chars.next().ok_or_else(|| self.error(pos, "unterminated string"))?;
                                column += 1;
                                value.push(escaped);
                            }
                            '\n' => return Err(self.error(pos, "unterminated string")),
                            other => value.push(other),
                        }
                    }
                    let atom = SExpr::Atom {
                        text: value,
                        quoted: true,
                        line: pos.0,
                        column: pos.1,
                    };
                    self.push_atom(&mut stack, atom, pos)?;
                }
                c => {
                    let mut value = String::from(c);
                    while let Some(&n) = chars.peek() {
                        if n.is_whitespace() || n == '(' || n == ')' || n == '"' {
                            break;
                        }
                        value.push(n);
                        chars.next();
                        column += 1;
                    }
                    let atom = SExpr::Atom {
                        text: value,
                        quoted: false,
                        line: pos.0,
                        column: pos.1,
                    };
                    self.push_atom(&mut stack, atom, pos)?;
                }
            }
        }

        if let Some((_, l, col)) = stack.last() {
            return Err(self.error((*l, *col), "unbalanced '('"));
        }
        Ok(top)
    }

    fn push_atom(
        &self,
        stack: &mut [(Vec<SExpr>, usize, usize)],
        atom: SExpr,
        pos: (usize, usize),
    ) -> Result<(), DrcError> {
        match stack.last_mut() {
            Some((items, ..)) => {
                items.push(atom);
                Ok(())
            }
            None => Err(self.error(pos, "unexpected token outside a clause")),
        }
    }
}
