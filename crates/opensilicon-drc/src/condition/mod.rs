//! Rule conditions: a small expression language over a pair of board items.
//!
//! A condition is tokenized and parsed once when rules are loaded, then
//! compiled into a closure. Evaluation is pure: the same items, layer and
//! board always give the same answer, and it is safe from any thread.

mod lexer;
mod parser;
mod pattern;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use opensilicon_core::{Board, BoardItem, LayerId};

pub use parser::{BinaryOp, Expr, ItemRef, Literal, Method, Property};
pub use pattern::TextPattern;

/// Syntax error in a condition, with the 1-based column it was found at.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("column {column}: {message}")]
pub struct ConditionError {
    pub message: String,
    pub column: usize,
}

impl ConditionError {
    pub fn new(message: impl Into<String>, column: usize) -> Self {
        Self {
            message: message.into(),
            column,
        }
    }
}

/// Why a condition could not be evaluated. The rule simply does not match.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("condition refers to B but only one item was given")]
    MissingItemB,

    #[error("{item} has no {property:?}")]
    MissingProperty { item: &'static str, property: Property },

    #[error("cannot apply {op:?} to {lhs} and {rhs}")]
    TypeMismatch {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Num(f64),
    Str(String),
    /// A string literal, possibly a glob.
    Pattern(Arc<TextPattern>),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) | Value::Pattern(_) => "string",
        }
    }

    fn as_bool(&self, op: &'static str) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(EvalError::TypeMismatch {
                op,
                lhs: other.type_name(),
                rhs: "boolean",
            }),
        }
    }
}

/// The inputs a condition is evaluated against.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub board: &'a Board,
    pub a: &'a BoardItem,
    pub b: Option<&'a BoardItem>,
    pub layer: Option<LayerId>,
}

impl<'a> EvalContext<'a> {
    pub fn new(board: &'a Board, a: &'a BoardItem, b: Option<&'a BoardItem>, layer: Option<LayerId>) -> Self {
        Self { board, a, b, layer }
    }

    fn item(&self, which: ItemRef) -> Result<&'a BoardItem, EvalError> {
        match which {
            ItemRef::A => Ok(self.a),
            ItemRef::B => self.b.ok_or(EvalError::MissingItemB),
        }
    }
}

type Compiled = Box<dyn Fn(&EvalContext<'_>) -> Result<Value, EvalError> + Send + Sync>;

/// A parsed and compiled condition.
pub struct RuleCondition {
    source: String,
    weight: u32,
    references_b: bool,
    compiled: Compiled,
}

impl fmt::Debug for RuleCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleCondition")
            .field("source", &self.source)
            .field("weight", &self.weight)
            .finish()
    }
}

impl RuleCondition {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        let tokens = lexer::tokenize(source)?;
        let expr = parser::parse(&tokens, source.chars().count())?;
        Ok(Self {
            source: source.to_string(),
            weight: expr.weight().max(1),
            references_b: expr.references_b(),
            compiled: compile(expr),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn references_b(&self) -> bool {
        self.references_b
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<bool, EvalError> {
        (self.compiled)(ctx)?.as_bool("condition")
    }
}

fn compile(expr: Expr) -> Compiled {
    match expr {
        Expr::Literal(lit) => {
            let value = match lit {
                Literal::Bool(b) => Value::Bool(b),
                Literal::Num(n) => Value::Num(n),
                Literal::Str(pattern) => Value::Pattern(Arc::new(pattern)),
            };
            Box::new(move |_: &EvalContext<'_>| Ok(value.clone()))
        }
        Expr::Property(which, property) => {
            Box::new(move |ctx: &EvalContext<'_>| property_value(ctx, which, property))
        }
        Expr::Method(which, method) => Box::new(move |ctx: &EvalContext<'_>| {
            let item = ctx.item(which)?;
            Ok(Value::Bool(match &method {
                Method::ExistsOnLayer(pattern) => item
                    .layers()
                    .into_iter()
                    .any(|l| pattern.matches(ctx.board.layer_stack.layer_name(l))),
                Method::IsPlated => item.is_plated(),
            }))
        }),
        Expr::Not(inner) => {
            let inner = compile(*inner);
            Box::new(move |ctx: &EvalContext<'_>| Ok(Value::Bool(!inner(ctx)?.as_bool("!")?)))
        }
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            let (lhs, rhs) = (compile(*lhs), compile(*rhs));
            Box::new(move |ctx: &EvalContext<'_>| {
                Ok(Value::Bool(lhs(ctx)?.as_bool("&&")? && rhs(ctx)?.as_bool("&&")?))
            })
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            let (lhs, rhs) = (compile(*lhs), compile(*rhs));
            Box::new(move |ctx: &EvalContext<'_>| {
                Ok(Value::Bool(lhs(ctx)?.as_bool("||")? || rhs(ctx)?.as_bool("||")?))
            })
        }
        Expr::Binary(op, lhs, rhs) => {
            let (lhs, rhs) = (compile(*lhs), compile(*rhs));
            Box::new(move |ctx: &EvalContext<'_>| compare(op, &lhs(ctx)?, &rhs(ctx)?).map(Value::Bool))
        }
    }
}

fn property_value(ctx: &EvalContext<'_>, which: ItemRef, property: Property) -> Result<Value, EvalError> {
    let item = ctx.item(which)?;
    let board = ctx.board;
    let missing = || EvalError::MissingProperty {
        item: item.type_name(),
        property,
    };
    Ok(match property {
        Property::NetName => Value::Str(board.net_name(item.net).to_string()),
        Property::NetClass => Value::Str(board.net_class_name(item).to_string()),
        Property::Type => Value::Str(item.type_name().to_string()),
        Property::Layer => {
            let layer = ctx
                .layer
                .filter(|l| item.is_on_layer(*l))
                .or_else(|| item.layers().first().copied())
                .ok_or_else(missing)?;
            Value::Str(board.layer_stack.layer_name(layer).to_string())
        }
        Property::Width => Value::Num(item.width().ok_or_else(missing)?),
        Property::Diameter => Value::Num(item.diameter().ok_or_else(missing)?),
        Property::Drill => Value::Num(item.drill().ok_or_else(missing)?),
        Property::Reference => Value::Str(board.reference_of(item).ok_or_else(missing)?.to_string()),
    })
}

/// Lengths are compared to within half a nanometre.
const NUM_EPSILON: f64 = 0.5;

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<bool, EvalError> {
    let op_name = match op {
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
    };
    let mismatch = || EvalError::TypeMismatch {
        op: op_name,
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    };

    let equal = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Some(a.eq_ignore_ascii_case(b)),
        (Value::Str(s), Value::Pattern(p)) | (Value::Pattern(p), Value::Str(s)) => Some(p.matches(s)),
        (Value::Pattern(a), Value::Pattern(b)) => Some(a.as_str().eq_ignore_ascii_case(b.as_str())),
        (Value::Num(a), Value::Num(b)) => Some((a - b).abs() < NUM_EPSILON),
        (Value::Bool(a), Value::Bool(b)) => Some(a == b),
        _ => None,
    };

    match op {
        BinaryOp::Eq => equal.ok_or_else(mismatch),
        BinaryOp::Ne => equal.map(|e| !e).ok_or_else(mismatch),
        _ => {
            let (Value::Num(a), Value::Num(b)) = (lhs, rhs) else {
                return Err(mismatch());
            };
            Ok(match op {
                BinaryOp::Lt => *a < *b,
                BinaryOp::Le => *a <= *b,
                BinaryOp::Gt => *a > *b,
                _ => *a >= *b,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opensilicon_core::{mm, NetClass, Point};

    fn board_with_items() -> (Board, BoardItem, BoardItem) {
        let mut board = Board::new("t");
        board.set_net_class(NetClass::new("HV", mm(0.5), mm(0.4)));
        let hv = board.add_net("HV_IN", Some("HV"));
        let gnd = board.add_net("GND", None);
        let track = BoardItem::track(0, Point::new(0.0, 0.0), Point::new(mm(5.0), 0.0), mm(0.3)).with_net(hv);
        let via = BoardItem::via(Point::new(0.0, mm(1.0)), mm(0.6), mm(0.3), vec![0, 31]).with_net(gnd);
        board.add_item(track.clone()).unwrap();
        board.add_item(via.clone()).unwrap();
        (board, track, via)
    }

    fn eval(src: &str, board: &Board, a: &BoardItem, b: Option<&BoardItem>) -> Result<bool, EvalError> {
        RuleCondition::parse(src).unwrap().evaluate(&EvalContext::new(board, a, b, None))
    }

    #[test]
    fn test_netclass_and_type() {
        let (board, track, via) = board_with_items();
        assert_eq!(eval("A.NetClass == 'HV'", &board, &track, None), Ok(true));
        assert_eq!(eval("A.NetClass == 'hv'", &board, &track, None), Ok(true));
        assert_eq!(eval("B.Type == 'Via' && B.NetName == 'GND'", &board, &track, Some(&via)), Ok(true));
        assert_eq!(eval("A.NetClass == 'HV'", &board, &via, None), Ok(false));
    }

    #[test]
    fn test_wildcards() {
        let (board, track, via) = board_with_items();
        assert_eq!(eval("A.NetName == 'HV_*'", &board, &track, None), Ok(true));
        assert_eq!(eval("A.existsOnLayer('B.*')", &board, &via, None), Ok(true));
        assert_eq!(eval("A.existsOnLayer('B.*')", &board, &track, None), Ok(false));
        assert_eq!(eval("A.NetName != 'hv_?n'", &board, &track, None), Ok(false));
        assert_eq!(eval("'GND' == B.NetName", &board, &track, Some(&via)), Ok(true));
    }

    #[test]
    fn test_numeric_comparisons() {
        let (board, track, via) = board_with_items();
        assert_eq!(eval("A.Width >= 0.3mm", &board, &track, None), Ok(true));
        assert_eq!(eval("A.Width < 10mil", &board, &track, None), Ok(false));
        assert_eq!(eval("A.Drill == 0.3mm && A.isPlated()", &board, &via, None), Ok(true));
    }

    #[test]
    fn test_evaluation_failures() {
        let (board, track, via) = board_with_items();
        assert_eq!(eval("B.NetClass == 'HV'", &board, &track, None), Err(EvalError::MissingItemB));
        assert!(matches!(
            eval("A.Width > 0.1mm", &board, &via, None),
            Err(EvalError::MissingProperty { .. })
        ));
        assert!(matches!(
            eval("A.NetName > 1mm", &board, &track, None),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert!(matches!(eval("A.NetName", &board, &track, None), Err(EvalError::TypeMismatch { .. })));
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let (board, track, via) = board_with_items();
        let cond = RuleCondition::parse("A.NetClass == 'HV' || B.Type == 'Pad'").unwrap();
        let ctx = EvalContext::new(&board, &track, Some(&via), Some(0));
        let first = cond.evaluate(&ctx);
        for _ in 0..10 {
            assert_eq!(cond.evaluate(&ctx), first);
        }
    }
}
