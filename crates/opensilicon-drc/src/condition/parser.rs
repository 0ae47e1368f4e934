//! Recursive-descent parser producing the condition AST.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or      := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | compare
//! compare := primary ( op primary )?
//! primary := "(" or ")" | string | number | "true" | "false"
//!          | item "." property | item "." method "(" args? ")"
//! ```

use super::lexer::{Spanned, Token};
use super::pattern::TextPattern;
use super::ConditionError;

/// Which side of the query an accessor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    NetName,
    NetClass,
    Type,
    Layer,
    Width,
    Diameter,
    Drill,
    Reference,
}

impl Property {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "NetName" | "Net" => Property::NetName,
            "NetClass" => Property::NetClass,
            "Type" => Property::Type,
            "Layer" => Property::Layer,
            "Width" => Property::Width,
            "Diameter" => Property::Diameter,
            "Drill" | "Hole" => Property::Drill,
            "Reference" => Property::Reference,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    ExistsOnLayer(TextPattern),
    IsPlated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        !matches!(self, BinaryOp::Or | BinaryOp::And)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Num(f64),
    Str(TextPattern),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Property(ItemRef, Property),
    Method(ItemRef, Method),
    Not(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Number of comparison and predicate leaves.
    pub fn weight(&self) -> u32 {
        match self {
            Expr::Binary(op, lhs, rhs) if !op.is_comparison() => lhs.weight() + rhs.weight(),
            Expr::Binary(..) | Expr::Method(..) => 1,
            Expr::Not(inner) => inner.weight(),
            Expr::Literal(_) | Expr::Property(..) => 0,
        }
    }

    pub fn references_b(&self) -> bool {
        match self {
            Expr::Property(item, _) | Expr::Method(item, _) => *item == ItemRef::B,
            Expr::Not(inner) => inner.references_b(),
            Expr::Binary(_, lhs, rhs) => lhs.references_b() || rhs.references_b(),
            Expr::Literal(_) => false,
        }
    }
}

fn pattern(text: &str, column: usize) -> Result<TextPattern, ConditionError> {
    TextPattern::new(text).map_err(|e| ConditionError::new(format!("invalid pattern '{text}': {}", e.msg), column))
}

pub fn parse(tokens: &[Spanned], source_len: usize) -> Result<Expr, ConditionError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        end_column: source_len + 1,
    };
    if tokens.is_empty() {
        return Err(ConditionError::new("empty condition", 1));
    }
    let expr = parser.or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(extra) => Err(ConditionError::new("unexpected trailing input", extra.column)),
    }
}

struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    end_column: usize,
}

impl<'t> Parser<'t> {
    fn peek(&self) -> Option<&'t Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<&'t Spanned, ConditionError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| ConditionError::new("unexpected end of condition", self.end_column))?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek().is_some_and(|t| t.token == *expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ConditionError> {
        let token = self.next()?;
        if token.token == expected {
            Ok(())
        } else {
            Err(ConditionError::new(format!("expected {what}"), token.column))
        }
    }

    fn or(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.and()?;
        while self.eat(&Token::Or) {
            let rhs = self.and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ConditionError> {
        let mut lhs = self.unary()?;
        while self.eat(&Token::And) {
            let rhs = self.unary()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ConditionError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, ConditionError> {
        let lhs = self.primary()?;
        let op = match self.peek().map(|t| &t.token) {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.primary()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn primary(&mut self) -> Result<Expr, ConditionError> {
        let token = self.next()?;
        match &token.token {
            Token::LParen => {
                let inner = self.or()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Str(s) => Ok(Expr::Literal(Literal::Str(pattern(s, token.column)?))),
            Token::Number(q) => q
                .to_length()
                .or_else(|| q.to_angle())
                .map(|v| Expr::Literal(Literal::Num(v)))
                .ok_or_else(|| ConditionError::new("invalid unit", token.column)),
            Token::Ident(word) if word == "true" => Ok(Expr::Literal(Literal::Bool(true))),
            Token::Ident(word) if word == "false" => Ok(Expr::Literal(Literal::Bool(false))),
            Token::Ident(word) if word == "A" || word == "B" => {
                let item = if word == "A" { ItemRef::A } else { ItemRef::B };
                self.expect(Token::Dot, "'.' after item")?;
                self.accessor(item)
            }
            _ => Err(ConditionError::new("expected a value", token.column)),
        }
    }

    fn accessor(&mut self, item: ItemRef) -> Result<Expr, ConditionError> {
        let token = self.next()?;
        let Token::Ident(name) = &token.token else {
            return Err(ConditionError::new("expected a property name", token.column));
        };
        if !self.eat(&Token::LParen) {
            return Property::from_name(name)
                .map(|p| Expr::Property(item, p))
                .ok_or_else(|| ConditionError::new(format!("unknown property '{name}'"), token.column));
        }

        let mut args = Vec::new();
        if !self.eat(&Token::RParen) {
            loop {
                let arg = self.next()?;
                match &arg.token {
                    Token::Str(s) => args.push(pattern(s, arg.column)?),
                    _ => return Err(ConditionError::new("expected a string argument", arg.column)),
                }
                if self.eat(&Token::RParen) {
                    break;
                }
                self.expect(Token::Comma, "',' or ')'")?;
            }
        }

        let method = match (name.as_str(), args.as_slice()) {
            ("existsOnLayer", [layer]) => Method::ExistsOnLayer(layer.clone()),
            ("isPlated", []) => Method::IsPlated,
            ("existsOnLayer" | "isPlated", _) => {
                return Err(ConditionError::new(
                    format!("wrong number of arguments to '{name}'"),
                    token.column,
                ))
            }
            _ => return Err(ConditionError::new(format!("unknown function '{name}'"), token.column)),
        };
        Ok(Expr::Method(item, method))
    }
}

#[cfg(test)]
mod tests {
    use super::super::lexer::tokenize;
    use super::*;

    fn parse_str(src: &str) -> Result<Expr, ConditionError> {
        parse(&tokenize(src)?, src.len())
    }

    #[test]
    fn test_precedence() {
        let expr = parse_str("A.Type == 'Via' || A.Type == 'Pad' && B.NetClass == 'HV'").unwrap();
        match expr {
            Expr::Binary(BinaryOp::Or, _, rhs) => {
                assert!(matches!(*rhs, Expr::Binary(BinaryOp::And, _, _)));
            }
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_weight_and_b_reference() {
        let expr = parse_str("A.NetClass == 'HV' && !(B.Type == 'Via') && A.isPlated()").unwrap();
        assert_eq!(expr.weight(), 3);
        assert!(expr.references_b());
        assert!(!parse_str("A.Width > 0.3mm").unwrap().references_b());
    }

    #[test]
    fn test_units_normalised() {
        assert_eq!(
            parse_str("A.Width > 10mil").unwrap(),
            Expr::Binary(
                BinaryOp::Gt,
                Box::new(Expr::Property(ItemRef::A, Property::Width)),
                Box::new(Expr::Literal(Literal::Num(254_000.0)))
            )
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse_str("A.Colour == 'red'").unwrap_err().column, 3);
        assert!(parse_str("A.NetClass ==").is_err());
        assert!(parse_str("(A.NetClass == 'HV'").is_err());
        assert!(parse_str("A.existsOnLayer()").is_err());
        assert!(parse_str("A.frobnicate('x')").is_err());
        assert!(parse_str("A.Type == 'Via' 'Pad'").is_err());
        assert!(parse_str("C.Type == 'Via'").is_err());
    }

    #[test]
    fn test_bad_pattern_reported_at_literal() {
        let err = parse_str("A.NetName == 'HV[*'").unwrap_err();
        assert_eq!(err.column, 14);
        assert!(err.message.contains("invalid pattern"));
        assert!(parse_str("A.existsOnLayer('In[*')").is_err());
    }
}
