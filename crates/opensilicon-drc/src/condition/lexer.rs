use crate::units::{parse_quantity, Quantity};

use super::ConditionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Number(Quantity),
    Dot,
    Comma,
    LParen,
    RParen,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A token and the 1-based column it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub column: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ConditionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let column = i + 1;
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, len) = match c {
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            ',' => (Token::Comma, 1),
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => (Token::Dot, 1),
            '&' if next == Some('&') => (Token::And, 2),
            '|' if next == Some('|') => (Token::Or, 2),
            '=' if next == Some('=') => (Token::Eq, 2),
            '!' if next == Some('=') => (Token::Ne, 2),
            '!' => (Token::Not, 1),
            '<' if next == Some('=') => (Token::Le, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::Ge, 2),
            '>' => (Token::Gt, 1),
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| ConditionError::new("unterminated string", column))?;
                let text: String = chars[i + 1..i + 1 + end].iter().collect();
                (Token::Str(text), end + 2)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let len = chars[i..]
                    .iter()
                    .take_while(|ch| ch.is_ascii_alphanumeric() || **ch == '.')
                    .count();
                let text: String = chars[i..i + len].iter().collect();
                let quantity = parse_quantity(&text)
                    .ok_or_else(|| ConditionError::new(format!("invalid number '{text}'"), column))?;
                (Token::Number(quantity), len)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let len = chars[i..]
                    .iter()
                    .take_while(|ch| ch.is_ascii_alphanumeric() || **ch == '_')
                    .count();
                (Token::Ident(chars[i..i + len].iter().collect()), len)
            }
            other => {
                return Err(ConditionError::new(format!("unexpected character '{other}'"), column));
            }
        };
        tokens.push(Spanned { token, column });
        i += len;
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_accessor_and_string() {
        assert_eq!(
            kinds("A.NetClass == 'HV'"),
            vec![
                Token::Ident("A".into()),
                Token::Dot,
                Token::Ident("NetClass".into()),
                Token::Eq,
                Token::Str("HV".into()),
            ]
        );
    }

    #[test]
    fn test_number_with_unit() {
        assert_eq!(
            kinds("A.Width < 0.2mm"),
            vec![
                Token::Ident("A".into()),
                Token::Dot,
                Token::Ident("Width".into()),
                Token::Lt,
                Token::Number(Quantity {
                    value: 0.2,
                    unit: Some(Unit::Mm)
                }),
            ]
        );
    }

    #[test]
    fn test_errors_carry_column() {
        let err = tokenize("A.Width = 1").unwrap_err();
        assert_eq!(err.column, 9);
        let err = tokenize("A.NetName == 'GND").unwrap_err();
        assert_eq!(err.column, 14);
        assert!(tokenize("A.Width < 1parsec").is_err());
    }
}
