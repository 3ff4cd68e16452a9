//! Tokenizer for condition text.

use std::fmt;

use super::ast::CmpOp;
use super::error::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    LParen,
    RParen,
    Comma,
    Minus,
    Cmp(CmpOp),
    And,
    Or,
    Not,
    Is,
    In,
    Missing,
    Nocase,
    True,
    False,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(name) => write!(f, "{}", name),
            TokenKind::Number(n) => write!(f, "{}", n),
            TokenKind::Str(s) => write!(f, "\"{}\"", s),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Cmp(op) => write!(f, "{}", op),
            TokenKind::And => write!(f, "AND"),
            TokenKind::Or => write!(f, "OR"),
            TokenKind::Not => write!(f, "NOT"),
            TokenKind::Is => write!(f, "IS"),
            TokenKind::In => write!(f, "IN"),
            TokenKind::Missing => write!(f, "MISSING"),
            TokenKind::Nocase => write!(f, "NOCASE"),
            TokenKind::True => write!(f, "TRUE"),
            TokenKind::False => write!(f, "FALSE"),
            TokenKind::Eof => write!(f, "end of condition"),
        }
    }
}

/// Characters that may start an operator. Runs of these that do not form a
/// known comparison are reported as unknown operators.
fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '=' | '!' | '<' | '>' | '+' | '*' | '/' | '&' | '|' | '~' | '%' | '^' | ':' | ';'
    )
}

fn keyword(word: &str) -> Option<TokenKind> {
    match word.to_ascii_uppercase().as_str() {
        "AND" => Some(TokenKind::And),
        "OR" => Some(TokenKind::Or),
        "NOT" => Some(TokenKind::Not),
        "IS" => Some(TokenKind::Is),
        "IN" => Some(TokenKind::In),
        "MISSING" | "BLANK" => Some(TokenKind::Missing),
        "NOCASE" => Some(TokenKind::Nocase),
        "TRUE" => Some(TokenKind::True),
        "FALSE" => Some(TokenKind::False),
        _ => None,
    }
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let single = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            ',' => Some(TokenKind::Comma),
            '-' => Some(TokenKind::Minus),
            _ => None,
        };
        if let Some(kind) = single {
            tokens.push(Token { kind, offset });
            i += 1;
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            let mut text = String::new();
            let mut closed = false;
            i += 1;
            while i < chars.len() {
                let (_, ch) = chars[i];
                if ch == '\\' && i + 1 < chars.len() {
                    text.push(chars[i + 1].1);
                    i += 2;
                    continue;
                }
                if ch == quote {
                    closed = true;
                    i += 1;
                    break;
                }
                text.push(ch);
                i += 1;
            }
            if !closed {
                return Err(ParseError::at(ParseErrorKind::UnterminatedString, offset));
            }
            tokens.push(Token {
                kind: TokenKind::Str(text),
                offset,
            });
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_digit())) {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '.') {
                i += 1;
            }
            let raw: String = chars[start..i].iter().map(|(_, ch)| ch).collect();
            let value = raw
                .parse::<f64>()
                .map_err(|_| ParseError::at(ParseErrorKind::InvalidNumber(raw.clone()), offset))?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                offset,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                i += 1;
            }
            let word: String = chars[start..i].iter().map(|(_, ch)| ch).collect();
            let kind = keyword(&word).unwrap_or(TokenKind::Ident(word));
            tokens.push(Token { kind, offset });
            continue;
        }

        if is_operator_char(c) {
            let start = i;
            while i < chars.len() && is_operator_char(chars[i].1) {
                i += 1;
            }
            let op: String = chars[start..i].iter().map(|(_, ch)| ch).collect();
            let cmp = match op.as_str() {
                "=" | "==" => CmpOp::Eq,
                "!=" | "<>" => CmpOp::Ne,
                "<" => CmpOp::Lt,
                "<=" => CmpOp::Le,
                ">" => CmpOp::Gt,
                ">=" => CmpOp::Ge,
                _ => return Err(ParseError::at(ParseErrorKind::UnknownOperator(op), offset)),
            };
            tokens.push(Token {
                kind: TokenKind::Cmp(cmp),
                offset,
            });
            continue;
        }

        return Err(ParseError::at(
            ParseErrorKind::UnexpectedToken(c.to_string()),
            offset,
        ));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: input.len(),
    });
    Ok(tokens)
}
