// ABOUTME: Boolean dependency expressions over task sequence numbers
// ABOUTME: Recursive-descent parser and evaluator, e.g. "(5 && 7) || 8"

use std::collections::BTreeSet;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unexpected token '{token}' at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },

    #[error("expression ended unexpectedly")]
    UnexpectedEnd,

    #[error("trailing input after expression at offset {offset}")]
    TrailingInput { offset: usize },

    #[error("empty expression")]
    Empty,
}

pub type Result<T> = std::result::Result<T, ExpressionError>;

/// Parsed dependency expression. Atoms are project sequence numbers; an atom
/// evaluates to the completion truth of the task it names. Unknown atoms
/// evaluate to `false`.
#[derive(Debug, Clone, PartialEq)]
pub enum DependencyExpr {
    Atom(i64),
    Not(Box<DependencyExpr>),
    And(Box<DependencyExpr>, Box<DependencyExpr>),
    Or(Box<DependencyExpr>, Box<DependencyExpr>),
}

impl DependencyExpr {
    pub fn parse(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ExpressionError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        match parser.peek() {
            None => Ok(expr),
            Some(tok) => Err(ExpressionError::TrailingInput { offset: tok.offset }),
        }
    }

    /// Evaluate against a completion predicate over sequence numbers.
    pub fn eval<F>(&self, is_done: &F) -> bool
    where
        F: Fn(i64) -> bool,
    {
        match self {
            DependencyExpr::Atom(seq) => is_done(*seq),
            DependencyExpr::Not(inner) => !inner.eval(is_done),
            DependencyExpr::And(lhs, rhs) => lhs.eval(is_done) && rhs.eval(is_done),
            DependencyExpr::Or(lhs, rhs) => lhs.eval(is_done) || rhs.eval(is_done),
        }
    }

    /// Every sequence number the expression mentions, deduplicated and sorted.
    pub fn referenced_sequences(&self) -> Vec<i64> {
        let mut out = BTreeSet::new();
        self.collect_sequences(&mut out);
        out.into_iter().collect()
    }

    fn collect_sequences(&self, out: &mut BTreeSet<i64>) {
        match self {
            DependencyExpr::Atom(seq) => {
                out.insert(*seq);
            }
            DependencyExpr::Not(inner) => inner.collect_sequences(out),
            DependencyExpr::And(lhs, rhs) | DependencyExpr::Or(lhs, rhs) => {
                lhs.collect_sequences(out);
                rhs.collect_sequences(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(i64),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let ch = input[i..].chars().next().unwrap_or('\0');
        match ch {
            c if c.is_whitespace() => {
                i += c.len_utf8();
            }
            '(' => {
                tokens.push(Token { kind: TokenKind::LParen, offset: i });
                i += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokenKind::RParen, offset: i });
                i += 1;
            }
            '!' => {
                tokens.push(Token { kind: TokenKind::Not, offset: i });
                i += 1;
            }
            '&' => {
                if bytes.get(i + 1) == Some(&b'&') {
                    tokens.push(Token { kind: TokenKind::And, offset: i });
                    i += 2;
                } else {
                    return Err(ExpressionError::UnexpectedChar { ch: '&', offset: i });
                }
            }
            '|' => {
                if bytes.get(i + 1) == Some(&b'|') {
                    tokens.push(Token { kind: TokenKind::Or, offset: i });
                    i += 2;
                } else {
                    return Err(ExpressionError::UnexpectedChar { ch: '|', offset: i });
                }
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let number: i64 = input[start..i]
                    .parse()
                    .map_err(|_| ExpressionError::UnexpectedChar { ch: c, offset: start })?;
                tokens.push(Token {
                    kind: TokenKind::Number(number),
                    offset: start,
                });
            }
            other => {
                return Err(ExpressionError::UnexpectedChar { ch: other, offset: i });
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<DependencyExpr> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Or)) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = DependencyExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<DependencyExpr> {
        let mut lhs = self.parse_unary()?;
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::And)) {
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = DependencyExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<DependencyExpr> {
        if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Not)) {
            self.bump();
            let inner = self.parse_unary()?;
            return Ok(DependencyExpr::Not(Box::new(inner)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<DependencyExpr> {
        match self.bump() {
            Some(Token {
                kind: TokenKind::Number(seq),
                ..
            }) => Ok(DependencyExpr::Atom(seq)),
            Some(Token {
                kind: TokenKind::LParen,
                offset,
            }) => {
                let expr = self.parse_or()?;
                match self.bump() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(expr),
                    Some(tok) => Err(ExpressionError::UnexpectedToken {
                        token: format!("{:?}", tok.kind),
                        offset: tok.offset,
                    }),
                    None => Err(ExpressionError::UnexpectedToken {
                        token: "(".to_string(),
                        offset,
                    }),
                }
            }
            Some(tok) => Err(ExpressionError::UnexpectedToken {
                token: format!("{:?}", tok.kind),
                offset: tok.offset,
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}
