//! Named trace quantities and the ratio-expression evaluator.
//!
//! Ratio assertions reference quantities by name:
//! `<body_id>.<field>_<initial|final>` with field in {x, y, theta, vx, vy,
//! omega, speed}, and `energy.<Ek|Ep|Em>_<initial|final>`. Expressions
//! support `+ - * /`, unary minus, parentheses, `abs(...)`, and numeric
//! literals.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::sim::{Sample, Trace};
use crate::world::Scene;

/// Expression evaluation failure (a hard error on the assertion).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("parse error in ratio expression: {0}")]
    Parse(String),

    #[error("unknown quantity `{0}`")]
    UnknownQuantity(String),

    #[error("division by zero in ratio expression")]
    DivisionByZero,

    #[error("ratio expression evaluated to a non-finite value")]
    NonFinite,
}

/// Build the quantity lookup table from the first and last samples.
pub fn quantity_table(scene: &Scene, trace: &Trace) -> BTreeMap<String, f64> {
    let mut table = BTreeMap::new();
    let (Some(first), Some(last)) = (trace.samples.first(), trace.samples.last()) else {
        return table;
    };

    let mut insert_sample = |sample: &Sample, suffix: &str| {
        for (i, body) in scene.bodies.iter().enumerate() {
            let b = &sample.bodies[i];
            let speed = (b.vx * b.vx + b.vy * b.vy).sqrt();
            for (field, value) in [
                ("x", b.x),
                ("y", b.y),
                ("theta", b.theta),
                ("vx", b.vx),
                ("vy", b.vy),
                ("omega", b.omega),
                ("speed", speed),
            ] {
                table.insert(format!("{}.{}_{}", body.id, field, suffix), value);
            }
        }
        for (field, value) in [
            ("Ek", sample.energy.kinetic),
            ("Ep", sample.energy.potential),
            ("Em", sample.energy.total),
        ] {
            table.insert(format!("energy.{}_{}", field, suffix), value);
        }
    };

    insert_sample(first, "initial");
    insert_sample(last, "final");
    table
}

/// Evaluate an arithmetic expression over the quantity table.
pub fn eval_expr(expr: &str, table: &BTreeMap<String, f64>) -> Result<f64, ExprError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        table,
    };
    let value = parser.expression()?;
    if parser.pos != tokens.len() {
        return Err(ExprError::Parse(format!(
            "unexpected trailing input at token {}",
            parser.pos
        )));
    }
    if !value.is_finite() {
        return Err(ExprError::NonFinite);
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let bytes: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_digit()
                        || bytes[i] == '.'
                        || bytes[i] == 'e'
                        || bytes[i] == 'E'
                        || ((bytes[i] == '+' || bytes[i] == '-')
                            && i > start
                            && (bytes[i - 1] == 'e' || bytes[i - 1] == 'E')))
                {
                    i += 1;
                }
                let text: String = bytes[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::Parse(format!("bad number `{text}`")))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == '_' || bytes[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(bytes[start..i].iter().collect()));
            }
            other => return Err(ExprError::Parse(format!("unexpected character `{other}`"))),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    table: &'a BTreeMap<String, f64>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expression(&mut self) -> Result<f64, ExprError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Token::Minus => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ExprError> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.pos += 1;
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.pos += 1;
                    let rhs = self.factor()?;
                    if rhs.abs() < 1e-300 {
                        return Err(ExprError::DivisionByZero);
                    }
                    value /= rhs;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, ExprError> {
        match self.advance() {
            Some(Token::Minus) => Ok(-self.factor()?),
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let v = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(v),
                    _ => Err(ExprError::Parse("expected `)`".into())),
                }
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    if name != "abs" {
                        return Err(ExprError::Parse(format!("unknown function `{name}`")));
                    }
                    self.pos += 1;
                    let v = self.expression()?;
                    match self.advance() {
                        Some(Token::RParen) => Ok(v.abs()),
                        _ => Err(ExprError::Parse("expected `)` after abs".into())),
                    }
                } else {
                    self.table
                        .get(&name)
                        .copied()
                        .ok_or(ExprError::UnknownQuantity(name))
                }
            }
            other => Err(ExprError::Parse(format!("unexpected token {other:?}"))),
        }
    }
}
