//! Variable literals and their inferred types
//!
//! Inference order: integer, float, boolean, quoted string, bare string.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Integer,
    Float,
    Boolean,
    String,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("missing value")]
    Empty,
    #[error("unterminated quoted string")]
    UnterminatedQuote,
    #[error("integer '{0}' is out of range")]
    IntegerOutOfRange(String),
}

/// A compile-time known value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl Literal {
    /// Infer a literal from its source text
    pub fn infer(raw: &str) -> Result<Self, LiteralError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(LiteralError::Empty);
        }

        if is_integer_shape(raw) {
            return raw
                .parse::<i64>()
                .map(Literal::Integer)
                .map_err(|_| LiteralError::IntegerOutOfRange(raw.to_string()));
        }
        if is_float_shape(raw) {
            if let Ok(value) = raw.parse::<f64>() {
                return Ok(Literal::Float(value));
            }
        }
        if raw.eq_ignore_ascii_case("true") {
            return Ok(Literal::Boolean(true));
        }
        if raw.eq_ignore_ascii_case("false") {
            return Ok(Literal::Boolean(false));
        }

        if let Some(quote) = raw.chars().next().filter(|c| *c == '"' || *c == '\'') {
            return match raw[1..].strip_suffix(quote) {
                Some(inner) => Ok(Literal::String(inner.to_string())),
                None => Err(LiteralError::UnterminatedQuote),
            };
        }

        Ok(Literal::String(raw.to_string()))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Integer(_) => ValueType::Integer,
            Literal::Float(_) => ValueType::Float,
            Literal::Boolean(_) => ValueType::Boolean,
            Literal::String(_) => ValueType::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Integer(i) => Some(*i as f64),
            Literal::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Ordering between comparable literals; `None` on a type mismatch.
    ///
    /// Integers and floats compare numerically, strings lexicographically.
    pub fn compare(&self, other: &Literal) -> Option<Ordering> {
        match (self, other) {
            (Literal::Integer(a), Literal::Integer(b)) => Some(a.cmp(b)),
            (Literal::String(a), Literal::String(b)) => Some(a.cmp(b)),
            (Literal::Boolean(a), Literal::Boolean(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::String(s) => f.write_str(s),
        }
    }
}

fn is_integer_shape(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Digits with a decimal point and/or exponent; rejects `inf`, `NaN` and friends
fn is_float_shape(raw: &str) -> bool {
    let body = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };

    let mut parts = mantissa.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let frac = parts.next();
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = match frac {
        Some(frac) => {
            (!whole.is_empty() || !frac.is_empty()) && all_digits(whole) && all_digits(frac)
        }
        None => !whole.is_empty() && all_digits(whole),
    };
    let exponent_ok = match exponent {
        Some(exp) => is_integer_shape(exp),
        None => frac.is_some(),
    };
    mantissa_ok && exponent_ok
}
