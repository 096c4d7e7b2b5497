//! Static evaluation of branch conditions
//!
//! Grammar (anything else is opaque):
//!
//! ```text
//! or      := and (("OR" | "or" | "||") and)*
//! and     := not (("AND" | "and" | "&&") not)*
//! not     := ("NOT" | "not" | "!") not | cmp
//! cmp     := operand (("==" | "!=" | "<" | "<=" | ">" | ">=") operand)?
//! operand := integer | float | "string" | true | false
//!          | identifier ("." identifier)* | "{{" name "}}" | "(" or ")"
//! ```
//!
//! Evaluation is strict: both sides of `AND`/`OR` must be known, so a
//! condition either folds as a whole or not at all.

use std::cmp::Ordering;

use rustc_hash::FxHashMap;

use crate::ast::Literal;

/// Declared variables with a known value
pub type Bindings<'a> = FxHashMap<&'a str, &'a Literal>;

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(Literal),
    Str(String),
    Bool(bool),
    Ident(String),
    Placeholder(String),
    Open,
    Close,
    Not,
    And,
    Or,
    Cmp(CmpOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Cmp(Box<Expr>, CmpOp, Box<Expr>),
    Value(Literal),
    /// Plain or `{{}}` variable reference
    Var(String),
    /// `user.name`: bound at runtime, never foldable
    Path,
}

/// Evaluate a condition, `None` when it cannot be decided statically
pub fn evaluate(condition: &str, bindings: &Bindings<'_>) -> Option<bool> {
    let tokens = lex(condition)?;
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.or()?;
    if parser.pos != parser.tokens.len() {
        return None;
    }
    eval(&expr, bindings)?.as_bool()
}

// ═══════════════════════════════════════════════════════════════
// LEXING
// ═══════════════════════════════════════════════════════════════

fn lex(input: &str) -> Option<Vec<Tok>> {
    let mut tokens = Vec::new();
    let mut rest = input.trim_start();

    while let Some(c) = rest.chars().next() {
        let (tok, len) = if let Some(after) = rest.strip_prefix("{{") {
            let end = after.find("}}")?;
            let name = after[..end].trim();
            (Tok::Placeholder(name.to_string()), end + 4)
        } else if let Some((op, len)) = symbol(rest) {
            (op, len)
        } else if c == '"' || c == '\'' {
            let end = rest[1..].find(c)?;
            (Tok::Str(rest[1..1 + end].to_string()), end + 2)
        } else if c.is_ascii_digit() || (c == '-' && rest[1..].starts_with(|d: char| d.is_ascii_digit())) {
            let len = 1 + rest[1..]
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '.' || ch == '_'))
                .unwrap_or(rest.len() - 1);
            match Literal::infer(&rest[..len]).ok()? {
                lit @ (Literal::Integer(_) | Literal::Float(_)) => (Tok::Num(lit), len),
                _ => return None,
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let len = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'))
                .unwrap_or(rest.len());
            (word(&rest[..len]), len)
        } else {
            return None;
        };

        tokens.push(tok);
        rest = rest[len..].trim_start();
    }
    Some(tokens)
}

fn symbol(rest: &str) -> Option<(Tok, usize)> {
    const TWO: [(&str, Tok); 6] = [
        ("==", Tok::Cmp(CmpOp::Eq)),
        ("!=", Tok::Cmp(CmpOp::Ne)),
        ("<=", Tok::Cmp(CmpOp::Le)),
        (">=", Tok::Cmp(CmpOp::Ge)),
        ("&&", Tok::And),
        ("||", Tok::Or),
    ];
    for (text, tok) in TWO {
        if rest.starts_with(text) {
            return Some((tok, 2));
        }
    }
    let tok = match rest.as_bytes().first()? {
        b'<' => Tok::Cmp(CmpOp::Lt),
        b'>' => Tok::Cmp(CmpOp::Gt),
        b'!' => Tok::Not,
        b'(' => Tok::Open,
        b')' => Tok::Close,
        _ => return None,
    };
    Some((tok, 1))
}

fn word(text: &str) -> Tok {
    match text {
        "AND" | "and" => Tok::And,
        "OR" | "or" => Tok::Or,
        "NOT" | "not" => Tok::Not,
        _ if text.eq_ignore_ascii_case("true") => Tok::Bool(true),
        _ if text.eq_ignore_ascii_case("false") => Tok::Bool(false),
        _ => Tok::Ident(text.to_string()),
    }
}

// ═══════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════

struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn or(&mut self) -> Option<Expr> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Tok::Or) {
            self.pos += 1;
            lhs = Expr::Or(Box::new(lhs), Box::new(self.and()?));
        }
        Some(lhs)
    }

    fn and(&mut self) -> Option<Expr> {
        let mut lhs = self.not()?;
        while self.peek() == Some(&Tok::And) {
            self.pos += 1;
            lhs = Expr::And(Box::new(lhs), Box::new(self.not()?));
        }
        Some(lhs)
    }

    fn not(&mut self) -> Option<Expr> {
        if self.peek() == Some(&Tok::Not) {
            self.pos += 1;
            return Some(Expr::Not(Box::new(self.not()?)));
        }
        self.cmp()
    }

    fn cmp(&mut self) -> Option<Expr> {
        let lhs = self.operand()?;
        if let Some(Tok::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.operand()?;
            return Some(Expr::Cmp(Box::new(lhs), op, Box::new(rhs)));
        }
        Some(lhs)
    }

    fn operand(&mut self) -> Option<Expr> {
        let expr = match self.bump()? {
            Tok::Num(lit) => Expr::Value(lit),
            Tok::Str(s) => Expr::Value(Literal::String(s)),
            Tok::Bool(b) => Expr::Value(Literal::Boolean(b)),
            Tok::Ident(name) if name.contains('.') => Expr::Path,
            Tok::Ident(name) | Tok::Placeholder(name) => Expr::Var(name),
            Tok::Open => {
                let inner = self.or()?;
                if self.bump()? != Tok::Close {
                    return None;
                }
                inner
            }
            _ => return None,
        };
        Some(expr)
    }
}

// ═══════════════════════════════════════════════════════════════
// EVALUATION
// ═══════════════════════════════════════════════════════════════

fn eval(expr: &Expr, bindings: &Bindings<'_>) -> Option<Literal> {
    let value = match expr {
        Expr::Or(a, b) => {
            let (a, b) = (truth(a, bindings)?, truth(b, bindings)?);
            Literal::Boolean(a || b)
        }
        Expr::And(a, b) => {
            let (a, b) = (truth(a, bindings)?, truth(b, bindings)?);
            Literal::Boolean(a && b)
        }
        Expr::Not(inner) => Literal::Boolean(!truth(inner, bindings)?),
        Expr::Cmp(a, op, b) => {
            let (a, b) = (eval(a, bindings)?, eval(b, bindings)?);
            Literal::Boolean(compare(&a, *op, &b)?)
        }
        Expr::Value(lit) => lit.clone(),
        Expr::Var(name) => (*bindings.get(name.as_str())?).clone(),
        Expr::Path => return None,
    };
    Some(value)
}

fn truth(expr: &Expr, bindings: &Bindings<'_>) -> Option<bool> {
    eval(expr, bindings)?.as_bool()
}

fn compare(a: &Literal, op: CmpOp, b: &Literal) -> Option<bool> {
    if matches!(a, Literal::Boolean(_)) && !matches!(op, CmpOp::Eq | CmpOp::Ne) {
        return None;
    }
    a.compare(b).map(|ordering| op.holds(ordering))
}
