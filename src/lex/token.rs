//! Token types produced by the lexer

use std::fmt;
use std::slice;

use serde::Serialize;

use crate::util::constants::SIGIL;

/// Closed set of directive keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectiveKind {
    Var,
    Task,
    Tool,
    Agent,
    If,
    Else,
    Next,
    Lang,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 8] = [
        DirectiveKind::Var,
        DirectiveKind::Task,
        DirectiveKind::Tool,
        DirectiveKind::Agent,
        DirectiveKind::If,
        DirectiveKind::Else,
        DirectiveKind::Next,
        DirectiveKind::Lang,
    ];

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "var" => Some(Self::Var),
            "task" => Some(Self::Task),
            "tool" => Some(Self::Tool),
            "agent" => Some(Self::Agent),
            "if" => Some(Self::If),
            "else" => Some(Self::Else),
            "next" => Some(Self::Next),
            "lang" => Some(Self::Lang),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Var => "var",
            Self::Task => "task",
            Self::Tool => "tool",
            Self::Agent => "agent",
            Self::If => "if",
            Self::Else => "else",
            Self::Next => "next",
            Self::Lang => "lang",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SIGIL, self.keyword())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Directive(DirectiveKind),
    Text,
    /// Opening or closing ``` of a code block; lines between are raw TEXT
    Fence,
    Indent,
    Dedent,
}

/// One lexical unit.
///
/// `text` is the line content without its indentation; empty for
/// INDENT/DEDENT. `depth` is the number of open blocks after the token,
/// `column` the indentation width of the source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub depth: usize,
    pub column: usize,
}

impl Token {
    /// Directive arguments: everything after `@keyword`, trimmed
    pub fn args(&self) -> &str {
        match self.kind {
            TokenKind::Directive(kind) => self
                .text
                .get(1 + kind.keyword().len()..)
                .map_or("", str::trim),
            _ => "",
        }
    }

    /// Language of an opening fence (```` ```python ```` gives `python`)
    pub fn fence_lang(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Fence => self
                .text
                .trim_start_matches('`')
                .split_whitespace()
                .next(),
            _ => None,
        }
    }

    pub fn directive(&self) -> Option<DirectiveKind> {
        match self.kind {
            TokenKind::Directive(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Directive(kind) => {
                write!(f, "{:>4}  DIRECTIVE {:<7} {}", self.line, kind, self.args())
            }
            TokenKind::Text => write!(f, "{:>4}  TEXT      {}", self.line, self.text),
            TokenKind::Fence => write!(f, "{:>4}  FENCE     {}", self.line, self.text),
            TokenKind::Indent => write!(f, "{:>4}  INDENT    depth={}", self.line, self.depth),
            TokenKind::Dedent => write!(f, "{:>4}  DEDENT    depth={}", self.line, self.depth),
        }
    }
}

/// Finite token sequence; iterate it as many times as needed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub(crate) fn new(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn iter(&self) -> slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    pub fn as_slice(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Number of directive tokens per kind
    pub fn directive_counts(&self) -> std::collections::BTreeMap<DirectiveKind, usize> {
        let mut counts = std::collections::BTreeMap::new();
        for kind in self.tokens.iter().filter_map(Token::directive) {
            *counts.entry(kind).or_insert(0) += 1;
        }
        counts
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = &'a Token;
    type IntoIter = slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}
