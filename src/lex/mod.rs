//! Lex Module - source normalization and tokenization
//!
//! - `normalize`: BOM, line endings, tabs, trailing whitespace
//! - `token`: Token, TokenKind, DirectiveKind, TokenStream
//! - `lexer`: indentation-aware line lexer

mod lexer;
mod normalize;
mod token;

pub use lexer::{tokenize, Lexer};
pub use normalize::normalize;
pub use token::{DirectiveKind, Token, TokenKind, TokenStream};
