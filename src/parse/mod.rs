//! Parse Module - recursive descent from tokens to [`Program`]
//!
//! - `parser`: top level, task bodies, conditionals
//! - `args`: directive argument forms (`@var`, `@tool`, `@agent`, ...)
//!
//! [`Program`]: crate::ast::Program

mod args;
mod parser;

pub use parser::{parse, parse_source, Parser};
