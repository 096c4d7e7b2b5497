//! AST Module - declarative tree built by the parser
//!
//! Contains the workflow program types:
//! - `program`: Program, VariableDecl, TaskDecl, BodyItem, Branch, CodeBlock
//! - `literal`: Literal, ValueType and literal-shape inference
//!
//! These types represent the "what": the static structure of a source file.
//! The parser creates them, the analyzer annotates variables, and the
//! optimizer rewrites clones of them.

mod literal;
mod program;

pub use literal::{Literal, LiteralError, ValueType};
pub use program::{
    default_title, body_falls_through, AgentCall, AgentParam, BodyItem, Branch, CallableDecl,
    CallableKind, CodeBlock, Conditional, EntryOverride, Jump, LangTag, Program, Scope, TaskDecl, TextLine,
    ToolCall, VariableDecl,
};
