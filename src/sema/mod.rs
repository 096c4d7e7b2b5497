//! Sema Module - semantic analysis
//!
//! - `symbols`: SymbolTable (variables, tasks, tool/agent registry)
//! - `interpolation`: `{{name}}` placeholder scanning
//! - `analyzer`: literal inference, uniqueness, reference resolution
//!
//! Condition identifiers are runtime predicates and are never resolved
//! here; only `{{name}}` placeholders inside conditions are.

mod analyzer;
pub mod interpolation;
mod symbols;

pub use analyzer::{analyze, Analysis};
pub use symbols::SymbolTable;
