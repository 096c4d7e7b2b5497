//! flowc - compiler for indentation-sensitive task workflow scripts
//!
//! ```text
//! ┌────────────┐   ┌───────┐   ┌───────┐   ┌──────┐   ┌─────────┐
//! │ normalize  │ → │  lex  │ → │ parse │ → │ sema │ → │ augment │ (optional, async)
//! └────────────┘   └───────┘   └───────┘   └──────┘   └─────────┘
//!                                                           │
//!                  ┌──────┐   ┌──────────┐   ┌─────┐        │
//!                  │ emit │ ← │ optimize │ ← │ dag │ ←──────┘
//!                  └──────┘   └──────────┘   └─────┘
//! ```
//!
//! - `lex` / `parse` / `sema`: fail fast with one primary error
//! - `dag`: workflow graph plus validation findings (errors abort)
//! - `optimize`: dead-code elimination, constant folding, compaction, dedup
//! - `emit`: YAML/JSON documents
//! - `pipeline`: one [`Compiler`] per configuration, many units in parallel

// ═══════════════════════════════════════════
// CORE
// ═══════════════════════════════════════════
pub mod ast;
pub mod dag;
pub mod lex;
pub mod optimize;
pub mod parse;
pub mod sema;

// ═══════════════════════════════════════════
// EDGES
// ═══════════════════════════════════════════
pub mod augment;
pub mod emit;
pub mod pipeline;

// ═══════════════════════════════════════════
// SUPPORT
// ═══════════════════════════════════════════
pub mod config;
pub mod error;
pub mod findings;
pub mod util;

pub use ast::{BodyItem, Program, TaskDecl, VariableDecl};
pub use config::FlowcConfig;
pub use emit::{Document, EmitOptions, OutputFormat};
pub use error::{ErrorCategory, FixSuggestion, FlowcError, Result};
pub use findings::{Finding, FindingKind, Severity, ValidationReport};
pub use pipeline::{Compilation, Compiler};
