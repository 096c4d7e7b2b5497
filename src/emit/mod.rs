//! Document emission
//!
//! Turns an optimized program plus its findings into a [`Document`] and
//! renders it as YAML or JSON. Output is byte-identical across runs unless
//! a compile timestamp is requested.

mod document;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ast::Program;
use crate::error::{FlowcError, Result};
use crate::findings::Finding;

pub use document::{Document, DocumentMetadata, SourceInfo, TaskEntry, TaskMetadata, VariableEntry};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = FlowcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            other => Err(FlowcError::ConfigError {
                reason: format!("unknown output format '{}' (expected yaml or json)", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitOptions {
    pub format: OutputFormat,
    /// Single-line JSON (ignored for YAML)
    pub compact: bool,
    /// Record `compiled_at`
    pub timestamp: bool,
}

/// Build and render a document in one step
pub fn emit(
    program: &Program,
    warnings: &[Finding],
    source: &SourceInfo,
    options: &EmitOptions,
) -> Result<String> {
    let compiled_at = options
        .timestamp
        .then(|| chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    let document = Document::build(program, warnings, source, compiled_at);
    render(&document, options.format, options.compact)
}

pub fn render(document: &Document, format: OutputFormat, compact: bool) -> Result<String> {
    let rendered = match format {
        OutputFormat::Yaml => serde_yaml::to_string(document).map_err(|e| e.to_string()),
        OutputFormat::Json if compact => serde_json::to_string(document).map_err(|e| e.to_string()),
        OutputFormat::Json => serde_json::to_string_pretty(document).map_err(|e| e.to_string()),
    };
    let mut text = rendered.map_err(|reason| FlowcError::Serialization {
        format: format.to_string(),
        reason,
    })?;
    if !text.ends_with('\n') {
        text.push('\n');
    }
    tracing::trace!(format = %format, bytes = text.len(), "document rendered");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::{normalize, tokenize};
    use crate::parse::parse;
    use crate::sema::analyze;
    use pretty_assertions::assert_eq;

    fn document(source: &str) -> Document {
        let normalized = normalize(source);
        let tokens = tokenize(&normalized).unwrap();
        let analysis = analyze(parse(&tokens).unwrap()).unwrap();
        let info = SourceInfo::new("test.flow", &normalized, tokens.directive_counts());
        Document::build(&analysis.program, &analysis.warnings, &info, None)
    }

    const SOURCE: &str = "@var limit = 3\n@task check\n    @tool search\n    @if limit > 2\n        @next done\n@task done\n    finish\n";

    // ═══════════════════════════════════════════════════════════════
    // DOCUMENT
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_header_fields() {
        let doc = document(SOURCE);
        assert_eq!(doc.version, "1.0");
        assert_eq!(doc.entry_point.as_deref(), Some("check"));
        assert_eq!(doc.source_files, vec!["test.flow".to_string()]);
        assert_eq!(doc.metadata.source_hash.len(), 16);
        assert!(doc.metadata.compiled_at.is_none());
    }

    #[test]
    fn test_directive_counts() {
        let doc = document(SOURCE);
        assert_eq!(doc.metadata.directive_counts[&crate::lex::DirectiveKind::Task], 2);
        assert_eq!(doc.metadata.directive_counts[&crate::lex::DirectiveKind::Var], 1);
    }

    #[test]
    fn test_next_and_dependencies() {
        let doc = document(SOURCE);
        let check = doc.task("check").unwrap();
        assert_eq!(check.next, vec!["done".to_string(), "END".to_string()]);
        assert!(check.metadata.implicit_end);
        let done = doc.task("done").unwrap();
        assert_eq!(done.dependencies, vec!["check".to_string()]);
    }

    #[test]
    fn test_variable_entry_has_type() {
        let doc = document(SOURCE);
        assert_eq!(doc.variables[0].ty, Some(crate::ast::ValueType::Integer));
    }

    // ═══════════════════════════════════════════════════════════════
    // RENDERING
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_yaml_contains_tagged_body_items() {
        let text = render(&document(SOURCE), OutputFormat::Yaml, false).unwrap();
        assert!(text.contains("type: tool_call"));
        assert!(text.contains("type: conditional"));
        assert!(text.contains("version: '1.0'") || text.contains("version: \"1.0\""));
    }

    #[test]
    fn test_json_round_trips_as_value() {
        let text = render(&document(SOURCE), OutputFormat::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["tasks"][0]["id"], "check");
        assert_eq!(value["variables"][0]["type"], "integer");
        assert_eq!(value["variables"][0]["value"], 3);
    }

    #[test]
    fn test_compact_json_is_one_line() {
        let text = render(&document(SOURCE), OutputFormat::Json, true).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_output_is_deterministic() {
        let a = render(&document(SOURCE), OutputFormat::Yaml, false).unwrap();
        let b = render(&document(SOURCE), OutputFormat::Yaml, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("YML".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("toml".parse::<OutputFormat>().is_err());
    }
}
