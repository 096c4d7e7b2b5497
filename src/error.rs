// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Flowc Error Types with Error Codes
//!
//! Error code ranges:
//! - FLOWC-001-019: Lexical errors
//! - FLOWC-020-039: Structural (parse) errors
//! - FLOWC-040-059: Semantic errors
//! - FLOWC-060-079: Validation errors
//! - FLOWC-090-099: Internal (optimizer) defects
//! - FLOWC-100-109: Augmentation errors
//! - FLOWC-110-119: Config and I/O errors

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::findings::ValidationReport;

pub type Result<T> = std::result::Result<T, FlowcError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Taxonomy class of an error, used for reporting and exit handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lexical,
    Structural,
    Semantic,
    Validation,
    Internal,
    Augmentation,
    Config,
    Io,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Lexical => "lexical",
            ErrorCategory::Structural => "structural",
            ErrorCategory::Semantic => "semantic",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Internal => "internal",
            ErrorCategory::Augmentation => "augmentation",
            ErrorCategory::Config => "config",
            ErrorCategory::Io => "io",
        };
        f.write_str(name)
    }
}

/// All error variants are part of the public API.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Diagnostic)]
#[diagnostic(url(docsrs))]
pub enum FlowcError {
    // ═══════════════════════════════════════════
    // LEXICAL ERRORS (001-019)
    // ═══════════════════════════════════════════
    #[error("[FLOWC-001] Unknown directive '@{keyword}' at line {line}")]
    #[diagnostic(
        code(flowc::unknown_directive),
        help("Directives are @var, @task, @tool, @agent, @if, @else, @next and @lang")
    )]
    UnknownDirective { keyword: String, line: usize },

    #[error("[FLOWC-002] Inconsistent indentation at line {line}: width {width} matches no open block ({open})")]
    #[diagnostic(
        code(flowc::inconsistent_indentation),
        help("Dedent back to the exact column of an enclosing block")
    )]
    InconsistentIndentation {
        line: usize,
        width: usize,
        open: String,
    },

    #[error("[FLOWC-003] Code block opened at line {line} is never closed")]
    #[diagnostic(
        code(flowc::unterminated_code_block),
        help("Close the block with a line containing only ```")
    )]
    UnterminatedCodeBlock { line: usize },

    // ═══════════════════════════════════════════
    // STRUCTURAL ERRORS (020-039)
    // ═══════════════════════════════════════════
    #[error("[FLOWC-020] '@{directive}' at line {line} must appear inside a task")]
    #[diagnostic(
        code(flowc::directive_outside_task),
        help("Move the directive into the body of a @task block")
    )]
    DirectiveOutsideTask { directive: String, line: usize },

    #[error("[FLOWC-021] Malformed arguments for '@{directive}' at line {line}: {reason}")]
    #[diagnostic(code(flowc::malformed_arguments))]
    MalformedArguments {
        directive: String,
        line: usize,
        reason: String,
    },

    #[error("[FLOWC-022] '@else' at line {line} has no preceding '@if'")]
    #[diagnostic(
        code(flowc::orphan_else),
        help("Place @else directly after an @if block at the same indentation")
    )]
    OrphanElse { line: usize },

    #[error("[FLOWC-023] Second '@else' at line {line} for the '@if' at line {if_line}")]
    #[diagnostic(
        code(flowc::duplicate_else),
        help("Each @if takes at most one @else; there is no else-if chaining")
    )]
    DuplicateElse { line: usize, if_line: usize },

    #[error("[FLOWC-024] Second '@lang' at line {line} (first at line {first_line})")]
    #[diagnostic(code(flowc::duplicate_lang), help("Keep a single @lang tag per file"))]
    DuplicateLang { line: usize, first_line: usize },

    #[error("[FLOWC-025] Second entry override at line {line} (first at line {first_line})")]
    #[diagnostic(
        code(flowc::duplicate_entry),
        help("Only one top-level @next may select the entry task")
    )]
    DuplicateEntryOverride { line: usize, first_line: usize },

    #[error("[FLOWC-026] Unexpected indentation at line {line}")]
    #[diagnostic(
        code(flowc::unexpected_indent),
        help("Only task bodies and @if/@else branches open indented blocks")
    )]
    UnexpectedIndent { line: usize },

    #[error("[FLOWC-027] Entry override at line {line} must precede the first '@task'")]
    #[diagnostic(
        code(flowc::misplaced_entry),
        help("Move the top-level @next above the first @task")
    )]
    MisplacedEntryOverride { line: usize },

    #[error("[FLOWC-028] '@{directive}' at line {line} is only allowed at top level")]
    #[diagnostic(
        code(flowc::top_level_only),
        help("Start @task and @lang lines at column 0")
    )]
    TopLevelOnly { directive: String, line: usize },

    // ═══════════════════════════════════════════
    // SEMANTIC ERRORS (040-059)
    // ═══════════════════════════════════════════
    #[error("[FLOWC-040] Variable '{name}' at line {line} already declared at line {first_line}")]
    #[diagnostic(
        code(flowc::duplicate_variable),
        help("Rename one of the variables or remove the redeclaration")
    )]
    DuplicateVariable {
        name: String,
        line: usize,
        first_line: usize,
    },

    #[error("[FLOWC-041] Task '{id}' at line {line} already declared at line {first_line}")]
    #[diagnostic(code(flowc::duplicate_task), help("Task ids must be unique"))]
    DuplicateTask {
        id: String,
        line: usize,
        first_line: usize,
    },

    #[error("[FLOWC-042] Undeclared variable '{{{{{name}}}}}' at line {line}")]
    #[diagnostic(
        code(flowc::undeclared_variable),
        help("Declare it with '@var name = value' or fix the placeholder name")
    )]
    UndeclaredVariableReference { name: String, line: usize },

    #[error("[FLOWC-043] Invalid literal for variable '{name}' at line {line}: {reason}")]
    #[diagnostic(
        code(flowc::invalid_literal),
        help("Use an integer, float, true/false or a quoted string")
    )]
    InvalidLiteral {
        name: String,
        line: usize,
        reason: String,
    },

    #[error("[FLOWC-044] Task id '{id}' at line {line} is reserved for the terminal marker")]
    #[diagnostic(
        code(flowc::reserved_task_id),
        help("Pick another id; '@next END' already ends the workflow")
    )]
    ReservedTaskId { id: String, line: usize },

    // ═══════════════════════════════════════════
    // VALIDATION ERRORS (060-079)
    // ═══════════════════════════════════════════
    #[error("[FLOWC-060] Workflow validation failed: {}", .report.summary())]
    #[diagnostic(
        code(flowc::validation_failed),
        help("Fix the listed jump targets and flow paths")
    )]
    Validation { report: ValidationReport },

    // ═══════════════════════════════════════════
    // INTERNAL DEFECTS (090-099)
    // ═══════════════════════════════════════════
    #[error("[FLOWC-090] Internal optimizer defect in {pass}: {reason}")]
    #[diagnostic(
        code(flowc::internal),
        help("This is a compiler bug, not an input error. Please report it with the source file")
    )]
    Internal { pass: String, reason: String },

    // ═══════════════════════════════════════════
    // AUGMENTATION ERRORS (100-109)
    // ═══════════════════════════════════════════
    #[error("[FLOWC-100] Augmentation failed: {reason}")]
    #[diagnostic(code(flowc::augmentation_failed))]
    AugmentationFailed { reason: String },

    #[error("[FLOWC-101] Augmentation timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(flowc::augmentation_timeout),
        help("Raise augment.timeout_secs or disable augmentation")
    )]
    AugmentationTimeout { timeout_ms: u64 },

    #[error("[FLOWC-102] Augmentation cancelled")]
    #[diagnostic(code(flowc::augmentation_cancelled))]
    AugmentationCancelled,

    #[error("[FLOWC-103] Augmentation returned an unusable fragment: {reason}")]
    #[diagnostic(code(flowc::augmentation_malformed))]
    AugmentationMalformed { reason: String },

    #[error("[FLOWC-104] Augmentation service error ({status}): {reason}")]
    #[diagnostic(
        code(flowc::augmentation_http),
        help("Check augment.endpoint, augment.model and the API key")
    )]
    AugmentationHttp { status: u16, reason: String },

    // ═══════════════════════════════════════════
    // CONFIG & IO ERRORS (110-119)
    // ═══════════════════════════════════════════
    #[error("[FLOWC-110] Configuration error: {reason}")]
    #[diagnostic(
        code(flowc::config_error),
        help("Check ~/.config/flowc/config.toml for syntax errors")
    )]
    ConfigError { reason: String },

    #[error("[FLOWC-111] Cannot access '{path}': {reason}")]
    #[diagnostic(code(flowc::io_error), help("Check the path exists and is readable"))]
    Io { path: String, reason: String },

    #[error("[FLOWC-112] '{path}' is not valid UTF-8")]
    #[diagnostic(code(flowc::invalid_encoding), help("Re-save the file as UTF-8"))]
    InvalidEncoding { path: String },

    #[error("[FLOWC-113] '{path}' is {size} bytes, over the {limit} byte limit")]
    #[diagnostic(
        code(flowc::file_too_large),
        help("Split the workflow or raise compile.max_file_size")
    )]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error("[FLOWC-114] Failed to render {format} output: {reason}")]
    #[diagnostic(code(flowc::serialization))]
    Serialization { format: String, reason: String },
}

impl FlowcError {
    /// Get the error code (e.g., "FLOWC-001")
    pub fn code(&self) -> &'static str {
        match self {
            // Lexical
            Self::UnknownDirective { .. } => "FLOWC-001",
            Self::InconsistentIndentation { .. } => "FLOWC-002",
            Self::UnterminatedCodeBlock { .. } => "FLOWC-003",
            // Structural
            Self::DirectiveOutsideTask { .. } => "FLOWC-020",
            Self::MalformedArguments { .. } => "FLOWC-021",
            Self::OrphanElse { .. } => "FLOWC-022",
            Self::DuplicateElse { .. } => "FLOWC-023",
            Self::DuplicateLang { .. } => "FLOWC-024",
            Self::DuplicateEntryOverride { .. } => "FLOWC-025",
            Self::UnexpectedIndent { .. } => "FLOWC-026",
            Self::MisplacedEntryOverride { .. } => "FLOWC-027",
            Self::TopLevelOnly { .. } => "FLOWC-028",
            // Semantic
            Self::DuplicateVariable { .. } => "FLOWC-040",
            Self::DuplicateTask { .. } => "FLOWC-041",
            Self::UndeclaredVariableReference { .. } => "FLOWC-042",
            Self::InvalidLiteral { .. } => "FLOWC-043",
            Self::ReservedTaskId { .. } => "FLOWC-044",
            // Validation
            Self::Validation { .. } => "FLOWC-060",
            // Internal
            Self::Internal { .. } => "FLOWC-090",
            // Augmentation
            Self::AugmentationFailed { .. } => "FLOWC-100",
            Self::AugmentationTimeout { .. } => "FLOWC-101",
            Self::AugmentationCancelled => "FLOWC-102",
            Self::AugmentationMalformed { .. } => "FLOWC-103",
            Self::AugmentationHttp { .. } => "FLOWC-104",
            // Config & IO
            Self::ConfigError { .. } => "FLOWC-110",
            Self::Io { .. } => "FLOWC-111",
            Self::InvalidEncoding { .. } => "FLOWC-112",
            Self::FileTooLarge { .. } => "FLOWC-113",
            Self::Serialization { .. } => "FLOWC-114",
        }
    }

    /// Taxonomy class of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownDirective { .. }
            | Self::InconsistentIndentation { .. }
            | Self::UnterminatedCodeBlock { .. } => ErrorCategory::Lexical,
            Self::DirectiveOutsideTask { .. }
            | Self::MalformedArguments { .. }
            | Self::OrphanElse { .. }
            | Self::DuplicateElse { .. }
            | Self::DuplicateLang { .. }
            | Self::DuplicateEntryOverride { .. }
            | Self::UnexpectedIndent { .. }
            | Self::MisplacedEntryOverride { .. }
            | Self::TopLevelOnly { .. } => ErrorCategory::Structural,
            Self::DuplicateVariable { .. }
            | Self::DuplicateTask { .. }
            | Self::UndeclaredVariableReference { .. }
            | Self::InvalidLiteral { .. }
            | Self::ReservedTaskId { .. } => ErrorCategory::Semantic,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Internal { .. } => ErrorCategory::Internal,
            Self::AugmentationFailed { .. }
            | Self::AugmentationTimeout { .. }
            | Self::AugmentationCancelled
            | Self::AugmentationMalformed { .. }
            | Self::AugmentationHttp { .. } => ErrorCategory::Augmentation,
            Self::ConfigError { .. } => ErrorCategory::Config,
            Self::Io { .. }
            | Self::InvalidEncoding { .. }
            | Self::FileTooLarge { .. }
            | Self::Serialization { .. } => ErrorCategory::Io,
        }
    }

    /// Primary source line, when the error points at one
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::UnknownDirective { line, .. }
            | Self::InconsistentIndentation { line, .. }
            | Self::UnterminatedCodeBlock { line }
            | Self::DirectiveOutsideTask { line, .. }
            | Self::MalformedArguments { line, .. }
            | Self::OrphanElse { line }
            | Self::DuplicateElse { line, .. }
            | Self::DuplicateLang { line, .. }
            | Self::DuplicateEntryOverride { line, .. }
            | Self::UnexpectedIndent { line }
            | Self::MisplacedEntryOverride { line }
            | Self::TopLevelOnly { line, .. }
            | Self::DuplicateVariable { line, .. }
            | Self::DuplicateTask { line, .. }
            | Self::UndeclaredVariableReference { line, .. }
            | Self::InvalidLiteral { line, .. }
            | Self::ReservedTaskId { line, .. } => Some(*line),
            Self::Validation { report } => report.errors.iter().find_map(|f| f.line),
            _ => None,
        }
    }

    /// Check if error is recoverable (pipeline may degrade instead of abort)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AugmentationFailed { .. }
                | Self::AugmentationTimeout { .. }
                | Self::AugmentationCancelled
                | Self::AugmentationMalformed { .. }
                | Self::AugmentationHttp { .. }
        )
    }

    /// Transient augmentation failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AugmentationFailed { .. } | Self::AugmentationTimeout { .. } => true,
            Self::AugmentationHttp { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl FixSuggestion for FlowcError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            FlowcError::UnknownDirective { .. } => Some(
                "Use one of @var, @task, @tool, @agent, @if, @else, @next, @lang",
            ),
            FlowcError::InconsistentIndentation { .. } => {
                Some("Dedent back to the exact column of an enclosing block")
            }
            FlowcError::UnterminatedCodeBlock { .. } => {
                Some("Close the block with a line containing only ```")
            }
            FlowcError::DirectiveOutsideTask { .. } => {
                Some("Move the directive into the body of a @task block")
            }
            FlowcError::MalformedArguments { .. } => {
                Some("Check the directive form, e.g. '@agent Name(key=value, other=value)'")
            }
            FlowcError::OrphanElse { .. } => {
                Some("Place @else directly after an @if block at the same indentation")
            }
            FlowcError::DuplicateElse { .. } => Some("Remove the second @else"),
            FlowcError::DuplicateLang { .. } => Some("Keep a single @lang tag per file"),
            FlowcError::DuplicateEntryOverride { .. } => {
                Some("Keep a single top-level @next for the entry task")
            }
            FlowcError::UnexpectedIndent { .. } => Some("Remove the extra indentation"),
            FlowcError::MisplacedEntryOverride { .. } => {
                Some("Move the top-level @next above the first @task")
            }
            FlowcError::TopLevelOnly { .. } => Some("Start @task and @lang lines at column 0"),
            FlowcError::DuplicateVariable { .. } => {
                Some("Rename one of the variables or remove the redeclaration")
            }
            FlowcError::DuplicateTask { .. } => Some("Rename one of the tasks"),
            FlowcError::UndeclaredVariableReference { .. } => {
                Some("Declare it with '@var name = value' or fix the placeholder name")
            }
            FlowcError::InvalidLiteral { .. } => {
                Some("Use an integer, float, true/false or a quoted string")
            }
            FlowcError::ReservedTaskId { .. } => Some("Rename the task; END is the terminal"),
            FlowcError::Validation { .. } => {
                Some("Fix the listed jump targets and flow paths")
            }
            FlowcError::Internal { .. } => {
                Some("Report this compiler bug together with the source file")
            }
            FlowcError::AugmentationTimeout { .. } => {
                Some("Raise augment.timeout_secs or disable augmentation")
            }
            FlowcError::AugmentationHttp { .. } => {
                Some("Check augment.endpoint, augment.model and the API key")
            }
            FlowcError::AugmentationFailed { .. }
            | FlowcError::AugmentationCancelled
            | FlowcError::AugmentationMalformed { .. } => {
                Some("Compile without --augment or set augment.mandatory = false")
            }
            FlowcError::ConfigError { .. } => {
                Some("Check ~/.config/flowc/config.toml for syntax errors")
            }
            FlowcError::Io { .. } => Some("Check the path exists and is readable"),
            FlowcError::InvalidEncoding { .. } => Some("Re-save the file as UTF-8"),
            FlowcError::FileTooLarge { .. } => {
                Some("Split the workflow or raise compile.max_file_size")
            }
            FlowcError::Serialization { .. } => None,
        }
    }
}
