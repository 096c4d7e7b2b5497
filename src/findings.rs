//! Findings - non-fatal diagnostics and the validation report
//!
//! Lexical, structural and semantic problems abort with a [`FlowcError`].
//! Everything else the pipeline notices is a [`Finding`]: validator
//! results, analyzer warnings, degraded augmentation. A finding carries its
//! severity, so the same kind (e.g. an unreachable task) can be an error in
//! strict mode and a warning otherwise.
//!
//! [`FlowcError`]: crate::error::FlowcError

use std::fmt;

use serde::Serialize;

/// Severity of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// What a finding is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    // Analyzer warnings
    EmptyTaskBody,
    ConflictingDeclaration { name: String, first_line: usize },
    // Augmentation
    AugmentationDegraded { reason: String },
    // Validator
    EntryPointMissing { entry: Option<String> },
    UnknownJumpTarget { target: String },
    UnreachableTask,
    IncompleteFlow,
    MalformedConditional { reason: String },
}

impl FindingKind {
    /// Stable snake_case name, used in reports and tests
    pub fn name(&self) -> &'static str {
        match self {
            FindingKind::EmptyTaskBody => "empty_task_body",
            FindingKind::ConflictingDeclaration { .. } => "conflicting_declaration",
            FindingKind::AugmentationDegraded { .. } => "augmentation_degraded",
            FindingKind::EntryPointMissing { .. } => "entry_point_missing",
            FindingKind::UnknownJumpTarget { .. } => "unknown_jump_target",
            FindingKind::UnreachableTask => "unreachable_task",
            FindingKind::IncompleteFlow => "incomplete_flow",
            FindingKind::MalformedConditional { .. } => "malformed_conditional",
        }
    }
}

/// A single diagnostic with its location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    #[serde(flatten)]
    pub kind: FindingKind,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Finding {
    pub fn new(kind: FindingKind, severity: Severity) -> Self {
        Self {
            kind,
            severity,
            task: None,
            line: None,
        }
    }

    pub fn error(kind: FindingKind) -> Self {
        Self::new(kind, Severity::Error)
    }

    pub fn warning(kind: FindingKind) -> Self {
        Self::new(kind, Severity::Warning)
    }

    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(line) = self.line {
            write!(f, " (line {})", line)?;
        }
        write!(f, ": ")?;
        let task = self.task.as_deref().unwrap_or("?");
        match &self.kind {
            FindingKind::EmptyTaskBody => write!(f, "task '{}' has an empty body", task),
            FindingKind::ConflictingDeclaration { name, first_line } => write!(
                f,
                "'{}' redeclared with a different description (first at line {})",
                name, first_line
            ),
            FindingKind::AugmentationDegraded { reason } => {
                write!(f, "augmentation skipped, using source as written: {}", reason)
            }
            FindingKind::EntryPointMissing { entry: Some(entry) } => {
                write!(f, "entry task '{}' is not declared", entry)
            }
            FindingKind::EntryPointMissing { entry: None } => {
                write!(f, "workflow declares no tasks")
            }
            FindingKind::UnknownJumpTarget { target } => {
                write!(f, "task '{}' jumps to unknown target '{}'", task, target)
            }
            FindingKind::UnreachableTask => {
                write!(f, "task '{}' is not reachable from the entry point", task)
            }
            FindingKind::IncompleteFlow => {
                write!(f, "task '{}' has no path to END", task)
            }
            FindingKind::MalformedConditional { reason } => {
                write!(f, "malformed conditional in task '{}': {}", task, reason)
            }
        }
    }
}

/// Findings split by severity, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<Finding>,
    pub warnings: Vec<Finding>,
}

impl ValidationReport {
    /// Route a finding by its severity
    pub fn push(&mut self, finding: Finding) {
        match finding.severity {
            Severity::Error => self.errors.push(finding),
            Severity::Warning => self.warnings.push(finding),
        }
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.push(finding);
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Findings of a given kind name, errors first
    pub fn of_kind<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .filter(move |f| f.kind.name() == name)
    }

    /// One-line summary for error messages
    pub fn summary(&self) -> String {
        match self.errors.len() {
            0 => "no errors".to_string(),
            1 => self.errors[0].to_string(),
            n => format!(
                "{} errors: {}",
                n,
                self.errors
                    .iter()
                    .map(|f| f.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_routes_by_severity() {
        let mut report = ValidationReport::default();
        report.push(Finding::error(FindingKind::IncompleteFlow).with_task("A"));
        report.push(Finding::warning(FindingKind::UnreachableTask).with_task("B"));

        assert!(!report.is_valid());
        assert!(report.has_warnings());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_summary_lists_every_error() {
        let mut report = ValidationReport::default();
        report.push(Finding::error(FindingKind::IncompleteFlow).with_task("A"));
        report.push(Finding::error(FindingKind::IncompleteFlow).with_task("B"));

        let summary = report.summary();
        assert!(summary.starts_with("2 errors"));
        assert!(summary.contains("'A'"));
        assert!(summary.contains("'B'"));
    }

    #[test]
    fn test_of_kind_filters() {
        let mut report = ValidationReport::default();
        report.push(Finding::error(FindingKind::IncompleteFlow).with_task("A"));
        report.push(Finding::warning(FindingKind::EmptyTaskBody).with_task("B"));

        assert_eq!(report.of_kind("incomplete_flow").count(), 1);
        assert_eq!(report.of_kind("empty_task_body").count(), 1);
        assert_eq!(report.of_kind("unreachable_task").count(), 0);
    }

    #[test]
    fn test_display_with_line() {
        let finding = Finding::error(FindingKind::UnknownJumpTarget {
            target: "Z".to_string(),
        })
        .with_task("A")
        .with_line(4);
        assert_eq!(
            finding.to_string(),
            "error (line 4): task 'A' jumps to unknown target 'Z'"
        );
    }

    #[test]
    fn test_finding_serializes_kind_tag() {
        let finding = Finding::warning(FindingKind::UnreachableTask).with_task("B");
        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "unreachable_task");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["task"], "B");
        assert!(json.get("line").is_none());
    }
}
