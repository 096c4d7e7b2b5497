//! Workflow validation
//!
//! Checks, in order:
//! 1. the entry point names a declared task
//! 2. every jump target resolves to a task or `END`
//! 3. every task is reachable from the entry point (skipped without one)
//! 4. every task has some path to `END`
//! 5. conditionals have a condition branch and at most one trailing else
//!
//! All findings are collected; nothing stops at the first problem. Loops
//! are never rejected.

use crate::ast::{BodyItem, Conditional, Program};
use crate::findings::{Finding, FindingKind, Severity, ValidationReport};

use super::graph::WorkflowGraph;

/// Graph validator. In strict mode unreachable tasks are errors.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    strict: bool,
}

impl Default for Validator {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl Validator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn validate(&self, program: &Program) -> ValidationReport {
        let graph = WorkflowGraph::from_program(program);
        let mut report = ValidationReport::default();

        let entry_ok = check_entry(program, &graph, &mut report);
        check_targets(program, &graph, &mut report);
        if entry_ok {
            self.check_reachability(program, &graph, &mut report);
        }
        check_termination(program, &graph, &mut report);
        check_conditionals(program, &mut report);

        tracing::debug!(
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            strict = self.strict,
            "validation complete"
        );
        report
    }

    fn check_reachability(
        &self,
        program: &Program,
        graph: &WorkflowGraph,
        report: &mut ValidationReport,
    ) {
        let Some(entry) = graph.entry() else {
            return;
        };
        let reachable = graph.reachable_from(entry);
        let severity = if self.strict {
            Severity::Error
        } else {
            Severity::Warning
        };

        for task in &program.tasks {
            if !reachable.contains(task.id.as_str()) {
                report.push(
                    Finding::new(FindingKind::UnreachableTask, severity)
                        .with_task(&task.id)
                        .with_line(task.line),
                );
            }
        }
    }
}

/// Validate with the given strictness
pub fn validate(program: &Program, strict: bool) -> ValidationReport {
    Validator::new(strict).validate(program)
}

fn check_entry(program: &Program, graph: &WorkflowGraph, report: &mut ValidationReport) -> bool {
    match graph.entry() {
        Some(entry) if graph.contains(entry) => true,
        Some(entry) => {
            let mut finding = Finding::error(FindingKind::EntryPointMissing {
                entry: Some(entry.to_string()),
            });
            if let Some(decl) = &program.entry {
                finding = finding.with_line(decl.line);
            }
            report.push(finding);
            false
        }
        None => {
            report.push(Finding::error(FindingKind::EntryPointMissing { entry: None }));
            false
        }
    }
}

fn check_targets(program: &Program, graph: &WorkflowGraph, report: &mut ValidationReport) {
    for task in &program.tasks {
        for edge in graph.edges(&task.id) {
            if !edge.implicit && !graph.resolves(&edge.target) {
                report.push(
                    Finding::error(FindingKind::UnknownJumpTarget {
                        target: edge.target.to_string(),
                    })
                    .with_task(&task.id)
                    .with_line(edge.line),
                );
            }
        }
    }
}

fn check_termination(program: &Program, graph: &WorkflowGraph, report: &mut ValidationReport) {
    let terminating = graph.reaching_terminal();
    for task in &program.tasks {
        if !terminating.contains(task.id.as_str()) {
            report.push(
                Finding::error(FindingKind::IncompleteFlow)
                    .with_task(&task.id)
                    .with_line(task.line),
            );
        }
    }
}

fn check_conditionals(program: &Program, report: &mut ValidationReport) {
    program.visit_items(|task, item| {
        let BodyItem::Conditional(cond) = item else {
            return;
        };
        if let Some(reason) = conditional_defect(cond) {
            report.push(
                Finding::error(FindingKind::MalformedConditional { reason })
                    .with_task(&task.id)
                    .with_line(cond.line),
            );
        }
    });
}

fn conditional_defect(cond: &Conditional) -> Option<String> {
    let Some(first) = cond.branches.first() else {
        return Some("conditional has no branches".to_string());
    };
    if first.is_else() {
        return Some("first branch must carry a condition".to_string());
    }
    let elses = cond.branches.iter().filter(|b| b.is_else()).count();
    if elses > 1 {
        return Some(format!("{} else branches, at most one allowed", elses));
    }
    if elses == 1 && cond.branches.last().is_some_and(|b| !b.is_else()) {
        return Some("else branch must come last".to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Branch, Jump, TaskDecl};
    use crate::parse::parse_source;

    fn report(source: &str, strict: bool) -> ValidationReport {
        validate(&parse_source(source).unwrap(), strict)
    }

    fn kinds(findings: &[Finding]) -> Vec<&'static str> {
        findings.iter().map(|f| f.kind.name()).collect()
    }

    // ═══════════════════════════════════════════════════════════════
    // ENTRY + TARGETS
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_valid_linear_workflow() {
        let r = report("@task a\n    @next b\n@task b\n    @next END\n", true);
        assert!(r.is_valid());
        assert!(!r.has_warnings());
    }

    #[test]
    fn test_entry_override_to_undeclared_task() {
        let r = report("@next ghost\n@task a\n    @next END\n", true);
        assert_eq!(kinds(&r.errors), vec!["entry_point_missing"]);
        assert_eq!(r.errors[0].line, Some(1));
    }

    #[test]
    fn test_empty_program_has_no_entry() {
        let r = report("", true);
        assert_eq!(
            r.errors[0].kind,
            FindingKind::EntryPointMissing { entry: None }
        );
    }

    #[test]
    fn test_unknown_jump_target_reports_task_and_line() {
        let r = report("@task a\n    step\n    @next nowhere\n", true);
        let unknown: Vec<_> = r.of_kind("unknown_jump_target").collect();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].task.as_deref(), Some("a"));
        assert_eq!(unknown[0].line, Some(3));
    }

    // ═══════════════════════════════════════════════════════════════
    // REACHABILITY + TERMINATION
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_unreachable_is_error_when_strict() {
        let source = "@task a\n    @next END\n@task b\n    @next END\n";
        let r = report(source, true);
        assert_eq!(kinds(&r.errors), vec!["unreachable_task"]);
        assert_eq!(r.errors[0].task.as_deref(), Some("b"));
    }

    #[test]
    fn test_unreachable_is_warning_when_lenient() {
        let source = "@task a\n    @next END\n@task b\n    @next END\n";
        let r = report(source, false);
        assert!(r.is_valid());
        assert_eq!(kinds(&r.warnings), vec!["unreachable_task"]);
    }

    #[test]
    fn test_mutual_loop_without_exit_is_incomplete() {
        let r = report("@task A\n    @next B\n@task B\n    @next A\n", true);
        let incomplete: Vec<_> = r
            .of_kind("incomplete_flow")
            .filter_map(|f| f.task.as_deref())
            .collect();
        assert_eq!(incomplete, vec!["A", "B"]);
    }

    #[test]
    fn test_loop_with_exit_is_valid() {
        let source = "@task a\n    @if retry\n        @next a\n    @next END\n";
        assert!(report(source, true).is_valid());
    }

    #[test]
    fn test_all_findings_collected() {
        let source = "@task a\n    @next ghost\n@task b\n    @next END\n";
        let r = report(source, true);
        assert_eq!(
            kinds(&r.errors),
            vec!["unknown_jump_target", "unreachable_task", "incomplete_flow"]
        );
    }

    // ═══════════════════════════════════════════════════════════════
    // CONDITIONAL STRUCTURE
    // ═══════════════════════════════════════════════════════════════

    fn branch(condition: Option<&str>, line: usize) -> Branch {
        Branch {
            condition: condition.map(str::to_string),
            body: vec![BodyItem::Jump(Jump::new("END", line + 1))],
            line,
        }
    }

    fn program_with(cond: Conditional) -> Program {
        let mut task = TaskDecl::new("a", 1);
        task.body.push(BodyItem::Conditional(cond));
        task.next = Some(Jump::new("END", 9));
        Program {
            tasks: vec![task],
            ..Default::default()
        }
    }

    #[test]
    fn test_else_only_conditional_rejected() {
        let program = program_with(Conditional {
            branches: vec![branch(None, 2)],
            line: 2,
        });
        let r = validate(&program, true);
        assert_eq!(kinds(&r.errors), vec!["malformed_conditional"]);
        assert_eq!(r.errors[0].line, Some(2));
    }

    #[test]
    fn test_branchless_conditional_rejected() {
        let program = program_with(Conditional {
            branches: vec![],
            line: 2,
        });
        let r = validate(&program, true);
        assert!(!r.is_valid());
        assert_eq!(kinds(&r.errors), vec!["malformed_conditional"]);
        assert_eq!(
            r.errors[0].kind,
            FindingKind::MalformedConditional {
                reason: "conditional has no branches".to_string()
            }
        );
    }

    #[test]
    fn test_double_else_rejected() {
        let program = program_with(Conditional {
            branches: vec![branch(Some("x"), 2), branch(None, 4), branch(None, 6)],
            line: 2,
        });
        let r = validate(&program, true);
        assert_eq!(kinds(&r.errors), vec!["malformed_conditional"]);
    }

    #[test]
    fn test_well_formed_conditional_passes() {
        let program = program_with(Conditional {
            branches: vec![branch(Some("x"), 2), branch(Some("y"), 4), branch(None, 6)],
            line: 2,
        });
        assert!(validate(&program, true).is_valid());
    }
}
