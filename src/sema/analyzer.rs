//! Semantic analyzer
//!
//! Runs, in order:
//! 1. variable literal inference and uniqueness
//! 2. task id uniqueness (and the reserved terminal id)
//! 3. `{{name}}` resolution across all text content
//! 4. tool/agent registration, warning on conflicting descriptions
//! 5. global scope tagging
//!
//! Errors are fail-fast; warnings are returned with the analysis.

use crate::ast::{BodyItem, CallableDecl, Literal, Program, Scope};
use crate::error::{FlowcError, Result};
use crate::findings::{Finding, FindingKind};
use crate::util::TERMINAL;

use super::interpolation::references;
use super::symbols::SymbolTable;

/// Annotated program plus everything learned about it
#[derive(Debug, Clone)]
pub struct Analysis {
    pub program: Program,
    pub symbols: SymbolTable,
    pub warnings: Vec<Finding>,
}

/// Analyze a parsed program
pub fn analyze(mut program: Program) -> Result<Analysis> {
    let mut symbols = SymbolTable::default();
    let mut warnings = Vec::new();

    annotate_variables(&mut program, &mut symbols)?;
    collect_tasks(&program, &mut symbols)?;
    resolve_references(&program, &symbols)?;
    program.declarations = register_callables(&program, &mut symbols, &mut warnings);

    for var in &mut program.variables {
        var.scope = Scope::Global;
    }

    for task in &program.tasks {
        if task.body.is_empty() && task.next.is_none() {
            warnings.push(
                Finding::warning(FindingKind::EmptyTaskBody)
                    .with_task(&task.id)
                    .with_line(task.line),
            );
        }
    }

    tracing::debug!(
        variables = symbols.variable_count(),
        tasks = symbols.task_count(),
        warnings = warnings.len(),
        "semantic analysis complete"
    );

    Ok(Analysis {
        program,
        symbols,
        warnings,
    })
}

fn annotate_variables(program: &mut Program, symbols: &mut SymbolTable) -> Result<()> {
    for var in &mut program.variables {
        let literal = Literal::infer(&var.raw).map_err(|e| FlowcError::InvalidLiteral {
            name: var.name.clone(),
            line: var.line,
            reason: e.to_string(),
        })?;
        var.value = Some(literal);

        if let Some(first) = symbols.variable(&var.name) {
            return Err(FlowcError::DuplicateVariable {
                name: var.name.clone(),
                line: var.line,
                first_line: first.line,
            });
        }
        symbols.insert_variable(var.clone());
    }
    Ok(())
}

fn collect_tasks(program: &Program, symbols: &mut SymbolTable) -> Result<()> {
    for task in &program.tasks {
        if task.id == TERMINAL {
            return Err(FlowcError::ReservedTaskId {
                id: task.id.clone(),
                line: task.line,
            });
        }
        if let Some(first) = symbols.task(&task.id) {
            return Err(FlowcError::DuplicateTask {
                id: task.id.clone(),
                line: task.line,
                first_line: first.line,
            });
        }
        symbols.insert_task(task.clone());
    }
    Ok(())
}

/// Every `{{name}}` must name a declared variable; the earliest miss is reported
fn resolve_references(program: &Program, symbols: &SymbolTable) -> Result<()> {
    let mut first_miss: Option<(usize, String)> = None;
    let mut check = |text: &str, line: usize| {
        for name in references(text) {
            if !symbols.has_variable(name) && first_miss.as_ref().is_none_or(|(l, _)| line < *l) {
                first_miss = Some((line, name.to_string()));
            }
        }
    };

    for text in &program.preamble {
        check(&text.content, text.line);
    }
    for task in &program.tasks {
        check(&task.title, task.line);
    }
    program.visit_items(|_, item| match item {
        BodyItem::Text(text) => check(&text.content, text.line),
        BodyItem::ToolCall(tool) => {
            if let Some(description) = &tool.description {
                check(description, tool.line);
            }
        }
        BodyItem::AgentCall(agent) => {
            for param in &agent.params {
                check(&param.value, agent.line);
            }
            if let Some(description) = &agent.description {
                check(description, agent.line);
            }
        }
        // Bare identifiers in conditions are runtime predicates
        BodyItem::Conditional(cond) => {
            for branch in &cond.branches {
                if let Some(condition) = &branch.condition {
                    check(condition, branch.line);
                }
            }
        }
        // Code is verbatim; `{{` there belongs to the embedded language
        BodyItem::Code(_) | BodyItem::Jump(_) | BodyItem::Next(_) => {}
    });

    match first_miss {
        Some((line, name)) => Err(FlowcError::UndeclaredVariableReference { name, line }),
        None => Ok(()),
    }
}

fn register_callables(
    program: &Program,
    symbols: &mut SymbolTable,
    warnings: &mut Vec<Finding>,
) -> Vec<CallableDecl> {
    let mut catalog = Vec::new();

    program.visit_items(|task, item| {
        let Some(decl) = CallableDecl::from_item(item) else {
            return;
        };
        if let Some(first) = symbols.register_callable(&decl) {
            if first.description.is_some()
                && decl.description.is_some()
                && first.description != decl.description
            {
                warnings.push(
                    Finding::warning(FindingKind::ConflictingDeclaration {
                        name: decl.name.clone(),
                        first_line: first.line,
                    })
                    .with_task(&task.id)
                    .with_line(decl.line),
                );
            }
        }
        catalog.push(decl);
    });

    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ValueType;
    use crate::parse::parse_source;

    fn analyze_source(source: &str) -> Result<Analysis> {
        analyze(parse_source(source)?)
    }

    #[test]
    fn test_variable_types_inferred() {
        let analysis =
            analyze_source("@var n = 3\n@var r = 0.5\n@var ok = true\n@var s = \"hi\"\n@task a\n")
                .unwrap();
        let types: Vec<_> = analysis
            .program
            .variables
            .iter()
            .map(|v| v.ty().unwrap())
            .collect();
        assert_eq!(
            types,
            vec![
                ValueType::Integer,
                ValueType::Float,
                ValueType::Boolean,
                ValueType::String
            ]
        );
    }

    #[test]
    fn test_duplicate_variable_with_different_value() {
        let err = analyze_source("@var x = 1\n@var x = 2\n@task a\n").unwrap_err();
        assert!(matches!(
            err,
            FlowcError::DuplicateVariable { line: 2, first_line: 1, .. }
        ));
    }

    #[test]
    fn test_identical_redeclaration_rejected() {
        let err = analyze_source("@var x = 1\n@task a\n    @var x = 1\n").unwrap_err();
        assert!(matches!(
            err,
            FlowcError::DuplicateVariable { line: 3, first_line: 1, .. }
        ));
    }

    #[test]
    fn test_invalid_literal() {
        let err = analyze_source("@var x =\n@task a\n").unwrap_err();
        assert!(matches!(err, FlowcError::InvalidLiteral { line: 1, .. }));
    }

    #[test]
    fn test_reserved_terminal_id() {
        let err = analyze_source("@task END\n").unwrap_err();
        assert!(matches!(err, FlowcError::ReservedTaskId { line: 1, .. }));
    }

    #[test]
    fn test_condition_identifiers_not_resolved() {
        let source = "@task a\n    @if user.confirmed == true OR retry\n        @next END\n";
        assert!(analyze_source(source).is_ok());
    }

    #[test]
    fn test_condition_placeholders_are_resolved() {
        let source = "@task a\n    @if {{limit}} > 3\n        @next END\n";
        let err = analyze_source(source).unwrap_err();
        assert!(matches!(
            err,
            FlowcError::UndeclaredVariableReference { line: 2, .. }
        ));
    }

    #[test]
    fn test_earliest_undeclared_reference_reported() {
        let source = "@task a\n    {{first}}\n    {{second}}\n";
        match analyze_source(source).unwrap_err() {
            FlowcError::UndeclaredVariableReference { name, line } => {
                assert_eq!(name, "first");
                assert_eq!(line, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_conflicting_tool_description_warns() {
        let source = "@task a\n    @tool search the web\n    @tool search local files\n";
        let analysis = analyze_source(source).unwrap();
        assert_eq!(analysis.warnings.len(), 1);
        assert_eq!(analysis.warnings[0].kind.name(), "conflicting_declaration");
        assert_eq!(analysis.warnings[0].line, Some(3));
        assert_eq!(analysis.program.declarations.len(), 2);
    }

    #[test]
    fn test_empty_task_body_warns() {
        let analysis = analyze_source("@task a\n@task b\n    @next END\n").unwrap();
        let empties: Vec<_> = analysis
            .warnings
            .iter()
            .filter(|w| w.kind == FindingKind::EmptyTaskBody)
            .collect();
        assert_eq!(empties.len(), 1);
        assert_eq!(empties[0].task.as_deref(), Some("a"));
    }
}
