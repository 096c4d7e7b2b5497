//! Duplicate removal for variables and the tool/agent catalog

use crate::ast::{CallableDecl, Program, VariableDecl};

pub(super) fn dedup(mut program: Program) -> Program {
    let mut variables: Vec<VariableDecl> = Vec::with_capacity(program.variables.len());
    for var in program.variables.drain(..) {
        if !variables.iter().any(|kept| kept.is_identical(&var)) {
            variables.push(var);
        }
    }
    program.variables = variables;

    // Folding and DCE may have dropped uses, so rebuild from surviving bodies
    let mut catalog: Vec<CallableDecl> = Vec::new();
    for decl in program.collect_declarations() {
        if !catalog.iter().any(|kept| kept.same_declaration(&decl)) {
            catalog.push(decl);
        }
    }
    program.declarations = catalog;
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_source;
    use crate::sema::analyze;

    fn deduped(source: &str) -> Program {
        dedup(analyze(parse_source(source).unwrap()).unwrap().program)
    }

    #[test]
    fn test_analysis_rejects_identical_variables() {
        let err = analyze(parse_source("@var x = 1\n@var x = 1\n@task a\n").unwrap()).unwrap_err();
        assert_eq!(err.code(), "FLOWC-040");
    }

    #[test]
    fn test_identical_variables_collapse() {
        // analysis never lets these through; dedup still tolerates them
        let program = dedup(parse_source("@var x = 1\n@var x = 1\n@var y = 1\n@task a\n").unwrap());
        let names: Vec<_> = program.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(program.variables[0].line, 1);
    }

    #[test]
    fn test_identical_tools_collapse() {
        let source = "@task a\n    @tool search the web\n    @next b\n@task b\n    @tool search the web\n";
        let program = deduped(source);
        assert_eq!(program.declarations.len(), 1);
        assert_eq!(program.declarations[0].line, 2);
    }

    #[test]
    fn test_differing_descriptions_both_kept() {
        let source = "@task a\n    @tool search the web\n    @tool search local files\n";
        assert_eq!(deduped(source).declarations.len(), 2);
    }

    #[test]
    fn test_catalog_follows_bodies() {
        let mut program = deduped("@task a\n    @tool search\n");
        program.tasks[0].body.clear();
        assert!(dedup(program).declarations.is_empty());
    }
}
