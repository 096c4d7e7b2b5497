//! Shared fixtures for integration tests

#![allow(dead_code)]

use flowc::ast::{BodyItem, Program, TaskDecl};
use flowc::parse::parse_source;
use flowc::sema::{analyze, Analysis};
use flowc::{Compilation, Compiler, FlowcConfig};

/// Conditional on a constant: folds to a direct edge to END
pub const SCENARIO_A: &str = "\
@var x = 5
@task a
    @if x == 5
        @next END
    @else
        @next b
@task b
    fallback
    @next END
";

/// Two tasks bouncing forever
pub const SCENARIO_B: &str = "\
@task a
    @next b
@task b
    @next a
";

/// Branch without its own jump inherits the trailing next
pub const SCENARIO_E: &str = "\
@task a
    @if ready
        check the order
    @next c
@task c
    @next END
";

/// Every directive kind at least once
pub const ORDER_FLOW: &str = "\
@lang en
Order handling workflow
@var limit = 100
@var region = \"eu\"
@var express = false
@task check_order Check the order
    Look up order {{region}}
    @tool lookup Fetch the order record
    @if amount > {{limit}}
        @next review
    @else
        @next ship
@task review
    @agent Reviewer(level=senior, notes=\"a, b\") Manual review
    @if express == true
        @next ship
    @next END
@task ship
    Ship to {{region}}
    @tool carrier
";

pub fn analysis(source: &str) -> Analysis {
    analyze(parse_source(source).expect("parse")).expect("analyze")
}

pub fn program(source: &str) -> Program {
    analysis(source).program
}

pub fn strict() -> Compiler {
    Compiler::new(FlowcConfig::default())
}

pub fn lenient() -> Compiler {
    let mut config = FlowcConfig::default();
    config.compile.strict = false;
    Compiler::new(config)
}

pub fn compile(source: &str) -> Compilation {
    strict().compile_str("test.flow", source).expect("compile")
}

pub fn task<'a>(program: &'a Program, id: &str) -> &'a TaskDecl {
    program
        .task(id)
        .unwrap_or_else(|| panic!("task '{}' missing", id))
}

/// True when a top-level body item is a conditional
pub fn has_conditional(items: &[BodyItem]) -> bool {
    items
        .iter()
        .any(|item| matches!(item, BodyItem::Conditional(_)))
}

/// Targets of every jump in the task, trailing next last
pub fn targets(task: &TaskDecl) -> Vec<String> {
    task.jumps().into_iter().map(|j| j.target.clone()).collect()
}
