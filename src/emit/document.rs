//! Serializable compilation output

use std::collections::BTreeMap;

use serde::Serialize;

use crate::ast::{BodyItem, CallableDecl, Literal, Program, Scope, ValueType};
use crate::dag::WorkflowGraph;
use crate::findings::Finding;
use crate::lex::DirectiveKind;
use crate::util::constants::FORMAT_VERSION;

/// Where a compilation came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// File name, or a caller-chosen label for in-memory sources
    pub name: String,
    /// xxh3-64 of the normalized source, hex
    pub hash: String,
    pub directive_counts: BTreeMap<DirectiveKind, usize>,
}

impl SourceInfo {
    pub fn new(
        name: impl Into<String>,
        normalized: &str,
        directive_counts: BTreeMap<DirectiveKind, usize>,
    ) -> Self {
        Self {
            name: name.into(),
            hash: format!("{:016x}", xxhash_rust::xxh3::xxh3_64(normalized.as_bytes())),
            directive_counts,
        }
    }

    /// Recount directives from a program whose tasks changed after lexing
    pub fn recount(&mut self, program: &Program) {
        let mut counts = BTreeMap::new();
        let mut bump = |kind: DirectiveKind, n: usize| {
            if n > 0 {
                *counts.entry(kind).or_insert(0) += n;
            }
        };
        bump(DirectiveKind::Lang, usize::from(program.lang.is_some()));
        bump(DirectiveKind::Next, usize::from(program.entry.is_some()));
        bump(DirectiveKind::Var, program.variables.len());
        bump(DirectiveKind::Task, program.tasks.len());
        for task in &program.tasks {
            bump(DirectiveKind::Next, usize::from(task.next.is_some()));
        }
        program.visit_items(|_, item| match item {
            BodyItem::ToolCall(_) => bump(DirectiveKind::Tool, 1),
            BodyItem::AgentCall(_) => bump(DirectiveKind::Agent, 1),
            BodyItem::Jump(_) | BodyItem::Next(_) => bump(DirectiveKind::Next, 1),
            BodyItem::Conditional(cond) => {
                bump(DirectiveKind::If, cond.condition_branches().count());
                bump(DirectiveKind::Else, usize::from(cond.has_else()));
            }
            _ => {}
        });
        self.directive_counts = counts;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub version: String,
    pub compiler_version: String,
    pub entry_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    pub metadata: DocumentMetadata,
    pub variables: Vec<VariableEntry>,
    pub tools: Vec<CallableDecl>,
    pub tasks: Vec<TaskEntry>,
    pub source_files: Vec<String>,
    pub warnings: Vec<Finding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preamble: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub directive_counts: BTreeMap<DirectiveKind, usize>,
    pub source_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiled_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableEntry {
    pub name: String,
    pub value: Option<Literal>,
    #[serde(rename = "type")]
    pub ty: Option<ValueType>,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskEntry {
    pub id: String,
    pub title: String,
    pub body: Vec<BodyItem>,
    /// Distinct outgoing targets, first-seen order
    pub next: Vec<String>,
    /// Distinct tasks with an edge into this one
    pub dependencies: Vec<String>,
    pub metadata: TaskMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskMetadata {
    pub line: usize,
    /// Ends the workflow by running off the end of its body
    pub implicit_end: bool,
}

impl Document {
    pub fn build(
        program: &Program,
        warnings: &[Finding],
        source: &SourceInfo,
        compiled_at: Option<String>,
    ) -> Self {
        let graph = WorkflowGraph::from_program(program);

        let variables = program
            .variables
            .iter()
            .map(|v| VariableEntry {
                name: v.name.clone(),
                value: v.value.clone(),
                ty: v.ty(),
                scope: v.scope,
            })
            .collect();

        let tasks = program
            .tasks
            .iter()
            .map(|task| TaskEntry {
                id: task.id.clone(),
                title: task.title.clone(),
                body: task.body.clone(),
                next: graph
                    .successors(&task.id)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                dependencies: graph
                    .predecessors(&task.id)
                    .iter()
                    .map(|p| p.to_string())
                    .collect(),
                metadata: TaskMetadata {
                    line: task.line,
                    implicit_end: graph.edges(&task.id).iter().any(|e| e.implicit),
                },
            })
            .collect();

        Self {
            version: FORMAT_VERSION.to_string(),
            compiler_version: env!("CARGO_PKG_VERSION").to_string(),
            entry_point: program.entry_point().map(str::to_string),
            lang: program.lang.as_ref().map(|l| l.tag.clone()),
            metadata: DocumentMetadata {
                directive_counts: source.directive_counts.clone(),
                source_hash: source.hash.clone(),
                compiled_at,
            },
            variables,
            tools: program.declarations.clone(),
            tasks,
            source_files: vec![source.name.clone()],
            warnings: warnings.to_vec(),
            preamble: program.preamble.iter().map(|t| t.content.clone()).collect(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&TaskEntry> {
        self.tasks.iter().find(|t| t.id == id)
    }
}
