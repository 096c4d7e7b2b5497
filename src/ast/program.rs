//! Program Types - the parsed workflow
//!
//! - `Program`: variables, tasks, language tag, entry override, preamble
//! - `TaskDecl`: one task with its body and trailing `@next`
//! - `BodyItem`: text, tool/agent calls, conditionals, jumps
//! - `CallableDecl`: catalog entry for a tool or agent use

use serde::Serialize;

use super::literal::{Literal, ValueType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Global,
}

/// `@var name = value`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDecl {
    pub name: String,
    /// Source text of the value, as written
    pub raw: String,
    /// Filled in by semantic analysis
    pub value: Option<Literal>,
    pub scope: Scope,
    pub line: usize,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, raw: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            raw: raw.into(),
            value: None,
            scope: Scope::Global,
            line,
        }
    }

    pub fn ty(&self) -> Option<ValueType> {
        self.value.as_ref().map(Literal::value_type)
    }

    /// Same name and same value (by literal when annotated, by text otherwise)
    pub fn is_identical(&self, other: &VariableDecl) -> bool {
        if self.name != other.name {
            return false;
        }
        match (&self.value, &other.value) {
            (Some(a), Some(b)) => a == b,
            _ => self.raw.trim() == other.raw.trim(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextLine {
    pub content: String,
    pub line: usize,
}

/// Verbatim lines between ``` fences
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    pub content: String,
    /// Line of the opening fence
    pub line: usize,
}

impl CodeBlock {
    /// The block as written, fences included
    pub fn fenced(&self) -> String {
        let lang = self.lang.as_deref().unwrap_or("");
        if self.content.is_empty() {
            format!("```{}\n```", lang)
        } else {
            format!("```{}\n{}\n```", lang, self.content)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentParam {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentCall {
    pub name: String,
    pub params: Vec<AgentParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub line: usize,
}

/// Jump or next-action target: a task id or the terminal marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Jump {
    pub target: String,
    pub line: usize,
}

impl Jump {
    pub fn new(target: impl Into<String>, line: usize) -> Self {
        Self {
            target: target.into(),
            line,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    /// `None` marks the else-branch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub body: Vec<BodyItem>,
    pub line: usize,
}

impl Branch {
    pub fn is_else(&self) -> bool {
        self.condition.is_none()
    }

    /// Outgoing edge of the branch: its last jump, else the task's trailing `@next`
    pub fn exit<'a>(&'a self, task_next: Option<&'a Jump>) -> Option<&'a Jump> {
        self.body
            .iter()
            .rev()
            .find_map(|item| match item {
                BodyItem::Jump(jump) | BodyItem::Next(jump) => Some(jump),
                _ => None,
            })
            .or(task_next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conditional {
    pub branches: Vec<Branch>,
    pub line: usize,
}

impl Conditional {
    pub fn condition_branches(&self) -> impl Iterator<Item = &Branch> {
        self.branches.iter().filter(|b| !b.is_else())
    }

    pub fn else_branch(&self) -> Option<&Branch> {
        self.branches.iter().find(|b| b.is_else())
    }

    pub fn has_else(&self) -> bool {
        self.else_branch().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BodyItem {
    Text(TextLine),
    Code(CodeBlock),
    ToolCall(ToolCall),
    AgentCall(AgentCall),
    Conditional(Conditional),
    /// `@next` inside a branch
    Jump(Jump),
    /// `@next` directly in a task body
    Next(Jump),
}

impl BodyItem {
    pub fn line(&self) -> usize {
        match self {
            BodyItem::Text(t) => t.line,
            BodyItem::Code(c) => c.line,
            BodyItem::ToolCall(t) => t.line,
            BodyItem::AgentCall(a) => a.line,
            BodyItem::Conditional(c) => c.line,
            BodyItem::Jump(j) | BodyItem::Next(j) => j.line,
        }
    }

    pub fn as_jump(&self) -> Option<&Jump> {
        match self {
            BodyItem::Jump(j) | BodyItem::Next(j) => Some(j),
            _ => None,
        }
    }
}

/// Can control reach the end of these items without taking a jump?
pub fn body_falls_through(items: &[BodyItem]) -> bool {
    for item in items {
        match item {
            BodyItem::Jump(_) | BodyItem::Next(_) => return false,
            BodyItem::Conditional(cond) => {
                if cond.has_else() && cond.branches.iter().all(|b| !body_falls_through(&b.body)) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDecl {
    pub id: String,
    pub title: String,
    pub body: Vec<BodyItem>,
    /// Trailing `@next` of the task body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<Jump>,
    pub line: usize,
}

impl TaskDecl {
    pub fn new(id: impl Into<String>, line: usize) -> Self {
        let id = id.into();
        Self {
            title: default_title(&id),
            id,
            body: Vec::new(),
            next: None,
            line,
        }
    }

    /// Whether the task ends without an explicit jump on some path
    pub fn falls_through(&self) -> bool {
        self.next.is_none() && body_falls_through(&self.body)
    }

    /// Every jump in the task, in source order, trailing `@next` last
    pub fn jumps(&self) -> Vec<&Jump> {
        fn walk<'a>(items: &'a [BodyItem], out: &mut Vec<&'a Jump>) {
            for item in items {
                match item {
                    BodyItem::Jump(j) | BodyItem::Next(j) => out.push(j),
                    BodyItem::Conditional(cond) => {
                        for branch in &cond.branches {
                            walk(&branch.body, out);
                        }
                    }
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.body, &mut out);
        out.extend(self.next.as_ref());
        out
    }

    /// Only prose: a candidate for natural-language augmentation
    pub fn is_prose_only(&self) -> bool {
        self.next.is_none()
            && !self.body.is_empty()
            && self.body.iter().all(|i| matches!(i, BodyItem::Text(_)))
    }
}

/// Title used when `@task` gives none: `check_order` → `Check Order`
pub fn default_title(id: &str) -> String {
    id.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallableKind {
    Tool,
    Agent,
}

/// One tool or agent use, as listed in the program catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallableDecl {
    pub kind: CallableKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<AgentParam>,
    #[serde(skip)]
    pub line: usize,
}

impl CallableDecl {
    pub fn from_item(item: &BodyItem) -> Option<Self> {
        match item {
            BodyItem::ToolCall(tool) => Some(Self {
                kind: CallableKind::Tool,
                name: tool.name.clone(),
                description: tool.description.clone(),
                params: Vec::new(),
                line: tool.line,
            }),
            BodyItem::AgentCall(agent) => Some(Self {
                kind: CallableKind::Agent,
                name: agent.name.clone(),
                description: agent.description.clone(),
                params: agent.params.clone(),
                line: agent.line,
            }),
            _ => None,
        }
    }

    /// Same declaration, ignoring where it appears
    pub fn same_declaration(&self, other: &CallableDecl) -> bool {
        self.kind == other.kind
            && self.name == other.name
            && self.description == other.description
            && self.params == other.params
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LangTag {
    pub tag: String,
    pub line: usize,
}

/// Top-level `@next task` before the first `@task`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryOverride {
    pub task: String,
    pub line: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Program {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang: Option<LangTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryOverride>,
    /// Prose outside any task
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preamble: Vec<TextLine>,
    pub variables: Vec<VariableDecl>,
    pub tasks: Vec<TaskDecl>,
    /// Every tool/agent use in source order (deduplicated by the optimizer)
    pub declarations: Vec<CallableDecl>,
}

impl Program {
    /// Entry task id: the explicit override, else the first declared task
    pub fn entry_point(&self) -> Option<&str> {
        match &self.entry {
            Some(entry) => Some(entry.task.as_str()),
            None => self.tasks.first().map(|t| t.id.as_str()),
        }
    }

    pub fn task(&self, id: &str) -> Option<&TaskDecl> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut TaskDecl> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Visit every body item, depth-first in source order
    pub fn visit_items<'a>(&'a self, mut f: impl FnMut(&'a TaskDecl, &'a BodyItem)) {
        fn walk<'a>(
            task: &'a TaskDecl,
            items: &'a [BodyItem],
            f: &mut impl FnMut(&'a TaskDecl, &'a BodyItem),
        ) {
            for item in items {
                f(task, item);
                if let BodyItem::Conditional(cond) = item {
                    for branch in &cond.branches {
                        walk(task, &branch.body, f);
                    }
                }
            }
        }
        for task in &self.tasks {
            walk(task, &task.body, &mut f);
        }
    }

    /// Tool/agent declarations found in the current task bodies
    pub fn collect_declarations(&self) -> Vec<CallableDecl> {
        let mut out = Vec::new();
        self.visit_items(|_, item| out.extend(CallableDecl::from_item(item)));
        out
    }
}
