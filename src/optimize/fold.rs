//! Constant folding of conditionals
//!
//! Branches are checked in order. A statically false branch is dropped; the
//! first statically true branch settles the conditional: it replaces the
//! whole node when no undecided branch precedes it, otherwise it becomes
//! the else branch. Later branches are unreachable and discarded.

use std::mem;

use crate::ast::{BodyItem, Conditional, Program};

use super::condition::{evaluate, Bindings};

pub(super) fn fold(mut program: Program) -> Program {
    let Program {
        variables, tasks, ..
    } = &mut program;

    let mut bindings = Bindings::default();
    for var in variables.iter() {
        if let Some(value) = &var.value {
            bindings.entry(var.name.as_str()).or_insert(value);
        }
    }

    for task in tasks.iter_mut() {
        let body = mem::take(&mut task.body);
        task.body = fold_body(body, &bindings, false);
    }
    program
}

fn fold_body(items: Vec<BodyItem>, bindings: &Bindings<'_>, in_branch: bool) -> Vec<BodyItem> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            BodyItem::Conditional(cond) => {
                out.extend(fold_conditional(cond, bindings, in_branch));
            }
            other => out.push(other),
        }
    }
    out
}

fn fold_conditional(cond: Conditional, bindings: &Bindings<'_>, in_branch: bool) -> Vec<BodyItem> {
    let mut kept = Vec::with_capacity(cond.branches.len());
    let mut settled = None;

    for mut branch in cond.branches {
        branch.body = fold_body(mem::take(&mut branch.body), bindings, true);
        let decided = match &branch.condition {
            None => true,
            Some(text) => match evaluate(text, bindings) {
                Some(false) => continue,
                Some(true) => true,
                None => false,
            },
        };

        if !decided {
            kept.push(branch);
            continue;
        }
        if kept.is_empty() {
            settled = Some(branch.body);
        } else {
            branch.condition = None;
            kept.push(branch);
        }
        break;
    }

    if !kept.is_empty() {
        return vec![BodyItem::Conditional(Conditional {
            branches: kept,
            line: cond.line,
        })];
    }

    let body = settled.unwrap_or_default();
    if in_branch {
        return body;
    }
    // Spliced into the task body: branch jumps become task-level jumps
    body.into_iter()
        .map(|item| match item {
            BodyItem::Jump(jump) => BodyItem::Next(jump),
            other => other,
        })
        .collect()
}
