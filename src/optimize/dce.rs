//! Dead-code elimination
//!
//! Drops tasks unreachable from the entry point. Reachability is recomputed
//! here rather than taken from the validator, so the pass also cleans up
//! after constant folding.

use rustc_hash::FxHashSet;

use crate::ast::{BodyItem, Program};
use crate::dag::WorkflowGraph;

pub(super) fn eliminate(mut program: Program) -> Program {
    let graph = WorkflowGraph::from_program(&program);
    let Some(entry) = graph.entry() else {
        return program;
    };
    let reachable = graph.reachable_from(entry);
    if reachable.is_empty() {
        return program;
    }

    let removed: FxHashSet<String> = program
        .tasks
        .iter()
        .filter(|t| !reachable.contains(t.id.as_str()))
        .map(|t| t.id.clone())
        .collect();
    if removed.is_empty() {
        return program;
    }

    tracing::trace!(removed = removed.len(), "dead tasks eliminated");
    program.tasks.retain(|t| !removed.contains(&t.id));
    for task in &mut program.tasks {
        prune_branches(&mut task.body, &removed);
    }
    program
}

/// Drop branches whose only effect is a jump to a removed task, as long as
/// the conditional keeps a condition branch.
fn prune_branches(items: &mut [BodyItem], removed: &FxHashSet<String>) {
    for item in items {
        let BodyItem::Conditional(cond) = item else {
            continue;
        };
        for branch in &mut cond.branches {
            prune_branches(&mut branch.body, removed);
        }

        let dead = |body: &[BodyItem]| {
            matches!(body, [only] if only.as_jump().is_some_and(|j| removed.contains(&j.target)))
        };
        let survivors = cond
            .branches
            .iter()
            .filter(|b| !b.is_else() && !dead(&b.body))
            .count();
        if survivors > 0 {
            cond.branches.retain(|b| !dead(&b.body));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Branch, Conditional, Jump, TaskDecl};
    use crate::parse::parse_source;

    #[test]
    fn test_unreachable_tasks_removed() {
        let source = "@task a\n    @next c\n@task b\n    @next END\n@task c\n    @next END\n";
        let program = eliminate(parse_source(source).unwrap());
        let ids: Vec<_> = program.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_cycle_members_reachable_from_entry_kept() {
        let source = "@task a\n    @next b\n@task b\n    @if again\n        @next a\n    @next END\n";
        let program = parse_source(source).unwrap();
        assert_eq!(eliminate(program.clone()), program);
    }

    #[test]
    fn test_undeclared_entry_leaves_program_alone() {
        let program = parse_source("@next ghost\n@task a\n    @next END\n").unwrap();
        assert_eq!(eliminate(program.clone()), program);
    }

    fn jump_branch(condition: Option<&str>, target: &str, line: usize) -> Branch {
        Branch {
            condition: condition.map(str::to_string),
            body: vec![BodyItem::Jump(Jump::new(target, line + 1))],
            line,
        }
    }

    #[test]
    fn test_branch_to_removed_task_pruned() {
        let removed: FxHashSet<String> = ["gone".to_string()].into_iter().collect();
        let mut body = vec![BodyItem::Conditional(Conditional {
            branches: vec![
                jump_branch(Some("x"), "END", 2),
                jump_branch(None, "gone", 4),
            ],
            line: 2,
        })];
        prune_branches(&mut body, &removed);

        let BodyItem::Conditional(cond) = &body[0] else {
            panic!("expected conditional");
        };
        assert_eq!(cond.branches.len(), 1);
        assert!(!cond.has_else());
    }

    #[test]
    fn test_last_condition_branch_never_pruned() {
        let removed: FxHashSet<String> = ["gone".to_string()].into_iter().collect();
        let mut task = TaskDecl::new("a", 1);
        task.body.push(BodyItem::Conditional(Conditional {
            branches: vec![jump_branch(Some("x"), "gone", 2)],
            line: 2,
        }));
        let before = task.body.clone();
        prune_branches(&mut task.body, &removed);
        assert_eq!(task.body, before);
    }
}
