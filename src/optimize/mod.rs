//! Optimizer
//!
//! Pure rewrite of a validated program. The pass sequence
//! dead-code elimination → constant folding → text compaction → duplicate
//! removal is repeated until the program stops changing, so the result is
//! idempotent: `optimize(optimize(p)) == optimize(p)`.
//!
//! Never fails on user input. An `Internal` error means the optimizer
//! itself broke an invariant.

mod compact;
pub mod condition;
mod dce;
mod dedup;
mod fold;

use rustc_hash::FxHashSet;

use crate::ast::{BodyItem, Program};
use crate::error::{FlowcError, Result};
use crate::util::constants::MAX_OPTIMIZE_ROUNDS;
use crate::util::TERMINAL;

/// Optimize a validated program
pub fn optimize(program: &Program) -> Result<Program> {
    let input_ids: FxHashSet<&str> = program.tasks.iter().map(|t| t.id.as_str()).collect();
    let mut current = program.clone();

    for round in 1..=MAX_OPTIMIZE_ROUNDS {
        let next = run_passes(current.clone());
        if next == current {
            verify(&next, &input_ids)?;
            tracing::debug!(
                rounds = round,
                tasks_before = program.tasks.len(),
                tasks_after = next.tasks.len(),
                "optimization complete"
            );
            return Ok(next);
        }
        current = next;
    }

    Err(FlowcError::Internal {
        pass: "fixed-point".to_string(),
        reason: format!("no fixed point after {} rounds", MAX_OPTIMIZE_ROUNDS),
    })
}

fn run_passes(program: Program) -> Program {
    let program = dce::eliminate(program);
    let program = fold::fold(program);
    let program = compact::compact(program);
    dedup::dedup(program)
}

/// Post-conditions of a finished optimization
fn verify(program: &Program, input_ids: &FxHashSet<&str>) -> Result<()> {
    let defect = |pass: &str, reason: String| FlowcError::Internal {
        pass: pass.to_string(),
        reason,
    };

    match program.entry_point() {
        Some(entry) if program.task(entry).is_some() => {}
        Some(entry) => {
            return Err(defect("dce", format!("entry task '{}' was removed", entry)));
        }
        None => return Err(defect("dce", "no entry point".to_string())),
    }

    let surviving: FxHashSet<&str> = program.tasks.iter().map(|t| t.id.as_str()).collect();
    for task in &program.tasks {
        for jump in task.jumps() {
            let target = jump.target.as_str();
            if target != TERMINAL && !surviving.contains(target) && input_ids.contains(target) {
                return Err(defect(
                    "dce",
                    format!("task '{}' jumps to removed task '{}'", task.id, target),
                ));
            }
        }
    }

    let mut malformed = None;
    program.visit_items(|task, item| {
        if let BodyItem::Conditional(cond) = item {
            if malformed.is_none() && cond.condition_branches().next().is_none() {
                malformed = Some(task.id.clone());
            }
        }
    });
    if let Some(task) = malformed {
        return Err(defect(
            "fold",
            format!("conditional in task '{}' lost its condition branch", task),
        ));
    }
    Ok(())
}
