//! Text compaction: adjacent prose lines merge into one item

use crate::ast::{BodyItem, Program};

pub(super) fn compact(mut program: Program) -> Program {
    for task in &mut program.tasks {
        compact_body(&mut task.body);
    }
    program
}

fn compact_body(items: &mut Vec<BodyItem>) {
    let mut out: Vec<BodyItem> = Vec::with_capacity(items.len());
    for mut item in items.drain(..) {
        if let BodyItem::Conditional(cond) = &mut item {
            for branch in &mut cond.branches {
                compact_body(&mut branch.body);
            }
        }
        if let (Some(BodyItem::Text(prev)), BodyItem::Text(text)) = (out.last_mut(), &item) {
            prev.content.push('\n');
            prev.content.push_str(&text.content);
            continue;
        }
        out.push(item);
    }
    *items = out;
}
