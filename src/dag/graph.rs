//! WorkflowGraph - control-flow edges between tasks
//!
//! Built once per program from every jump target plus the implicit edge to
//! the terminal marker for tasks that can fall off their end. Cycles are
//! legal; the graph only answers reachability questions.
//!
//! - Arc<str> ids shared between the adjacency maps
//! - FxHashMap for the adjacency lookups
//! - SmallVec edge lists (most tasks have 1-2 exits)

use std::collections::VecDeque;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::ast::Program;
use crate::util::TERMINAL;

/// An outgoing control-flow edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub target: Arc<str>,
    /// Line of the `@next` that produced the edge (task line when implicit)
    pub line: usize,
    /// Added because the task can end without a jump
    pub implicit: bool,
}

pub type EdgeVec = SmallVec<[Edge; 4]>;
type IdVec = SmallVec<[Arc<str>; 4]>;

static EMPTY_EDGES: &[Edge] = &[];
static EMPTY_IDS: &[Arc<str>] = &[];

pub struct WorkflowGraph {
    /// task id -> outgoing edges, in source order
    edges: FxHashMap<Arc<str>, EdgeVec>,
    /// target id -> distinct source tasks, first-seen order
    predecessors: FxHashMap<Arc<str>, IdVec>,
    /// Declared task ids in declaration order
    task_ids: Vec<Arc<str>>,
    entry: Option<Arc<str>>,
}

impl WorkflowGraph {
    pub fn from_program(program: &Program) -> Self {
        let capacity = program.tasks.len();
        let mut ids: FxHashSet<Arc<str>> =
            FxHashSet::with_capacity_and_hasher(capacity + 1, Default::default());
        let mut share = |id: &str| -> Arc<str> {
            if let Some(existing) = ids.get(id) {
                return Arc::clone(existing);
            }
            let id: Arc<str> = Arc::from(id);
            ids.insert(Arc::clone(&id));
            id
        };

        let mut edges: FxHashMap<Arc<str>, EdgeVec> =
            FxHashMap::with_capacity_and_hasher(capacity, Default::default());
        let mut predecessors: FxHashMap<Arc<str>, IdVec> =
            FxHashMap::with_capacity_and_hasher(capacity + 1, Default::default());
        let mut task_ids = Vec::with_capacity(capacity);

        for task in &program.tasks {
            task_ids.push(share(&task.id));
        }

        for (task, source) in program.tasks.iter().zip(&task_ids) {
            let mut out = EdgeVec::new();
            for jump in task.jumps() {
                out.push(Edge {
                    target: share(&jump.target),
                    line: jump.line,
                    implicit: false,
                });
            }
            if task.falls_through() {
                out.push(Edge {
                    target: share(TERMINAL),
                    line: task.line,
                    implicit: true,
                });
            }

            for edge in &out {
                let preds = predecessors.entry(Arc::clone(&edge.target)).or_default();
                if !preds.iter().any(|p| p == source) {
                    preds.push(Arc::clone(source));
                }
            }
            edges.insert(Arc::clone(source), out);
        }

        let entry = program.entry_point().map(&mut share);

        tracing::trace!(
            tasks = task_ids.len(),
            edges = edges.values().map(|e| e.len()).sum::<usize>(),
            "built workflow graph"
        );

        Self {
            edges,
            predecessors,
            task_ids,
            entry,
        }
    }

    /// Entry task id as declared (may name an undeclared task)
    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    pub fn task_ids(&self) -> &[Arc<str>] {
        &self.task_ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    /// A target resolves when it is a declared task or the terminal marker
    pub fn resolves(&self, target: &str) -> bool {
        target == TERMINAL || self.contains(target)
    }

    /// Outgoing edges of a task, in source order
    pub fn edges(&self, id: &str) -> &[Edge] {
        self.edges.get(id).map(|e| e.as_slice()).unwrap_or(EMPTY_EDGES)
    }

    /// Distinct successor ids, first-seen order
    pub fn successors(&self, id: &str) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for edge in self.edges(id) {
            if !out.contains(&edge.target.as_ref()) {
                out.push(&edge.target);
            }
        }
        out
    }

    /// Distinct tasks with an edge into `id`
    pub fn predecessors(&self, id: &str) -> &[Arc<str>] {
        self.predecessors
            .get(id)
            .map(|p| p.as_slice())
            .unwrap_or(EMPTY_IDS)
    }

    /// Declared tasks reachable from `start` (inclusive), breadth-first
    pub fn reachable_from(&self, start: &str) -> FxHashSet<Arc<str>> {
        let mut visited: FxHashSet<Arc<str>> = FxHashSet::default();
        let Some((first, _)) = self.edges.get_key_value(start) else {
            return visited;
        };

        let mut queue = VecDeque::new();
        visited.insert(Arc::clone(first));
        queue.push_back(Arc::clone(first));

        while let Some(current) = queue.pop_front() {
            for edge in self.edges(&current) {
                if self.contains(&edge.target) && visited.insert(Arc::clone(&edge.target)) {
                    queue.push_back(Arc::clone(&edge.target));
                }
            }
        }
        visited
    }

    /// Declared tasks with some path to the terminal marker (reverse BFS)
    pub fn reaching_terminal(&self) -> FxHashSet<Arc<str>> {
        let mut visited: FxHashSet<Arc<str>> = FxHashSet::default();
        let mut queue: VecDeque<&Arc<str>> = self.predecessors(TERMINAL).iter().collect();
        for id in &queue {
            visited.insert(Arc::clone(id));
        }

        while let Some(current) = queue.pop_front() {
            for pred in self.predecessors(current) {
                if visited.insert(Arc::clone(pred)) {
                    queue.push_back(pred);
                }
            }
        }
        visited
    }

    /// Check if there's a path from `from` to `to` (BFS)
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut queue = VecDeque::from([from]);
        visited.insert(from);

        while let Some(current) = queue.pop_front() {
            for edge in self.edges(current) {
                if edge.target.as_ref() == to {
                    return true;
                }
                if visited.insert(&edge.target) {
                    queue.push_back(&edge.target);
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_source;

    fn graph(source: &str) -> WorkflowGraph {
        WorkflowGraph::from_program(&parse_source(source).unwrap())
    }

    fn sorted(set: FxHashSet<Arc<str>>) -> Vec<String> {
        let mut ids: Vec<String> = set.iter().map(|s| s.to_string()).collect();
        ids.sort();
        ids
    }

    // ═══════════════════════════════════════════════════════════════
    // EDGE CONSTRUCTION
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_linear_edges() {
        let g = graph("@task a\n    @next b\n@task b\n    @next END\n");
        assert_eq!(g.successors("a"), vec!["b"]);
        assert_eq!(g.successors("b"), vec!["END"]);
        assert_eq!(g.predecessors("b").len(), 1);
        assert_eq!(g.entry(), Some("a"));
    }

    #[test]
    fn test_fall_through_gets_implicit_terminal_edge() {
        let g = graph("@task a\n    just prose\n");
        let edges = g.edges("a");
        assert_eq!(edges.len(), 1);
        assert!(edges[0].implicit);
        assert_eq!(edges[0].target.as_ref(), TERMINAL);
    }

    #[test]
    fn test_branch_edges_included() {
        let source = "@task a\n    @if ok\n        @next b\n    @else\n        @next c\n@task b\n    @next END\n@task c\n    @next END\n";
        let g = graph(source);
        assert_eq!(g.successors("a"), vec!["b", "c"]);
        // Both branches jump, so no implicit edge
        assert!(g.edges("a").iter().all(|e| !e.implicit));
    }

    #[test]
    fn test_branch_without_else_falls_through() {
        let source = "@task a\n    @if ok\n        @next b\n@task b\n    @next END\n";
        let g = graph(source);
        assert_eq!(g.successors("a"), vec!["b", "END"]);
    }

    #[test]
    fn test_unknown_target_kept_as_edge() {
        let g = graph("@task a\n    @next ghost\n");
        assert!(!g.resolves("ghost"));
        assert!(g.resolves("END"));
        assert_eq!(g.edges("a")[0].line, 2);
    }

    // ═══════════════════════════════════════════════════════════════
    // REACHABILITY
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn test_reachable_from_entry() {
        let source = "@task a\n    @next b\n@task b\n    @next END\n@task orphan\n    @next END\n";
        let g = graph(source);
        assert_eq!(sorted(g.reachable_from("a")), vec!["a", "b"]);
    }

    #[test]
    fn test_cycle_is_reachable_not_terminating() {
        let g = graph("@task a\n    @next b\n@task b\n    @next a\n");
        assert_eq!(sorted(g.reachable_from("a")), vec!["a", "b"]);
        assert!(g.reaching_terminal().is_empty());
        assert!(g.has_path("b", "a"));
    }

    #[test]
    fn test_reaching_terminal_walks_backwards() {
        let source = "@task a\n    @next b\n@task b\n    @next c\n@task c\n    @next END\n@task loop\n    @next loop\n";
        let g = graph(source);
        assert_eq!(sorted(g.reaching_terminal()), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_has_path_to_terminal() {
        let g = graph("@task a\n    @next b\n@task b\n    done\n");
        assert!(g.has_path("a", TERMINAL));
        assert!(!g.has_path("b", "a"));
    }

    #[test]
    fn test_reachable_from_unknown_start_is_empty() {
        let g = graph("@task a\n    @next END\n");
        assert!(g.reachable_from("missing").is_empty());
    }
}
