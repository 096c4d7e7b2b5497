//! SymbolTable - per-unit name resolution
//!
//! Built once by the analyzer, read-only afterward. Uses FxHashMap like the
//! rest of the graph code; iteration order never leaks into output.

use rustc_hash::FxHashMap;

use crate::ast::{CallableDecl, CallableKind, TaskDecl, VariableDecl};

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    variables: FxHashMap<String, VariableDecl>,
    tasks: FxHashMap<String, TaskDecl>,
    callables: FxHashMap<(CallableKind, String), CallableDecl>,
}

impl SymbolTable {
    pub fn variable(&self, name: &str) -> Option<&VariableDecl> {
        self.variables.get(name)
    }

    pub fn task(&self, id: &str) -> Option<&TaskDecl> {
        self.tasks.get(id)
    }

    /// First-seen declaration of a tool or agent
    pub fn callable(&self, kind: CallableKind, name: &str) -> Option<&CallableDecl> {
        self.callables.get(&(kind, name.to_string()))
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn has_task(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    /// Declared variable names, sorted
    pub fn variable_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.variables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    // Mutation is crate-private: only the analyzer builds tables

    pub(crate) fn insert_variable(&mut self, var: VariableDecl) {
        self.variables.insert(var.name.clone(), var);
    }

    pub(crate) fn insert_task(&mut self, task: TaskDecl) {
        self.tasks.insert(task.id.clone(), task);
    }

    /// Register a use; returns the earlier declaration when one exists
    pub(crate) fn register_callable(&mut self, decl: &CallableDecl) -> Option<&CallableDecl> {
        let key = (decl.kind, decl.name.clone());
        if self.callables.contains_key(&key) {
            return self.callables.get(&key);
        }
        self.callables.insert(key, decl.clone());
        None
    }
}
