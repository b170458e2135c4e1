//! Scoped variable storage (§3: "Variables written with `scope=global` are
//! visible to all nested sub-workflow contexts of the same root execution;
//! `scope=local` variables are visible only within the writing context.").
//!
//! A sub-workflow context holds its own `VariableStore` for locals and an
//! `Arc<RwLock<..>>` handle to the root's globals, grounded on the
//! teacher's `Arc<RwLock<..>>`-per-resource pattern in
//! `execution/src/context.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use relay_workflow::VariableScope;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct VariableEntry {
    pub value: Value,
    pub scope: VariableScope,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Locals {
    entries: HashMap<String, VariableEntry>,
}

pub struct VariableStore {
    locals: RwLock<Locals>,
    globals: Arc<RwLock<Locals>>,
}

impl VariableStore {
    /// Creates a fresh root store; its globals table is shared with every
    /// `child()` derived from it.
    #[must_use]
    pub fn new_root() -> Self {
        Self {
            locals: RwLock::new(Locals::default()),
            globals: Arc::new(RwLock::new(Locals::default())),
        }
    }

    /// Creates a sub-workflow-scoped store that writes its own locals but
    /// shares this store's globals table.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            locals: RwLock::new(Locals::default()),
            globals: Arc::clone(&self.globals),
        }
    }

    pub fn set(&self, name: impl Into<String>, value: Value, scope: VariableScope) {
        let entry = VariableEntry {
            value,
            scope,
            ts: Utc::now(),
        };
        match scope {
            VariableScope::Local => {
                self.locals.write().entries.insert(name.into(), entry);
            }
            VariableScope::Global => {
                self.globals.write().entries.insert(name.into(), entry);
            }
        }
    }

    /// Looks up `name`, preferring a local binding over a global one of the
    /// same name when `scope` is unspecified.
    pub fn get(&self, name: &str, scope: Option<VariableScope>) -> Option<Value> {
        match scope {
            Some(VariableScope::Local) => self.locals.read().entries.get(name).map(|e| e.value.clone()),
            Some(VariableScope::Global) => self.globals.read().entries.get(name).map(|e| e.value.clone()),
            None => {
                if let Some(entry) = self.locals.read().entries.get(name) {
                    return Some(entry.value.clone());
                }
                self.globals.read().entries.get(name).map(|e| e.value.clone())
            }
        }
    }

    /// Snapshot of every variable visible from this store (locals override
    /// same-named globals), used to build an expression evaluation context.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        let mut out: HashMap<String, Value> = self
            .globals
            .read()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect();
        for (k, v) in &self.locals.read().entries {
            out.insert(k.clone(), v.value.clone());
        }
        out
    }
}

impl Default for VariableStore {
    fn default() -> Self {
        Self::new_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn local_write_not_visible_to_child_before_promotion() {
        let root = VariableStore::new_root();
        root.set("a", json!(1), VariableScope::Local);
        let child = root.child();
        assert_eq!(child.get("a", None), None);
    }

    #[test]
    fn global_write_is_visible_to_children() {
        let root = VariableStore::new_root();
        root.set("g", json!("shared"), VariableScope::Global);
        let child = root.child();
        assert_eq!(child.get("g", None), Some(json!("shared")));
    }

    #[test]
    fn local_shadows_global_of_same_name() {
        let root = VariableStore::new_root();
        root.set("x", json!("global"), VariableScope::Global);
        root.set("x", json!("local"), VariableScope::Local);
        assert_eq!(root.get("x", None), Some(json!("local")));
    }

    #[test]
    fn snapshot_merges_globals_and_locals() {
        let root = VariableStore::new_root();
        root.set("g", json!(1), VariableScope::Global);
        root.set("l", json!(2), VariableScope::Local);
        let snap = root.snapshot();
        assert_eq!(snap.get("g"), Some(&json!(1)));
        assert_eq!(snap.get("l"), Some(&json!(2)));
    }
}
