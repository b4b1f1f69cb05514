use serde_json::Value;
use std::collections::HashMap;

/// Per-chain key/value store, valid for the lifetime of the chain.
///
/// Lets one task stash values for tasks further down the chain without
/// threading them through the single previous-value slot. Not internally
/// synchronized: at most one task of a chain executes at any instant, and
/// the chain guards access with its own lock.
#[derive(Debug, Default)]
pub struct TaskData {
    entries: HashMap<String, Value>,
}

impl TaskData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    /// Insert a value, returning the previous value for the key if any.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
