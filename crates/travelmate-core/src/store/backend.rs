use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};

/// A single mutation inside a [`Batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Set(String, String),
    Remove(String),
    Clear,
}

/// An ordered group of mutations applied as one unit.
///
/// Backends must make the whole batch visible at once: a reader either sees
/// the state before the batch or the state after it, never a prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<Op>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.ops.push(Op::Set(key.to_string(), value.into()));
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        self.ops.push(Op::Remove(key.to_string()));
        self
    }

    pub fn clear(mut self) -> Self {
        self.ops.push(Op::Clear);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Apply the batch to an in-memory map.
    pub fn apply_to(&self, map: &mut BTreeMap<String, String>) {
        for op in &self.ops {
            match op {
                Op::Set(key, value) => {
                    map.insert(key.clone(), value.clone());
                }
                Op::Remove(key) => {
                    map.remove(key);
                }
                Op::Clear => map.clear(),
            }
        }
    }
}

/// Durable string key/value storage shared by everything in the process.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn keys(&self) -> Result<Vec<String>>;

    /// Apply every operation in `batch` atomically.
    fn apply(&self, batch: Batch) -> Result<()>;

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.apply(Batch::new().set(key, value))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.apply(Batch::new().remove(key))
    }

    fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let batch = keys.iter().fold(Batch::new(), |b, key| b.remove(key));
        self.apply(batch)
    }

    /// Drop every key, then write `key = value`, in one step.
    fn wipe_and_set(&self, key: &str, value: &str) -> Result<()> {
        self.apply(Batch::new().clear().set(key, value))
    }
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            entries: Mutex::new(map),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(entries.keys().cloned().collect())
    }

    fn apply(&self, batch: Batch) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))?;
        batch.apply_to(&mut entries);
        Ok(())
    }
}
