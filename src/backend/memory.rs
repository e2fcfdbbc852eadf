//! In-process KV store

use super::{KvPair, KvStore};
use crate::{Error, Result};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// A KV store kept entirely in memory
///
/// Listing returns keys in lexical order, like Consul does. Every
/// successful put is also appended to a write log so callers can check
/// what was written and in which order.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Bytes>>,
    writes: RwLock<Vec<KvPair>>,
    read_only: RwLock<bool>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with string values
    pub fn with_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Bytes>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        MemoryStore {
            entries: RwLock::new(map),
            ..Default::default()
        }
    }

    /// Reject every subsequent put with a write error
    pub fn set_read_only(&self, read_only: bool) {
        *self.read_only.write() = read_only;
    }

    /// Get the current value of a key
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.read().get(key).cloned()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All successful puts, oldest first
    pub fn writes(&self) -> Vec<KvPair> {
        self.writes.read().clone()
    }
}

impl KvStore for MemoryStore {
    fn list(&self, prefix: &str) -> Result<Vec<KvPair>> {
        let entries = self.entries.read();
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| KvPair::new(k.clone(), v.clone()))
            .collect())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        if *self.read_only.read() {
            return Err(Error::BackendWrite {
                key: key.to_string(),
                reason: "store is read-only".into(),
            });
        }

        let value = Bytes::copy_from_slice(value);
        self.entries
            .write()
            .insert(key.to_string(), value.clone());
        self.writes.write().push(KvPair::new(key, value));
        Ok(())
    }
}
