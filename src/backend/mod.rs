//! Key/value backends
//!
//! The loader only needs two operations from a KV store: list everything
//! under a prefix, and put a single key. [`ConsulClient`] talks to a real
//! Consul agent; [`MemoryStore`] keeps everything in process.

#[cfg(feature = "consul")]
mod consul;
mod memory;

#[cfg(feature = "consul")]
pub use consul::ConsulClient;
pub use memory::MemoryStore;

use crate::Result;
use bytes::Bytes;

/// A single flat key/value entry as stored by the backend
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: Bytes,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        KvPair {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Trait for key/value stores the loader can read from and write to
pub trait KvStore {
    /// List every pair whose key starts with `prefix`, in store order
    ///
    /// An empty prefix lists the whole store.
    fn list(&self, prefix: &str) -> Result<Vec<KvPair>>;

    /// Write a single key
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
}
