//! # consul_loader
//!
//! Move hierarchical configuration between Consul KV prefixes and JSON files.
//!
//! Consul stores configuration as flat, slash-delimited keys
//! (`cfg/db/host = localhost`). JSON files hold the same data as nested
//! objects (`{"db": {"host": "localhost"}}`). This crate converts between the
//! two through a [`Tree`], and copies between KV prefixes the same way.
//!
//! ## Example
//!
//! ```
//! use consul_loader::{Destination, MemoryStore, Migration, Source};
//!
//! let store = MemoryStore::with_entries([("old/db/host", "localhost")]);
//! let migration = Migration::new(
//!     Source::Key("old".into()),
//!     Destination::Key { prefix: "new".into(), rename: false },
//! );
//! migration.run(Some(&store))?;
//! assert_eq!(store.get("new/db/host").as_deref(), Some(&b"localhost"[..]));
//! # Ok::<(), consul_loader::Error>(())
//! ```

pub mod backend;
pub mod config;
pub mod migrate;
pub mod tree;

mod error;

#[cfg(feature = "consul")]
pub use backend::ConsulClient;
pub use backend::{KvPair, KvStore, MemoryStore};
pub use config::ConsulConfig;
pub use error::{Error, Result};
pub use migrate::{Destination, Migration, MigrationOptions, MigrationReport, Source};
pub use tree::{Scalar, Tree, TreeValue, ValueMode};
