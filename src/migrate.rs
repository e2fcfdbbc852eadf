//! One migration run: read a source, write a destination
//!
//! A source is either a KV prefix or a JSON file, and so is a destination.
//! Whatever the combination, data passes through a [`Tree`].

use crate::backend::{KvPair, KvStore};
use crate::tree::{Tree, ValueMode};
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Raw command-line style options, before validation
#[derive(Clone, Debug, Default)]
pub struct MigrationOptions {
    pub src_key: Option<String>,
    pub src_json: Option<PathBuf>,
    pub dest_key: Option<String>,
    pub dest_json: Option<PathBuf>,
    pub rename: bool,
}

/// Where data is read from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Every key under a KV prefix
    Key(String),
    /// A JSON document on disk
    Json(PathBuf),
}

/// Where data is written to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// Leaves are written under a KV prefix
    Key { prefix: String, rename: bool },
    /// The tree is written as one JSON document
    Json(PathBuf),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Key(prefix) => write!(f, "key {}", prefix),
            Source::Json(path) => write!(f, "file {}", path.display()),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Key {
                prefix,
                rename: false,
            } => write!(f, "key {}", prefix),
            Destination::Key {
                prefix,
                rename: true,
            } => write!(f, "key {} (rename)", prefix),
            Destination::Json(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// Summary of a finished run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationReport {
    pub source: Source,
    pub destination: Destination,
    /// Leaves written to the destination
    pub leaves: usize,
}

/// A validated source/destination pair
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Migration {
    pub source: Source,
    pub destination: Destination,
}

impl Migration {
    pub fn new(source: Source, destination: Destination) -> Self {
        Migration {
            source,
            destination,
        }
    }

    /// Validate options: exactly one source and exactly one destination
    ///
    /// Empty strings count as unset.
    pub fn from_options(opts: &MigrationOptions) -> Result<Self> {
        let src_key = opts.src_key.clone().filter(|k| !k.is_empty());
        let src_json = opts.src_json.clone().filter(|p| !p.as_os_str().is_empty());
        let dest_key = opts.dest_key.clone().filter(|k| !k.is_empty());
        let dest_json = opts.dest_json.clone().filter(|p| !p.as_os_str().is_empty());

        let source = match (src_key, src_json) {
            (Some(key), None) => Source::Key(key),
            (None, Some(path)) => Source::Json(path),
            _ => {
                return Err(Error::InvalidArguments(
                    "Either the source key or JSON flag must be utilized".into(),
                ))
            }
        };

        let destination = match (dest_key, dest_json) {
            (Some(prefix), None) => Destination::Key {
                prefix,
                rename: opts.rename,
            },
            (None, Some(path)) => {
                if opts.rename {
                    warn!("--rename only applies to a key destination, ignoring it");
                }
                Destination::Json(path)
            }
            _ => {
                return Err(Error::InvalidArguments(
                    "Either the destination key or JSON flag must be utilized".into(),
                ))
            }
        };

        Ok(Migration::new(source, destination))
    }

    /// Whether either side talks to a KV backend
    pub fn needs_backend(&self) -> bool {
        matches!(self.source, Source::Key(_)) || matches!(self.destination, Destination::Key { .. })
    }

    /// How KV values are held in the tree: text for JSON output, raw bytes otherwise
    pub fn value_mode(&self) -> ValueMode {
        match self.destination {
            Destination::Json(_) => ValueMode::Text,
            Destination::Key { .. } => ValueMode::Raw,
        }
    }

    /// Load the source into a tree
    pub fn read(&self, store: Option<&dyn KvStore>) -> Result<Tree> {
        match &self.source {
            Source::Key(prefix) => read_kv_tree(require(store)?, prefix, self.value_mode()),
            Source::Json(path) => read_json_file(path),
        }
    }

    /// Write a tree to the destination, returning the number of leaves written
    pub fn write(&self, tree: &Tree, store: Option<&dyn KvStore>) -> Result<usize> {
        match &self.destination {
            Destination::Key { prefix, rename } => {
                // A tree read from a KV prefix is already relative to it, so the
                // prefix is the single top-level key being renamed
                let rename = *rename && !matches!(self.source, Source::Key(_));
                put_kv_tree(require(store)?, tree, prefix, rename)
            }
            Destination::Json(path) => {
                write_json_file(tree, path)?;
                Ok(tree.leaf_count())
            }
        }
    }

    /// Read the source and write it to the destination
    ///
    /// Writes to a KV destination are not transactional: a failure leaves
    /// the keys written before it in place.
    pub fn run(&self, store: Option<&dyn KvStore>) -> Result<MigrationReport> {
        info!(source = %self.source, destination = %self.destination, "starting migration");

        let tree = self.read(store)?;
        debug!("source tree:\n{}", tree);
        if tree.is_empty() {
            warn!(source = %self.source, "source holds no values");
        }

        let leaves = self.write(&tree, store)?;
        info!(leaves, "migration complete");

        Ok(MigrationReport {
            source: self.source.clone(),
            destination: self.destination.clone(),
            leaves,
        })
    }
}

fn require(store: Option<&dyn KvStore>) -> Result<&dyn KvStore> {
    store.ok_or_else(|| Error::BackendConnection("no KV backend configured".into()))
}

/// List a KV prefix and build a tree relative to it
///
/// The prefix names a directory: a listing of `cfg` also returns `cfgx/...`
/// from the backend, and those keys are skipped. Fails with
/// [`Error::SourceNotFound`] when nothing lives under the prefix.
pub fn read_kv_tree(store: &dyn KvStore, prefix: &str, mode: ValueMode) -> Result<Tree> {
    let listed = store.list(prefix)?;
    let count = listed.len();

    let pairs: Vec<KvPair> = listed
        .into_iter()
        .filter_map(|pair| {
            let key = relative_key(prefix, &pair.key)?.to_string();
            Some(KvPair {
                key,
                value: pair.value,
            })
        })
        .collect();
    if pairs.is_empty() {
        return Err(Error::SourceNotFound(prefix.to_string()));
    }
    debug!(prefix, count, kept = pairs.len(), "listed source keys");

    Tree::build(pairs, mode)
}

/// Flatten a tree under `prefix` and put every leaf, stopping at the first failure
pub fn put_kv_tree(store: &dyn KvStore, tree: &Tree, prefix: &str, rename: bool) -> Result<usize> {
    let pairs = if rename {
        tree.flatten_renamed(prefix)
    } else {
        tree.flatten(prefix)
    };

    for (key, value) in &pairs {
        info!(key = %key, "writing key");
        debug!(key = %key, value = %String::from_utf8_lossy(value), "value");
        store.put(key, value)?;
    }
    Ok(pairs.len())
}

/// Read and decode a JSON document into a tree
pub fn read_json_file(path: &Path) -> Result<Tree> {
    let data = std::fs::read(path).map_err(|e| with_path(e, "Failed to open", path))?;
    Tree::from_json_slice(&data).map_err(|e| match e {
        Error::JsonDecode(msg) => Error::JsonDecode(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Encode a tree as compact JSON and write it to `path`
pub fn write_json_file(tree: &Tree, path: &Path) -> Result<()> {
    let data = tree.to_json_vec()?;
    std::fs::write(path, data).map_err(|e| with_path(e, "Failed to write", path))?;
    Ok(())
}

fn with_path(err: std::io::Error, action: &str, path: &Path) -> Error {
    Error::Io(std::io::Error::new(
        err.kind(),
        format!("{} {}: {}", action, path.display(), err),
    ))
}

/// Strip the source prefix from a key
///
/// Keys under `prefix/` lose that part; a key equal to the prefix keeps its
/// last segment. Keys that only share a string prefix (`cfgx/a` for `cfg`)
/// are not part of the directory and give `None`.
pub fn relative_key<'a>(prefix: &str, key: &'a str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return Some(key);
    }

    match key.strip_prefix(prefix)? {
        "" => Some(&key[prefix.rfind('/').map(|i| i + 1).unwrap_or(0)..]),
        rest => rest.strip_prefix('/'),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStore;
    use crate::tree::Scalar;

    fn options() -> MigrationOptions {
        MigrationOptions::default()
    }

    #[test]
    fn test_from_options_valid() {
        let migration = Migration::from_options(&MigrationOptions {
            src_key: Some("cfg".into()),
            dest_json: Some("/tmp/out.json".into()),
            ..options()
        })
        .unwrap();

        assert_eq!(migration.source, Source::Key("cfg".into()));
        assert_eq!(migration.destination, Destination::Json("/tmp/out.json".into()));
        assert_eq!(migration.value_mode(), ValueMode::Text);
        assert!(migration.needs_backend());
    }

    #[test]
    fn test_from_options_rejects_both_or_neither() {
        let cases = [
            MigrationOptions {
                dest_key: Some("b".into()),
                ..options()
            },
            MigrationOptions {
                src_key: Some("a".into()),
                src_json: Some("a.json".into()),
                dest_key: Some("b".into()),
                ..options()
            },
            MigrationOptions {
                src_key: Some("a".into()),
                ..options()
            },
            MigrationOptions {
                src_key: Some("a".into()),
                dest_key: Some("b".into()),
                dest_json: Some("b.json".into()),
                ..options()
            },
            MigrationOptions {
                src_key: Some(String::new()),
                dest_key: Some("b".into()),
                ..options()
            },
        ];

        for opts in &cases {
            assert!(
                matches!(Migration::from_options(opts), Err(Error::InvalidArguments(_))),
                "expected InvalidArguments for {:?}",
                opts
            );
        }
    }

    #[test]
    fn test_json_to_json_needs_no_backend() {
        let migration = Migration::new(Source::Json("a".into()), Destination::Json("b".into()));
        assert!(!migration.needs_backend());

        let migration = Migration::new(
            Source::Json("a".into()),
            Destination::Key {
                prefix: "app".into(),
                rename: false,
            },
        );
        assert_eq!(migration.value_mode(), ValueMode::Raw);
        let err = migration.write(&Tree::new(), None).unwrap_err();
        assert!(matches!(err, Error::BackendConnection(_)));
    }

    #[test]
    fn test_relative_key() {
        assert_eq!(relative_key("cfg", "cfg/db/host"), Some("db/host"));
        assert_eq!(relative_key("cfg/", "cfg/db/host"), Some("db/host"));
        assert_eq!(relative_key("cfg", "cfg/"), Some(""));
        assert_eq!(relative_key("cfg/db/host", "cfg/db/host"), Some("host"));
        assert_eq!(relative_key("", "a/b"), Some("a/b"));
    }

    #[test]
    fn test_relative_key_skips_string_prefix_siblings() {
        assert_eq!(relative_key("cfg", "cfgx/other"), None);
        assert_eq!(relative_key("cfg/d", "cfg/db/host"), None);
        assert_eq!(relative_key("cfg/", "cfgx"), None);
    }

    #[test]
    fn test_read_kv_tree_ignores_sibling_directories() {
        let store = MemoryStore::with_entries([
            ("cfg/cfgx/a", "nested"),
            ("cfgx", "flat"),
            ("cfgx/other", "x"),
        ]);
        let tree = read_kv_tree(&store, "cfg", ValueMode::Text).unwrap();
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(
            tree.get("cfgx/a").unwrap().as_leaf(),
            Some(&Scalar::from("nested"))
        );

        let err = read_kv_tree(&store, "cf", ValueMode::Text).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(ref p) if p == "cf"));
    }

    #[test]
    fn test_read_kv_tree_missing_prefix() {
        let store = MemoryStore::with_entries([("other/k", "v")]);
        let err = read_kv_tree(&store, "cfg", ValueMode::Text).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(ref p) if p == "cfg"));
    }

    #[test]
    fn test_read_kv_tree_skips_folder_keys() {
        let store = MemoryStore::with_entries([
            ("cfg/", ""),
            ("cfg/db/", ""),
            ("cfg/db/host", "localhost"),
        ]);
        let tree = read_kv_tree(&store, "cfg", ValueMode::Text).unwrap();
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(
            tree.get("db/host").unwrap().as_leaf(),
            Some(&Scalar::from("localhost"))
        );
    }

    #[test]
    fn test_put_kv_tree_stops_at_failure() {
        let store = MemoryStore::new();
        store.set_read_only(true);

        let mut tree = Tree::new();
        tree.add("a", "1").unwrap();
        tree.add("b", "2").unwrap();

        let err = put_kv_tree(&store, &tree, "app", false).unwrap_err();
        assert!(matches!(err, Error::BackendWrite { ref key, .. } if key == "app/a"));
    }

    #[test]
    fn test_put_kv_tree_keeps_values_out_of_info_logs() {
        use std::io::Write;
        use std::sync::Arc;
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone, Default)]
        struct Captured(Arc<parking_lot::Mutex<Vec<u8>>>);

        impl Write for Captured {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl<'a> MakeWriter<'a> for Captured {
            type Writer = Captured;

            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(captured.clone())
            .finish();

        let store = MemoryStore::new();
        let mut tree = Tree::new();
        tree.add("token", "hunter2").unwrap();

        tracing::subscriber::with_default(subscriber, || {
            put_kv_tree(&store, &tree, "app", false).unwrap();
        });

        let logged = String::from_utf8_lossy(&captured.0.lock()).into_owned();
        assert!(logged.contains("app/token"));
        assert!(!logged.contains("hunter2"));
        assert_eq!(store.get("app/token").as_deref(), Some(&b"hunter2"[..]));
    }

    #[test]
    fn test_kv_to_kv_keeps_raw_bytes() {
        let store = MemoryStore::with_entries([(
            "old/blob".to_string(),
            bytes::Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        )]);
        let migration = Migration::new(
            Source::Key("old".into()),
            Destination::Key {
                prefix: "new".into(),
                rename: false,
            },
        );

        let report = migration.run(Some(&store)).unwrap();
        assert_eq!(report.leaves, 1);
        assert_eq!(
            store.get("new/blob").as_deref(),
            Some(&[0xde, 0xad, 0xbe, 0xef][..])
        );
    }

    #[test]
    fn test_read_json_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.json");
        assert!(matches!(read_json_file(&missing), Err(Error::Io(_))));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        match read_json_file(&bad) {
            Err(Error::JsonDecode(msg)) => assert!(msg.contains("bad.json")),
            other => panic!("expected JsonDecode, got {:?}", other),
        }
    }
}
