//! Slash-delimited key trie

use super::{Scalar, TreeValue, ValueMode};
use crate::backend::KvPair;
use crate::{Error, Result};
use bytes::Bytes;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A nested view of a flat KV namespace
///
/// Keys like `cfg/db/host` become `{"cfg": {"db": {"host": ...}}}`. Entries
/// are kept sorted by segment, so JSON output and flattening are
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tree {
    entries: BTreeMap<String, TreeValue>,
}

impl Tree {
    /// Create an empty tree
    pub fn new() -> Self {
        Tree {
            entries: BTreeMap::new(),
        }
    }

    /// Build a tree from KV pairs, inserting them in the given order
    pub fn build<I>(pairs: I, mode: ValueMode) -> Result<Self>
    where
        I: IntoIterator<Item = KvPair>,
    {
        let mut tree = Tree::new();
        for pair in pairs {
            tree.add(&pair.key, mode.scalar(pair.value))?;
        }
        Ok(tree)
    }

    /// Insert a value at the position named by a slash-delimited key
    ///
    /// An empty key, or a key ending in `/`, stores nothing (the latter
    /// still creates the intermediate subtrees). Passing through a leaf, or
    /// writing a leaf where a subtree already lives, is a
    /// [`Error::ConflictingKeyDepth`].
    pub fn add(&mut self, key: &str, value: impl Into<Scalar>) -> Result<()> {
        let value = value.into();
        let mut node = self;
        let mut rest = key;

        while let Some((head, tail)) = rest.split_once('/') {
            node = match node
                .entries
                .entry(head.to_string())
                .or_insert_with(|| TreeValue::Node(Tree::new()))
            {
                TreeValue::Node(sub) => sub,
                TreeValue::Leaf(_) => return Err(Error::ConflictingKeyDepth(key.to_string())),
            };
            rest = tail;
        }

        if rest.is_empty() {
            return Ok(());
        }

        if let Some(TreeValue::Node(_)) = node.entries.get(rest) {
            return Err(Error::ConflictingKeyDepth(key.to_string()));
        }
        node.entries.insert(rest.to_string(), TreeValue::Leaf(value));
        Ok(())
    }

    /// Insert a leaf under a single segment, replacing whatever was there
    ///
    /// Unlike [`Tree::add`], the segment is taken literally even if it
    /// contains `/`.
    pub fn insert_leaf(&mut self, segment: impl Into<String>, value: impl Into<Scalar>) {
        self.entries
            .insert(segment.into(), TreeValue::Leaf(value.into()));
    }

    /// Insert a subtree under a single segment, replacing whatever was there
    pub fn insert_subtree(&mut self, segment: impl Into<String>, subtree: Tree) {
        self.entries.insert(segment.into(), TreeValue::Node(subtree));
    }

    /// Look up the entry at a slash-delimited key
    pub fn get(&self, key: &str) -> Option<&TreeValue> {
        let mut node = self;
        let mut rest = key;
        while let Some((head, tail)) = rest.split_once('/') {
            node = node.entries.get(head)?.as_node()?;
            rest = tail;
        }
        node.entries.get(rest)
    }

    /// Number of top-level entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of leaves in the whole tree
    pub fn leaf_count(&self) -> usize {
        self.entries
            .values()
            .map(|v| match v {
                TreeValue::Leaf(_) => 1,
                TreeValue::Node(sub) => sub.leaf_count(),
            })
            .sum()
    }

    /// Flatten every leaf into `base/<path>` KV pairs
    pub fn flatten(&self, base: &str) -> Vec<(String, Bytes)> {
        let mut out = Vec::new();
        self.flatten_into(normalize_base(base), &mut out);
        out
    }

    /// Flatten in rename mode
    ///
    /// Top-level subtrees are flattened directly under `base` (their own
    /// segment is dropped). Top-level leaves land at `base/<segment>`.
    pub fn flatten_renamed(&self, base: &str) -> Vec<(String, Bytes)> {
        let base = normalize_base(base);
        let mut out = Vec::new();
        for (segment, value) in &self.entries {
            match value {
                TreeValue::Node(sub) => sub.flatten_into(base, &mut out),
                TreeValue::Leaf(scalar) => out.push((join_key(base, segment), scalar.resolve())),
            }
        }
        out
    }

    fn flatten_into(&self, base: &str, out: &mut Vec<(String, Bytes)>) {
        for (segment, value) in &self.entries {
            let key = join_key(base, segment);
            match value {
                TreeValue::Node(sub) => sub.flatten_into(&key, out),
                TreeValue::Leaf(scalar) => out.push((key, scalar.resolve())),
            }
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        for (segment, value) in &self.entries {
            match value {
                TreeValue::Node(sub) => {
                    writeln!(f, "{:indent$}{}:", "", segment, indent = depth * 2)?;
                    sub.fmt_indented(f, depth + 1)?;
                }
                TreeValue::Leaf(scalar) => {
                    writeln!(f, "{:indent$}{}: {}", "", segment, scalar, indent = depth * 2)?
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

fn normalize_base(base: &str) -> &str {
    base.trim_matches('/')
}

fn join_key(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", base, segment)
    }
}
