//! Nested view of a slash-delimited key namespace
//!
//! A KV prefix listing is turned into a [`Tree`] by splitting keys on `/`;
//! a JSON document decodes straight into one. Writing back to a KV store
//! flattens the tree into `prefix/segment/...` pairs again.

mod json;
mod node;
mod trie;

pub use node::{Scalar, TreeValue, ValueMode};
pub use trie::Tree;
