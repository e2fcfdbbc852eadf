//! Tree value types

use super::Tree;
use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::fmt;

/// A leaf value stored in the tree
///
/// KV backends only know about byte strings, JSON files carry strings and
/// numbers. This closed set covers both sides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    /// UTF-8 text
    String(String),
    /// A whole number, written back as decimal text
    Integer(i64),
    /// Raw bytes exactly as the KV backend returned them
    Bytes(Bytes),
}

impl Scalar {
    /// Convert the value into the bytes written to the KV backend
    pub fn resolve(&self) -> Bytes {
        match self {
            Scalar::Bytes(b) => b.clone(),
            Scalar::String(s) => Bytes::copy_from_slice(s.as_bytes()),
            Scalar::Integer(i) => Bytes::from(i.to_string()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::String(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Integer(i)
    }
}

impl From<i32> for Scalar {
    fn from(i: i32) -> Self {
        Scalar::Integer(i64::from(i))
    }
}

impl From<Bytes> for Scalar {
    fn from(b: Bytes) -> Self {
        Scalar::Bytes(b)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::String(s) => serializer.serialize_str(s),
            Scalar::Integer(i) => serializer.serialize_i64(*i),
            // JSON has no byte strings
            Scalar::Bytes(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// An entry in a tree: either a leaf or a nested subtree
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TreeValue {
    Leaf(Scalar),
    Node(Tree),
}

impl TreeValue {
    pub fn as_leaf(&self) -> Option<&Scalar> {
        match self {
            TreeValue::Leaf(s) => Some(s),
            TreeValue::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&Tree> {
        match self {
            TreeValue::Node(t) => Some(t),
            TreeValue::Leaf(_) => None,
        }
    }
}

/// How raw KV values are stored when building a tree
///
/// JSON output needs text; KV to KV copies keep the bytes untouched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueMode {
    /// Convert values to strings (invalid UTF-8 is replaced)
    Text,
    /// Keep values as raw bytes
    Raw,
}

impl ValueMode {
    pub(crate) fn scalar(self, value: Bytes) -> Scalar {
        match self {
            ValueMode::Text => Scalar::String(String::from_utf8_lossy(&value).into_owned()),
            ValueMode::Raw => Scalar::Bytes(value),
        }
    }
}
