//! Conversion between trees and JSON documents

use super::{Scalar, Tree};
use crate::{Error, Result};
use serde_json::{Map, Number, Value};

impl Tree {
    /// Convert a decoded JSON document into a tree
    ///
    /// The root must be an object. Strings and whole numbers become leaves,
    /// objects become subtrees. Anything else fails with
    /// [`Error::UnsupportedValueType`] naming the path of the value.
    pub fn from_json_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => object_to_tree(map, ""),
            other => Err(Error::JsonDecode(format!(
                "expected an object at the root, found {}",
                value_kind(&other)
            ))),
        }
    }

    /// Decode JSON text into a tree
    pub fn from_json_slice(data: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(data).map_err(|e| Error::JsonDecode(e.to_string()))?;
        Self::from_json_value(value)
    }

    /// Decode a JSON string into a tree
    pub fn from_json_str(data: &str) -> Result<Self> {
        Self::from_json_slice(data.as_bytes())
    }

    /// Encode the tree as compact JSON
    pub fn to_json_vec(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

fn object_to_tree(map: Map<String, Value>, parent: &str) -> Result<Tree> {
    let mut tree = Tree::new();
    for (segment, value) in map {
        let path = if parent.is_empty() {
            segment.clone()
        } else {
            format!("{}/{}", parent, segment)
        };
        match value {
            Value::Object(child) => {
                let subtree = object_to_tree(child, &path)?;
                tree.insert_subtree(segment, subtree);
            }
            Value::String(s) => tree.insert_leaf(segment, Scalar::String(s)),
            Value::Number(n) => tree.insert_leaf(segment, number_to_scalar(&n, &path)?),
            other => {
                return Err(Error::UnsupportedValueType {
                    path,
                    kind: value_kind(&other),
                })
            }
        }
    }
    Ok(tree)
}

fn number_to_scalar(n: &Number, path: &str) -> Result<Scalar> {
    if let Some(i) = n.as_i64() {
        return Ok(Scalar::Integer(i));
    }

    let unsupported = |kind| Error::UnsupportedValueType {
        path: path.to_string(),
        kind,
    };

    // `i64::MAX as f64` rounds up to 2^63, hence the strict bound
    match n.as_f64() {
        Some(f) if f.fract() != 0.0 => Err(unsupported("fractional number")),
        Some(f) if f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(Scalar::Integer(f as i64)),
        _ => Err(unsupported("number out of range")),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
