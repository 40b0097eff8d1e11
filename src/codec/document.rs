//! # Wire Document Builder
//!
//! Thin layer over `serde_json::Value` used by every encoder.
//!
//! Each builder has a node budget standing in for the device heap: creating a
//! node beyond the budget fails the same way an allocation would. Nodes own
//! their subtrees, so a document abandoned on any error path is released when
//! it goes out of scope.

use bytes::Bytes;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::protocol::{KEY_REPORTED, KEY_STATE, KEY_TIMESTAMP, KEY_VALUE};
use crate::error::{Result, TrackerError};

/// Document construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    /// Node budget exhausted
    #[error("node limit of {limit} reached")]
    NodeLimit { limit: usize },

    /// JSON cannot carry NaN or infinity
    #[error("non-finite number for key '{0}'")]
    NonFinite(String),

    /// Attach target is not an object or array
    #[error("cannot attach '{0}' to a scalar node")]
    NotAContainer(String),

    /// Key already present in the parent object
    #[error("duplicate key '{0}'")]
    DuplicateKey(String),
}

impl DocumentError {
    /// Failure while creating the skeleton of a document
    pub fn allocation(self) -> TrackerError {
        TrackerError::AllocationFailure(self.to_string())
    }

    /// Failure while attaching fields to an already created skeleton
    pub fn assembly(self) -> TrackerError {
        TrackerError::RetryableAssembly(self.to_string())
    }
}

/// Result type for builder primitives
pub type DocResult<T> = std::result::Result<T, DocumentError>;

/// One owned node of a document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Node(Value);

impl Node {
    /// Attach `child` under `key`. Fails if this node is not an object or
    /// already holds `key`.
    pub fn insert(&mut self, key: &str, child: Node) -> DocResult<()> {
        let Value::Object(map) = &mut self.0 else {
            return Err(DocumentError::NotAContainer(key.to_string()));
        };
        if map.contains_key(key) {
            return Err(DocumentError::DuplicateKey(key.to_string()));
        }
        map.insert(key.to_string(), child.0);
        Ok(())
    }

    /// Append `child` to this array node
    pub fn push(&mut self, child: Node) -> DocResult<()> {
        let Value::Array(items) = &mut self.0 else {
            return Err(DocumentError::NotAContainer("[]".to_string()));
        };
        items.push(child.0);
        Ok(())
    }

    /// Number of members (objects) or elements (arrays); 0 for scalars
    pub fn len(&self) -> usize {
        match &self.0 {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the underlying value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Unwrap into the underlying value
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Creates nodes against a fixed node budget
#[derive(Debug)]
pub struct DocumentBuilder {
    limit: usize,
    allocated: usize,
}

impl DocumentBuilder {
    /// Create a builder allowing at most `limit` nodes
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            allocated: 0,
        }
    }

    /// Nodes created so far
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    fn reserve(&mut self, nodes: usize) -> DocResult<()> {
        if self.allocated + nodes > self.limit {
            return Err(DocumentError::NodeLimit { limit: self.limit });
        }
        self.allocated += nodes;
        Ok(())
    }

    pub fn object(&mut self) -> DocResult<Node> {
        self.reserve(1)?;
        Ok(Node(Value::Object(Map::new())))
    }

    pub fn array(&mut self) -> DocResult<Node> {
        self.reserve(1)?;
        Ok(Node(Value::Array(Vec::new())))
    }

    /// Create a number node. `key` only labels the error.
    pub fn number(&mut self, key: &str, value: f64) -> DocResult<Node> {
        let number =
            Number::from_f64(value).ok_or_else(|| DocumentError::NonFinite(key.to_string()))?;
        self.reserve(1)?;
        Ok(Node(Value::Number(number)))
    }

    pub fn integer(&mut self, value: i64) -> DocResult<Node> {
        self.reserve(1)?;
        Ok(Node(Value::Number(value.into())))
    }

    pub fn boolean(&mut self, value: bool) -> DocResult<Node> {
        self.reserve(1)?;
        Ok(Node(Value::Bool(value)))
    }

    pub fn string(&mut self, value: &str) -> DocResult<Node> {
        self.reserve(1)?;
        Ok(Node(Value::String(value.to_string())))
    }

    /// Array of numbers, one node per element plus the array itself
    pub fn number_array(&mut self, key: &str, values: &[f64]) -> DocResult<Node> {
        let mut items = Vec::with_capacity(values.len());
        for &value in values {
            let number =
                Number::from_f64(value).ok_or_else(|| DocumentError::NonFinite(key.to_string()))?;
            items.push(Value::Number(number));
        }
        self.reserve(1 + values.len())?;
        Ok(Node(Value::Array(items)))
    }

    pub fn add_number(&mut self, parent: &mut Node, key: &str, value: f64) -> DocResult<()> {
        let node = self.number(key, value)?;
        parent.insert(key, node)
    }

    pub fn add_integer(&mut self, parent: &mut Node, key: &str, value: i64) -> DocResult<()> {
        let node = self.integer(value)?;
        parent.insert(key, node)
    }

    pub fn add_bool(&mut self, parent: &mut Node, key: &str, value: bool) -> DocResult<()> {
        let node = self.boolean(value)?;
        parent.insert(key, node)
    }

    pub fn add_str(&mut self, parent: &mut Node, key: &str, value: &str) -> DocResult<()> {
        let node = self.string(value)?;
        parent.insert(key, node)
    }

    /// Build `{"v": value, "ts": timestamp}`
    pub fn timestamped(&mut self, value: Node, timestamp_ms: i64) -> DocResult<Node> {
        let mut entry = self.object()?;
        entry.insert(KEY_VALUE, value)?;
        self.add_integer(&mut entry, KEY_TIMESTAMP, timestamp_ms)?;
        Ok(entry)
    }

    /// Wrap `reported` as `{"state": {"reported": reported}}`
    pub fn wrap_reported(&mut self, reported: Node) -> DocResult<Node> {
        let mut state = self.object()?;
        state.insert(KEY_REPORTED, reported)?;
        let mut root = self.object()?;
        root.insert(KEY_STATE, state)?;
        Ok(root)
    }
}

/// Serialize a finished document into the buffer handed to the transport
pub fn serialize(root: Node) -> Result<Bytes> {
    let buffer = serde_json::to_vec_pretty(&root.0)
        .map_err(|e| TrackerError::RetryableAssembly(format!("serialization failed: {}", e)))?;
    Ok(Bytes::from(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_limit_enforced() {
        let mut builder = DocumentBuilder::new(2);
        assert!(builder.object().is_ok());
        assert!(builder.array().is_ok());
        assert_eq!(
            builder.object().unwrap_err(),
            DocumentError::NodeLimit { limit: 2 }
        );
        assert_eq!(builder.allocated(), 2);
    }

    #[test]
    fn test_number_array_counts_every_element() {
        let mut builder = DocumentBuilder::new(4);
        let array = builder.number_array("v", &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(builder.allocated(), 4);
        assert!(builder.boolean(true).is_err());
    }

    #[test]
    fn test_non_finite_number_rejected() {
        let mut builder = DocumentBuilder::new(8);
        let err = builder.number("lat", f64::NAN).unwrap_err();
        assert_eq!(err, DocumentError::NonFinite("lat".to_string()));
        assert_eq!(builder.allocated(), 0);
    }

    #[test]
    fn test_insert_duplicate_key_rejected() {
        let mut builder = DocumentBuilder::new(8);
        let mut obj = builder.object().unwrap();
        builder.add_integer(&mut obj, "ts", 1).unwrap();
        let err = builder.add_integer(&mut obj, "ts", 2).unwrap_err();
        assert_eq!(err, DocumentError::DuplicateKey("ts".to_string()));
        assert_eq!(obj.as_value()["ts"], 1);
    }

    #[test]
    fn test_insert_into_scalar_rejected() {
        let mut builder = DocumentBuilder::new(8);
        let mut scalar = builder.boolean(true).unwrap();
        let child = builder.integer(1).unwrap();
        assert!(matches!(
            scalar.insert("x", child),
            Err(DocumentError::NotAContainer(_))
        ));
        let child = builder.integer(1).unwrap();
        assert!(scalar.push(child).is_err());
    }

    #[test]
    fn test_timestamped_and_wrap_reported() {
        let mut builder = DocumentBuilder::new(16);
        let value = builder.integer(3700).unwrap();
        let entry = builder.timestamped(value, 1_000).unwrap();
        let mut reported = builder.object().unwrap();
        reported.insert("bat", entry).unwrap();
        let root = builder.wrap_reported(reported).unwrap();

        assert_eq!(
            root.as_value(),
            &serde_json::json!({"state": {"reported": {"bat": {"v": 3700, "ts": 1000}}}})
        );
    }

    #[test]
    fn test_serialize_round_trips() {
        let mut builder = DocumentBuilder::new(8);
        let mut root = builder.object().unwrap();
        builder.add_str(&mut root, "nw", "LTE-M").unwrap();
        let bytes = serialize(root).unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["nw"], "LTE-M");
    }
}
