//! Parsed manifest values.
//!
//! A manifest layer is a tree of [`ManifestNode`]s. Mapping keys are always
//! strings (non-string YAML keys are stringified on conversion) and are kept
//! in a `BTreeMap`, so iteration order is deterministic and independent of
//! the order keys appeared in the file.

use std::collections::BTreeMap;
use std::fmt;

use serde_yaml::Value;

/// Keyed children of a mapping node.
pub type Mapping = BTreeMap<String, ManifestNode>;

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// One node of a parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestNode {
    Null,
    Scalar(Scalar),
    Sequence(Vec<ManifestNode>),
    Mapping(Mapping),
}

impl ManifestNode {
    pub fn str(s: impl Into<String>) -> Self {
        ManifestNode::Scalar(Scalar::Str(s.into()))
    }

    pub fn int(i: i64) -> Self {
        ManifestNode::Scalar(Scalar::Int(i))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ManifestNode::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ManifestNode::Scalar(Scalar::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            ManifestNode::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[ManifestNode]> {
        match self {
            ManifestNode::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the node's shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ManifestNode::Null => "null",
            ManifestNode::Scalar(Scalar::Bool(_)) => "boolean",
            ManifestNode::Scalar(Scalar::Int(_)) => "integer",
            ManifestNode::Scalar(Scalar::Float(_)) => "float",
            ManifestNode::Scalar(Scalar::Str(_)) => "string",
            ManifestNode::Sequence(_) => "list",
            ManifestNode::Mapping(_) => "map",
        }
    }
}

impl From<Value> for ManifestNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ManifestNode::Null,
            Value::Bool(b) => ManifestNode::Scalar(Scalar::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ManifestNode::Scalar(Scalar::Int(i)),
                None => ManifestNode::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => ManifestNode::Scalar(Scalar::Str(s)),
            Value::Sequence(items) => {
                ManifestNode::Sequence(items.into_iter().map(ManifestNode::from).collect())
            }
            Value::Mapping(map) => ManifestNode::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_string(k), ManifestNode::from(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => ManifestNode::from(tagged.value),
        }
    }
}

fn key_string(key: Value) -> String {
    match key {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Tagged(tagged) => key_string(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
