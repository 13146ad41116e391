//! Node representation in the knowledge graph

use super::entity::{EntityId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Typed attribute values
///
/// Externally tagged for serde so the binary cache can decode them; the
/// tool surface renders them through [`AttrValue::to_json`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl AttrValue {
    /// Plain JSON value for the tool surface
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            AttrValue::String(s) => serde_json::Value::String(s.clone()),
            AttrValue::Int(n) => serde_json::Value::from(*n),
            AttrValue::Float(f) => serde_json::Value::from(*f),
            AttrValue::Bool(b) => serde_json::Value::Bool(*b),
        }
    }
    /// The string payload, if this value is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The integer payload, if this value is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean payload, if this value is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Bool(b)
    }
}

/// Attribute collection (insertion order is irrelevant)
pub type Attrs = HashMap<String, AttrValue>;

/// Function visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            _ => Err(format!("Unknown visibility: {}", s)),
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// A node in the knowledge graph
///
/// Required attributes: `file` (absolute path) and, except for synthetic
/// nodes, `line` (1-based). Function nodes additionally carry `visibility`
/// and language-specific `doc` text. Unresolved call targets become
/// synthetic nodes flagged `external = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Stable identifier
    pub id: EntityId,
    /// Attribute bag
    pub attrs: Attrs,
}

impl Node {
    /// Create a node with an empty attribute bag
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            attrs: HashMap::new(),
        }
    }

    /// Add an attribute (builder pattern)
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// The kind of entity this node represents
    pub fn kind(&self) -> NodeKind {
        self.id.kind()
    }

    /// The `file` attribute (absolute path of the defining file)
    pub fn file(&self) -> Option<&str> {
        self.attrs.get("file").and_then(AttrValue::as_str)
    }

    /// The `line` attribute (1-based; absent for synthetic nodes)
    pub fn line(&self) -> Option<i64> {
        self.attrs.get("line").and_then(AttrValue::as_int)
    }

    /// The `doc` attribute
    pub fn doc(&self) -> Option<&str> {
        self.attrs.get("doc").and_then(AttrValue::as_str)
    }

    /// The `visibility` attribute, parsed
    pub fn visibility(&self) -> Option<Visibility> {
        self.attrs
            .get("visibility")
            .and_then(AttrValue::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Whether this is a synthetic node for an unresolved external entity
    pub fn is_external(&self) -> bool {
        self.attrs
            .get("external")
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }

    /// Attribute bag as plain JSON for the tool surface
    pub fn attrs_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.attrs
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_accessors_read_typed_values() {
        let node = Node::new(EntityId::function("M", "f", 1))
            .with_attr("file", "/srv/app/lib/m.ex")
            .with_attr("line", 12i64)
            .with_attr("visibility", "public")
            .with_attr("doc", "Does the thing.");

        assert_eq!(node.file(), Some("/srv/app/lib/m.ex"));
        assert_eq!(node.line(), Some(12));
        assert_eq!(node.visibility(), Some(Visibility::Public));
        assert_eq!(node.doc(), Some("Does the thing."));
        assert!(!node.is_external());
    }

    #[test]
    fn external_flag_defaults_false() {
        let node = Node::new(EntityId::function("Ext", "call", 0));
        assert!(!node.is_external());
        let node = node.with_attr("external", true);
        assert!(node.is_external());
    }

    #[test]
    fn missing_line_is_none_for_synthetic_nodes() {
        let node = Node::new(EntityId::module("M")).with_attr("file", "/a.ex");
        assert_eq!(node.line(), None);
    }
}
