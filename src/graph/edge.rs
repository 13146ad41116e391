//! Edge representation for the knowledge graph

use super::entity::EntityId;
use super::node::{AttrValue, Attrs};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Relationship kinds carried by edges
///
/// Matches the tool-surface schema: lowercase string enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Caller function → callee function
    Calls,
    /// Importing module → imported module
    Imports,
    /// Module → entity it defines
    Defines,
    /// Subtype → supertype
    Inherits,
    /// Implementor → behaviour/interface
    Implements,
}

impl FromStr for EdgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "calls" => Ok(EdgeKind::Calls),
            "imports" => Ok(EdgeKind::Imports),
            "defines" => Ok(EdgeKind::Defines),
            "inherits" => Ok(EdgeKind::Inherits),
            "implements" => Ok(EdgeKind::Implements),
            _ => Err(format!("Unknown edge kind: {}", s)),
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EdgeKind::Calls => "calls",
            EdgeKind::Imports => "imports",
            EdgeKind::Defines => "defines",
            EdgeKind::Inherits => "inherits",
            EdgeKind::Implements => "implements",
        };
        write!(f, "{}", s)
    }
}

/// A directed, typed edge
///
/// Edges for a given `(from, to, kind)` triple form a bag, not a set: the
/// same call relationship may repeat with different call-site attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Source entity
    pub from: EntityId,
    /// Target entity
    pub to: EntityId,
    /// Relationship kind
    pub kind: EdgeKind,
    /// Additional attributes (e.g. call-site `line`)
    pub attrs: Attrs,
}

impl Edge {
    /// Create an edge with an empty attribute bag
    pub fn new(from: EntityId, to: EntityId, kind: EdgeKind) -> Self {
        Self {
            from,
            to,
            kind,
            attrs: HashMap::new(),
        }
    }

    /// Add an attribute (builder pattern)
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// The call-site `line` attribute, when present
    pub fn line(&self) -> Option<i64> {
        self.attrs.get("line").and_then(AttrValue::as_int)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_kind_parses_case_insensitively() {
        assert_eq!("Calls".parse::<EdgeKind>().unwrap(), EdgeKind::Calls);
        assert_eq!("IMPORTS".parse::<EdgeKind>().unwrap(), EdgeKind::Imports);
        assert!("belongs_to".parse::<EdgeKind>().is_err());
    }

    #[test]
    fn call_site_line_reads_from_attrs() {
        let edge = Edge::new(
            EntityId::function("A", "f", 0),
            EntityId::function("B", "g", 1),
            EdgeKind::Calls,
        )
        .with_attr("line", 42i64);
        assert_eq!(edge.line(), Some(42));
    }
}
