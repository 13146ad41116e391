//! Stable entity identifiers for the knowledge graph

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of entity an [`EntityId`] names
///
/// Matches the tool-surface schema: lowercase string enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A module (canonical name)
    Module,
    /// A function (owning module, name, arity)
    Function,
    /// A source file (absolute path)
    File,
    /// A named type (reserved)
    Type,
    /// A module-level variable (reserved)
    Variable,
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "module" => Ok(NodeKind::Module),
            "function" => Ok(NodeKind::Function),
            "file" => Ok(NodeKind::File),
            "type" => Ok(NodeKind::Type),
            "variable" => Ok(NodeKind::Variable),
            _ => Err(format!("Unknown node kind: {}", s)),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Module => "module",
            NodeKind::Function => "function",
            NodeKind::File => "file",
            NodeKind::Type => "type",
            NodeKind::Variable => "variable",
        };
        write!(f, "{}", s)
    }
}

/// Stable identifier for one entity in the graph
///
/// Equality is structural and hashing is stable across runs on a given
/// platform, so ids can key every store (graph, embeddings, tracker)
/// and survive a cache round-trip. The tool surface uses the compact
/// `Display`/`FromStr` form, not the serde representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityId {
    /// A module, by canonical name
    Module { name: String },
    /// A function, by owning module, name, and arity
    Function {
        module: String,
        name: String,
        arity: u32,
    },
    /// A source file, by absolute path
    File { path: String },
    /// A named type within a module (reserved)
    Type { module: String, name: String },
    /// A module-level variable (reserved)
    Variable { module: String, name: String },
}

impl EntityId {
    /// Create a module id
    pub fn module(name: impl Into<String>) -> Self {
        Self::Module { name: name.into() }
    }

    /// Create a function id
    pub fn function(module: impl Into<String>, name: impl Into<String>, arity: u32) -> Self {
        Self::Function {
            module: module.into(),
            name: name.into(),
            arity,
        }
    }

    /// Create a file id
    pub fn file(path: impl Into<String>) -> Self {
        Self::File { path: path.into() }
    }

    /// The kind of entity this id names
    pub fn kind(&self) -> NodeKind {
        match self {
            EntityId::Module { .. } => NodeKind::Module,
            EntityId::Function { .. } => NodeKind::Function,
            EntityId::File { .. } => NodeKind::File,
            EntityId::Type { .. } => NodeKind::Type,
            EntityId::Variable { .. } => NodeKind::Variable,
        }
    }

    /// The owning module name, when the entity has one
    pub fn module_name(&self) -> Option<&str> {
        match self {
            EntityId::Module { name } => Some(name),
            EntityId::Function { module, .. }
            | EntityId::Type { module, .. }
            | EntityId::Variable { module, .. } => Some(module),
            EntityId::File { .. } => None,
        }
    }
}

/// Compact textual form used on the tool surface:
/// `module:M`, `function:M.f/2`, `file:/abs/path`, `type:M.T`, `variable:M.x`
impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Module { name } => write!(f, "module:{}", name),
            EntityId::Function {
                module,
                name,
                arity,
            } => write!(f, "function:{}.{}/{}", module, name, arity),
            EntityId::File { path } => write!(f, "file:{}", path),
            EntityId::Type { module, name } => write!(f, "type:{}.{}", module, name),
            EntityId::Variable { module, name } => write!(f, "variable:{}.{}", module, name),
        }
    }
}

impl FromStr for EntityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| format!("Malformed entity id: {}", s))?;
        match kind {
            "module" => Ok(EntityId::module(rest)),
            "file" => Ok(EntityId::file(rest)),
            "function" => {
                let (qualified, arity) = rest
                    .rsplit_once('/')
                    .ok_or_else(|| format!("Function id missing arity: {}", s))?;
                let arity: u32 = arity
                    .parse()
                    .map_err(|_| format!("Invalid arity in entity id: {}", s))?;
                let (module, name) = qualified
                    .rsplit_once('.')
                    .ok_or_else(|| format!("Function id missing module: {}", s))?;
                Ok(EntityId::function(module, name, arity))
            }
            "type" => {
                let (module, name) = rest
                    .rsplit_once('.')
                    .ok_or_else(|| format!("Type id missing module: {}", s))?;
                Ok(EntityId::Type {
                    module: module.to_string(),
                    name: name.to_string(),
                })
            }
            "variable" => {
                let (module, name) = rest
                    .rsplit_once('.')
                    .ok_or_else(|| format!("Variable id missing module: {}", s))?;
                Ok(EntityId::Variable {
                    module: module.to_string(),
                    name: name.to_string(),
                })
            }
            other => Err(format!("Unknown entity kind: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_id_display_round_trip() {
        let id = EntityId::function("MyApp.Worker", "handle_call", 3);
        let s = id.to_string();
        assert_eq!(s, "function:MyApp.Worker.handle_call/3");
        assert_eq!(s.parse::<EntityId>().unwrap(), id);
    }

    #[test]
    fn module_id_round_trip() {
        let id = EntityId::module("MyApp.Worker");
        assert_eq!(id.to_string().parse::<EntityId>().unwrap(), id);
    }

    #[test]
    fn file_id_round_trip_keeps_path() {
        let id = EntityId::file("/srv/app/lib/worker.ex");
        assert_eq!(id.to_string(), "file:/srv/app/lib/worker.ex");
        assert_eq!(id.to_string().parse::<EntityId>().unwrap(), id);
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(EntityId::module("M").kind(), NodeKind::Module);
        assert_eq!(EntityId::function("M", "f", 1).kind(), NodeKind::Function);
        assert_eq!(EntityId::file("/a").kind(), NodeKind::File);
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!("function:no_arity".parse::<EntityId>().is_err());
        assert!("function:missing.slash".parse::<EntityId>().is_err());
        assert!("gadget:x".parse::<EntityId>().is_err());
        assert!("bare".parse::<EntityId>().is_err());
    }

    #[test]
    fn module_name_covers_owned_variants() {
        assert_eq!(EntityId::module("M").module_name(), Some("M"));
        assert_eq!(EntityId::function("M", "f", 0).module_name(), Some("M"));
        assert_eq!(EntityId::file("/a").module_name(), None);
    }

    #[test]
    fn arity_distinguishes_overloads() {
        let one = EntityId::function("M", "f", 1);
        let two = EntityId::function("M", "f", 2);
        assert_ne!(one, two);
    }
}
