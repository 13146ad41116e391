//! Parser seam
//!
//! Per-language parsers are external collaborators: they turn source text
//! into structured facts (modules, functions, calls, imports) and the core
//! never inspects their internal representation. Dispatch is by file
//! extension.

use crate::graph::Visibility;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// A parse failure in one file
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("parse error in {file} line {line:?}: {message}")]
pub struct ParseError {
    pub file: String,
    pub line: Option<u32>,
    pub message: String,
}

/// Reference to a function by owning module, name, and arity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionRef {
    pub module: String,
    pub name: String,
    pub arity: u32,
}

/// A module discovered in a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleFact {
    pub name: String,
    pub line: u32,
    pub doc: Option<String>,
}

/// A function definition discovered in a file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionFact {
    pub module: String,
    pub name: String,
    pub arity: u32,
    pub line: u32,
    pub visibility: Visibility,
    pub doc: Option<String>,
}

/// A call site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallFact {
    pub from: FunctionRef,
    pub to: FunctionRef,
    pub line: u32,
}

/// A module-level import/alias/use
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFact {
    pub from_module: String,
    pub to_module: String,
}

/// Everything a parser extracts from one file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedFacts {
    pub modules: Vec<ModuleFact>,
    pub functions: Vec<FunctionFact>,
    pub calls: Vec<CallFact>,
    pub imports: Vec<ImportFact>,
}

/// Per-language parser collaborator
pub trait Parser: Send + Sync {
    /// Language name (for diagnostics)
    fn language(&self) -> &str;

    /// File extensions this parser claims, without the leading dot
    fn extensions(&self) -> &[&str];

    /// Extract structured facts from source text
    fn parse(&self, source: &str, path: &Path) -> Result<ParsedFacts, ParseError>;
}

/// Extension-dispatch registry of parsers
#[derive(Default)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn Parser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parser; later registrations win on extension conflicts
    pub fn register(&mut self, parser: Arc<dyn Parser>) {
        self.parsers.push(parser);
    }

    /// The parser claiming this path's extension, if any
    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn Parser>> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.parsers
            .iter()
            .rev()
            .find(|p| p.extensions().iter().any(|e| *e == ext))
            .cloned()
    }

    /// Whether any registered parser claims this path
    pub fn handles(&self, path: &Path) -> bool {
        self.for_path(path).is_some()
    }

    /// All claimed extensions
    pub fn extensions(&self) -> Vec<&str> {
        self.parsers
            .iter()
            .flat_map(|p| p.extensions().iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubParser {
        language: &'static str,
        extensions: &'static [&'static str],
    }

    impl Parser for StubParser {
        fn language(&self) -> &str {
            self.language
        }

        fn extensions(&self) -> &[&str] {
            self.extensions
        }

        fn parse(&self, _source: &str, _path: &Path) -> Result<ParsedFacts, ParseError> {
            Ok(ParsedFacts::default())
        }
    }

    #[test]
    fn dispatch_by_extension_case_insensitive() {
        let mut registry = ParserRegistry::new();
        registry.register(Arc::new(StubParser {
            language: "elixir",
            extensions: &["ex", "exs"],
        }));
        registry.register(Arc::new(StubParser {
            language: "python",
            extensions: &["py"],
        }));

        assert_eq!(
            registry.for_path(Path::new("/a/b.ex")).unwrap().language(),
            "elixir"
        );
        assert_eq!(
            registry.for_path(Path::new("/a/B.PY")).unwrap().language(),
            "python"
        );
        assert!(registry.for_path(Path::new("/a/b.rs")).is_none());
        assert!(registry.for_path(Path::new("/a/noext")).is_none());
    }

    #[test]
    fn later_registration_wins_conflicts() {
        let mut registry = ParserRegistry::new();
        registry.register(Arc::new(StubParser {
            language: "old",
            extensions: &["js"],
        }));
        registry.register(Arc::new(StubParser {
            language: "new",
            extensions: &["js"],
        }));

        assert_eq!(
            registry.for_path(Path::new("x.js")).unwrap().language(),
            "new"
        );
    }

    #[test]
    fn parse_error_display_includes_location() {
        let err = ParseError {
            file: "/a/b.ex".into(),
            line: Some(7),
            message: "unexpected token".into(),
        };
        let text = err.to_string();
        assert!(text.contains("/a/b.ex"));
        assert!(text.contains('7'));
    }
}
