//! AST editor seam
//!
//! Per-language source transformers for refactoring: pure functions from
//! content to content. Real AST-backed editors are external collaborators;
//! the built-in [`TokenEditor`] is a token-boundary textual fallback that
//! understands `def`/`defp`-style definitions, call parentheses, and
//! `name/arity` capture references well enough to drive arity-aware
//! renames.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors from source transforms
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum AstEditError {
    #[error("function {name}/{arity} not found in source")]
    FunctionNotFound { name: String, arity: u32 },

    #[error("module {name} not found in source")]
    ModuleNotFound { name: String },

    #[error("unsupported transform: {0}")]
    Unsupported(String),
}

/// A refactoring transform applied to one file's content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AstOp {
    /// Rename every matching occurrence of a function: definitions, direct
    /// and qualified calls, and `name/arity` references. Other arities are
    /// preserved.
    RenameFunction {
        old_name: String,
        new_name: String,
        arity: u32,
    },
    /// Rename a module everywhere it is referenced
    RenameModule { old_name: String, new_name: String },
    /// Append a function definition (target side of a move)
    AddFunction { definition: String },
}

/// Per-language source transformer collaborator
pub trait AstEditor: Send + Sync {
    /// Whether this editor claims the path
    fn handles(&self, path: &Path) -> bool;

    /// Apply a transform, returning the full new content
    fn apply(&self, content: &str, op: &AstOp) -> Result<String, AstEditError>;

    /// Split a function definition out of the content:
    /// `(content without the definition, the definition text)`
    fn extract_function(
        &self,
        content: &str,
        name: &str,
        arity: u32,
    ) -> Result<(String, String), AstEditError>;
}

/// Registry dispatching AST editors by path
#[derive(Default)]
pub struct AstEditorRegistry {
    editors: Vec<Arc<dyn AstEditor>>,
}

impl AstEditorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose fallback is the built-in token editor
    pub fn with_token_fallback() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TokenEditor));
        registry
    }

    /// Register an editor; later registrations win
    pub fn register(&mut self, editor: Arc<dyn AstEditor>) {
        self.editors.push(editor);
    }

    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn AstEditor>> {
        self.editors.iter().rev().find(|e| e.handles(path)).cloned()
    }
}

// ---------------------------------------------------------------------------
// TokenEditor
// ---------------------------------------------------------------------------

/// Token-boundary textual transformer
///
/// Arity is checked where the syntax shows it: call sites count their
/// top-level arguments, `name/arity` references compare the literal arity.
/// Zero-arity `def name do` definitions rename only when the requested
/// arity is 0.
pub struct TokenEditor;

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Count top-level arguments inside the parens starting at `open`
/// (byte offset of `(`). Returns `None` on unbalanced input.
fn count_args(content: &str, open: usize) -> Option<u32> {
    let bytes = content.as_bytes();
    let mut depth = 0u32;
    let mut args = 0u32;
    let mut saw_token = false;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] as char {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(if saw_token { args + 1 } else { 0 });
                }
            }
            ',' if depth == 1 => args += 1,
            c if !c.is_whitespace() => saw_token = true,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Whether `s` ends with `keyword` as a whole word
fn ends_with_keyword(s: &str, keyword: &str) -> bool {
    s.strip_suffix(keyword).map_or(false, |prefix| {
        prefix
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c))
    })
}

/// Find word-boundary occurrences of `word` in `content`
fn word_occurrences(content: &str, word: &str) -> Vec<usize> {
    let mut found = Vec::new();
    let mut start = 0;
    while let Some(pos) = content[start..].find(word) {
        let at = start + pos;
        let before_ok = at == 0
            || !is_ident_char(content[..at].chars().next_back().unwrap_or(' '));
        let after = content[at + word.len()..].chars().next();
        let after_ok = after.map_or(true, |c| !is_ident_char(c));
        if before_ok && after_ok {
            found.push(at);
        }
        start = at + word.len().max(1);
    }
    found
}

impl TokenEditor {
    fn rename_function(
        &self,
        content: &str,
        old_name: &str,
        new_name: &str,
        arity: u32,
    ) -> Result<String, AstEditError> {
        let mut renames: Vec<usize> = Vec::new();

        for at in word_occurrences(content, old_name) {
            let after = &content[at + old_name.len()..];
            let trailing = after.trim_start();

            if trailing.starts_with('(') {
                // Definition or call with parens: arity is the argument count
                let open = at + old_name.len() + (after.len() - trailing.len());
                if count_args(content, open) == Some(arity) {
                    renames.push(at);
                }
            } else if let Some(rest) = trailing.strip_prefix('/') {
                // Capture reference `name/arity`
                let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                if digits.parse::<u32>().ok() == Some(arity) {
                    renames.push(at);
                }
            } else if arity == 0 {
                // Paren-less zero-arity definition or call
                let before = content[..at].trim_end();
                if ends_with_keyword(before, "defp") || ends_with_keyword(before, "def") {
                    renames.push(at);
                }
            }
        }

        if renames.is_empty() {
            return Err(AstEditError::FunctionNotFound {
                name: old_name.to_string(),
                arity,
            });
        }

        Ok(splice_all(content, &renames, old_name.len(), new_name))
    }

    fn rename_module(
        &self,
        content: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<String, AstEditError> {
        let occurrences = word_occurrences(content, old_name);
        if occurrences.is_empty() {
            return Err(AstEditError::ModuleNotFound {
                name: old_name.to_string(),
            });
        }
        Ok(splice_all(content, &occurrences, old_name.len(), new_name))
    }

    /// Locate the definition block of `name/arity`: the `def`/`defp` line
    /// through its matching `end` at the same indentation (or a one-line
    /// `, do:` form).
    fn definition_lines(
        &self,
        content: &str,
        name: &str,
        arity: u32,
    ) -> Option<(usize, usize)> {
        let lines: Vec<&str> = content.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            let Some(rest) = trimmed
                .strip_prefix("defp ")
                .or_else(|| trimmed.strip_prefix("def "))
            else {
                continue;
            };
            if !rest.starts_with(name) {
                continue;
            }
            let after = &rest[name.len()..];
            let matches_arity = if let Some(idx) = after.find('(') {
                if !after[..idx].trim().is_empty() {
                    continue;
                }
                let line_offset: usize =
                    content.lines().take(i).map(|l| l.len() + 1).sum();
                let open = line_offset + (line.len() - rest.len()) + name.len() + idx;
                count_args(content, open) == Some(arity)
            } else {
                arity == 0 && (after.trim_start().starts_with("do") || after.trim().is_empty())
            };
            if !matches_arity {
                continue;
            }

            if line.contains(", do:") || line.contains(",do:") {
                return Some((i, i));
            }

            // Find `end` at the def's indentation
            let indent = line.len() - trimmed.len();
            for (j, candidate) in lines.iter().enumerate().skip(i + 1) {
                let ct = candidate.trim_start();
                if ct == "end" && candidate.len() - ct.len() == indent {
                    return Some((i, j));
                }
            }
            return Some((i, lines.len() - 1));
        }
        None
    }

    fn extract(
        &self,
        content: &str,
        name: &str,
        arity: u32,
    ) -> Result<(String, String), AstEditError> {
        let (start, end) =
            self.definition_lines(content, name, arity)
                .ok_or_else(|| AstEditError::FunctionNotFound {
                    name: name.to_string(),
                    arity,
                })?;

        let lines: Vec<&str> = content.lines().collect();
        let definition = lines[start..=end].join("\n");
        let mut remaining: Vec<&str> = Vec::new();
        remaining.extend_from_slice(&lines[..start]);
        remaining.extend_from_slice(&lines[end + 1..]);
        let mut rest = remaining.join("\n");
        if content.ends_with('\n') && !rest.is_empty() {
            rest.push('\n');
        }
        Ok((rest, definition))
    }

    fn add_function(&self, content: &str, definition: &str) -> String {
        // Append inside the trailing module `end` when one exists
        let lines: Vec<&str> = content.lines().collect();
        if let Some(last_end) = lines.iter().rposition(|l| l.trim() == "end") {
            let mut out: Vec<String> = lines[..last_end].iter().map(|s| s.to_string()).collect();
            if !out.last().map_or(true, |l| l.trim().is_empty()) {
                out.push(String::new());
            }
            for line in definition.lines() {
                out.push(line.to_string());
            }
            out.extend(lines[last_end..].iter().map(|s| s.to_string()));
            let mut result = out.join("\n");
            if content.ends_with('\n') {
                result.push('\n');
            }
            result
        } else {
            let mut result = content.to_string();
            if !result.is_empty() && !result.ends_with('\n') {
                result.push('\n');
            }
            result.push_str(definition);
            result.push('\n');
            result
        }
    }
}

fn splice_all(content: &str, offsets: &[usize], old_len: usize, replacement: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut cursor = 0;
    for &at in offsets {
        result.push_str(&content[cursor..at]);
        result.push_str(replacement);
        cursor = at + old_len;
    }
    result.push_str(&content[cursor..]);
    result
}

impl AstEditor for TokenEditor {
    fn handles(&self, _path: &Path) -> bool {
        true
    }

    fn apply(&self, content: &str, op: &AstOp) -> Result<String, AstEditError> {
        match op {
            AstOp::RenameFunction {
                old_name,
                new_name,
                arity,
            } => self.rename_function(content, old_name, new_name, *arity),
            AstOp::RenameModule { old_name, new_name } => {
                self.rename_module(content, old_name, new_name)
            }
            AstOp::AddFunction { definition } => Ok(self.add_function(content, definition)),
        }
    }

    fn extract_function(
        &self,
        content: &str,
        name: &str,
        arity: u32,
    ) -> Result<(String, String), AstEditError> {
        self.extract(content, name, arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
defmodule MyApp.Worker do
  def foo(a, b) do
    bar(a)
    foo(a, b)
  end

  def foo(a) do
    a
  end

  defp bar(x), do: x

  def dispatch do
    Enum.map([1], &foo/2)
    MyApp.Worker.foo(1, 2)
  end
end
";

    #[test]
    fn rename_function_matches_only_requested_arity() {
        let editor = TokenEditor;
        let out = editor
            .apply(
                SOURCE,
                &AstOp::RenameFunction {
                    old_name: "foo".into(),
                    new_name: "renamed".into(),
                    arity: 2,
                },
            )
            .unwrap();

        // foo/2 definition, recursive call, capture, and qualified call renamed
        assert!(out.contains("def renamed(a, b) do"));
        assert!(out.contains("renamed(a, b)"));
        assert!(out.contains("&renamed/2"));
        assert!(out.contains("MyApp.Worker.renamed(1, 2)"));
        // foo/1 untouched
        assert!(out.contains("def foo(a) do"));
    }

    #[test]
    fn rename_function_unknown_name_errors() {
        let editor = TokenEditor;
        let err = editor
            .apply(
                SOURCE,
                &AstOp::RenameFunction {
                    old_name: "missing".into(),
                    new_name: "x".into(),
                    arity: 1,
                },
            )
            .unwrap_err();
        assert!(matches!(err, AstEditError::FunctionNotFound { .. }));
    }

    #[test]
    fn rename_zero_arity_definition() {
        let editor = TokenEditor;
        let out = editor
            .apply(
                SOURCE,
                &AstOp::RenameFunction {
                    old_name: "dispatch".into(),
                    new_name: "run".into(),
                    arity: 0,
                },
            )
            .unwrap();
        assert!(out.contains("def run do"));
        assert!(!out.contains("def dispatch do"));
    }

    #[test]
    fn rename_does_not_touch_substrings() {
        let editor = TokenEditor;
        let content = "def bar(x), do: x\ndef rebar(x), do: bar(x)\n";
        let out = editor
            .apply(
                content,
                &AstOp::RenameFunction {
                    old_name: "bar".into(),
                    new_name: "baz".into(),
                    arity: 1,
                },
            )
            .unwrap();
        assert!(out.contains("def baz(x), do: x"));
        assert!(out.contains("def rebar(x), do: baz(x)"));
    }

    #[test]
    fn rename_module_everywhere() {
        let editor = TokenEditor;
        let out = editor
            .apply(
                SOURCE,
                &AstOp::RenameModule {
                    old_name: "MyApp.Worker".into(),
                    new_name: "MyApp.Laborer".into(),
                },
            )
            .unwrap();
        assert!(out.starts_with("defmodule MyApp.Laborer do"));
        assert!(!out.contains("MyApp.Worker"));
    }

    #[test]
    fn extract_function_splits_block_definition() {
        let editor = TokenEditor;
        let (rest, definition) = editor.extract_function(SOURCE, "foo", 1).unwrap();
        assert!(definition.contains("def foo(a) do"));
        assert!(definition.trim_end().ends_with("end"));
        assert!(!rest.contains("def foo(a) do"));
        // Other definitions survive
        assert!(rest.contains("def foo(a, b) do"));
        assert!(rest.contains("defp bar(x), do: x"));
    }

    #[test]
    fn extract_function_handles_one_liner() {
        let editor = TokenEditor;
        let (rest, definition) = editor.extract_function(SOURCE, "bar", 1).unwrap();
        assert_eq!(definition.trim(), "defp bar(x), do: x");
        assert!(!rest.contains("defp bar"));
    }

    #[test]
    fn extract_missing_function_errors() {
        let editor = TokenEditor;
        assert!(matches!(
            editor.extract_function(SOURCE, "foo", 3),
            Err(AstEditError::FunctionNotFound { .. })
        ));
    }

    #[test]
    fn add_function_lands_inside_module_end() {
        let editor = TokenEditor;
        let out = editor
            .apply(
                "defmodule M do\n  def a, do: 1\nend\n",
                &AstOp::AddFunction {
                    definition: "  def b, do: 2".into(),
                },
            )
            .unwrap();
        assert_eq!(out, "defmodule M do\n  def a, do: 1\n\n  def b, do: 2\nend\n");
    }

    #[test]
    fn add_function_to_empty_content_appends() {
        let editor = TokenEditor;
        let out = editor
            .apply(
                "",
                &AstOp::AddFunction {
                    definition: "def b, do: 2".into(),
                },
            )
            .unwrap();
        assert_eq!(out, "def b, do: 2\n");
    }

    #[test]
    fn registry_falls_back_to_token_editor() {
        let registry = AstEditorRegistry::with_token_fallback();
        assert!(registry.for_path(Path::new("/a/b.ex")).is_some());
        assert!(registry.for_path(Path::new("/a/b.unknown")).is_some());
    }
}
