//! Built-in line-based parser
//!
//! A fallback collaborator for `def`/`defp`/`defmodule` syntax, good enough
//! to stand in when no AST-backed parser is registered: it extracts module
//! and function definitions, same-module call sites, and `alias`/`import`
//! lines. Real language parsers plug in through the same [`Parser`] seam.

use super::parser::{
    CallFact, FunctionFact, FunctionRef, ImportFact, ModuleFact, ParseError, ParsedFacts, Parser,
};
use crate::graph::Visibility;
use std::path::Path;

/// Line-oriented parser for `defmodule`-style sources
pub struct LineParser;

fn ident_at_start(s: &str) -> Option<&str> {
    let end = s
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.' || c == '?' || c == '!'))
        .unwrap_or(s.len());
    if end == 0 {
        None
    } else {
        Some(&s[..end])
    }
}

/// Count top-level commas between the parens opening at the start of `s`
fn arity_of_params(s: &str) -> Option<u32> {
    if !s.starts_with('(') {
        return None;
    }
    let mut depth = 0i32;
    let mut args = 0u32;
    let mut saw_token = false;
    for c in s.chars() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(if saw_token { args + 1 } else { 0 });
                }
            }
            ',' if depth == 1 => args += 1,
            c if !c.is_whitespace() => saw_token = true,
            _ => {}
        }
    }
    None
}

impl LineParser {
    /// Call sites on one line of a function body
    fn calls_on_line(
        line: &str,
        line_no: u32,
        current: &FunctionRef,
        local_functions: &[(String, u32)],
        module: &str,
    ) -> Vec<CallFact> {
        let mut calls = Vec::new();
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i] as char;
            if !(c.is_alphabetic() || c == '_') {
                i += 1;
                continue;
            }
            // Word start must not continue a previous identifier
            if i > 0 {
                let prev = bytes[i - 1] as char;
                if prev.is_alphanumeric() || prev == '_' {
                    i += 1;
                    continue;
                }
            }
            let rest = &line[i..];
            let Some(word) = ident_at_start(rest) else {
                i += 1;
                continue;
            };
            let after = &rest[word.len()..];
            if let Some(arity) = arity_of_params(after) {
                let (callee_module, name) = match word.rsplit_once('.') {
                    Some((qualifier, name)) if qualifier
                        .chars()
                        .next()
                        .map_or(false, |c| c.is_uppercase()) =>
                    {
                        (qualifier.to_string(), name.to_string())
                    }
                    _ => (module.to_string(), word.to_string()),
                };
                // Keyword forms (def, if, case...) are not calls
                let is_local_def = callee_module == module
                    && local_functions.iter().any(|(n, a)| *n == name && *a == arity);
                let is_qualified = callee_module != module;
                if (is_local_def || is_qualified)
                    && !matches!(name.as_str(), "def" | "defp" | "defmodule")
                {
                    calls.push(CallFact {
                        from: current.clone(),
                        to: FunctionRef {
                            module: callee_module,
                            name,
                            arity,
                        },
                        line: line_no,
                    });
                }
            }
            i += word.len().max(1);
        }
        calls
    }
}

impl Parser for LineParser {
    fn language(&self) -> &str {
        "elixir-line"
    }

    fn extensions(&self) -> &[&str] {
        &["ex", "exs"]
    }

    fn parse(&self, source: &str, path: &Path) -> Result<ParsedFacts, ParseError> {
        let mut facts = ParsedFacts::default();
        let mut module: Option<String> = None;
        let mut pending_doc: Option<String> = None;
        let mut current: Option<FunctionRef> = None;

        // First pass: definitions (with single-line docs), so call
        // resolution knows local names
        let mut definitions: Vec<FunctionFact> = Vec::new();
        for (i, raw) in source.lines().enumerate() {
            let line_no = (i + 1) as u32;
            let line = raw.trim_start();
            if let Some(rest) = line.strip_prefix("defmodule ") {
                let name = ident_at_start(rest).ok_or_else(|| ParseError {
                    file: path.to_string_lossy().to_string(),
                    line: Some(line_no),
                    message: "defmodule without a module name".to_string(),
                })?;
                module = Some(name.to_string());
                facts.modules.push(ModuleFact {
                    name: name.to_string(),
                    line: line_no,
                    doc: None,
                });
            } else if let Some(rest) = line.strip_prefix("@moduledoc \"") {
                if let (Some(end), Some(m)) = (rest.find('"'), facts.modules.last_mut()) {
                    m.doc = Some(rest[..end].to_string());
                }
            } else if let Some(rest) = line.strip_prefix("@doc \"") {
                if let Some(end) = rest.find('"') {
                    pending_doc = Some(rest[..end].to_string());
                }
            } else if let Some((rest, visibility)) = line
                .strip_prefix("defp ")
                .map(|r| (r, Visibility::Private))
                .or_else(|| line.strip_prefix("def ").map(|r| (r, Visibility::Public)))
            {
                let Some(name) = ident_at_start(rest) else {
                    continue;
                };
                let after = &rest[name.len()..];
                let arity = arity_of_params(after).unwrap_or(0);
                definitions.push(FunctionFact {
                    module: String::new(), // patched once the module is known
                    name: name.to_string(),
                    arity,
                    line: line_no,
                    visibility,
                    doc: pending_doc.take(),
                });
            }
        }

        let module = module.ok_or_else(|| ParseError {
            file: path.to_string_lossy().to_string(),
            line: None,
            message: "no defmodule found".to_string(),
        })?;

        let local: Vec<(String, u32)> = definitions
            .iter()
            .map(|f| (f.name.clone(), f.arity))
            .collect();
        for mut fact in definitions {
            fact.module = module.clone();
            facts.functions.push(fact);
        }

        // Second pass: calls and imports, tracking the enclosing function
        for (i, raw) in source.lines().enumerate() {
            let line_no = (i + 1) as u32;
            let line = raw.trim_start();

            if let Some(rest) = line
                .strip_prefix("defp ")
                .or_else(|| line.strip_prefix("def "))
            {
                if let Some(name) = ident_at_start(rest) {
                    let arity = arity_of_params(&rest[name.len()..]).unwrap_or(0);
                    current = Some(FunctionRef {
                        module: module.clone(),
                        name: name.to_string(),
                        arity,
                    });
                }
                // One-liner bodies (`, do: expr`) carry calls on the def
                // line itself.
                if let (Some(offset), Some(ref from)) = (raw.find("do:"), &current) {
                    facts.calls.extend(Self::calls_on_line(
                        &raw[offset + 3..],
                        line_no,
                        from,
                        &local,
                        &module,
                    ));
                }
                continue;
            }

            if let Some(rest) = line
                .strip_prefix("alias ")
                .or_else(|| line.strip_prefix("import "))
            {
                if let Some(target) = ident_at_start(rest) {
                    facts.imports.push(ImportFact {
                        from_module: module.clone(),
                        to_module: target.to_string(),
                    });
                }
                continue;
            }

            if let Some(ref from) = current {
                facts
                    .calls
                    .extend(Self::calls_on_line(raw, line_no, from, &local, &module));
            }
        }

        Ok(facts)
    }
}
