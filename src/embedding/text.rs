//! Description text for embeddings
//!
//! The text a vector is generated from is a deterministic function of the
//! node's attributes, so re-embedding an unchanged node yields the same
//! input string.

use crate::graph::{EntityId, Node};

/// Character cap applied before embedding
pub const MAX_EMBED_CHARS: usize = 5000;

/// Render the embedding description for a node
///
/// Missing fields are elided rather than rendered empty. Output longer than
/// [`MAX_EMBED_CHARS`] is truncated on a char boundary.
pub fn describe_node(node: &Node) -> String {
    let mut parts: Vec<String> = Vec::new();

    match &node.id {
        EntityId::Module { name } => {
            parts.push(format!("Module: {}", name));
            if let Some(doc) = node.doc() {
                parts.push(format!("Documentation: {}", doc));
            }
            if let Some(file) = node.file() {
                parts.push(format!("File: {}", file));
            }
        }
        EntityId::Function {
            module,
            name,
            arity,
        } => {
            parts.push(format!("Function: {}/{}", name, arity));
            parts.push(format!("Module: {}", module));
            if let Some(doc) = node.doc() {
                parts.push(format!("Documentation: {}", doc));
            }
            if let Some(vis) = node.visibility() {
                parts.push(format!("Visibility: {}", vis));
            }
            match (node.file(), node.line()) {
                (Some(file), Some(line)) => parts.push(format!("File: {}:{}", file, line)),
                (Some(file), None) => parts.push(format!("File: {}", file)),
                _ => {}
            }
        }
        EntityId::File { path } => {
            parts.push(format!("File: {}", path));
        }
        EntityId::Type { module, name } => {
            parts.push(format!("Type: {}", name));
            parts.push(format!("Module: {}", module));
        }
        EntityId::Variable { module, name } => {
            parts.push(format!("Variable: {}", name));
            parts.push(format!("Module: {}", module));
        }
    }

    truncate_chars(parts.join(". "), MAX_EMBED_CHARS)
}

fn truncate_chars(s: String, cap: usize) -> String {
    if s.chars().count() <= cap {
        return s;
    }
    s.chars().take(cap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_description_includes_all_present_fields() {
        let node = Node::new(EntityId::function("MyApp.Worker", "handle_call", 3))
            .with_attr("file", "/srv/app/lib/worker.ex")
            .with_attr("line", 27i64)
            .with_attr("visibility", "public")
            .with_attr("doc", "Handles sync calls.");

        let text = describe_node(&node);
        assert_eq!(
            text,
            "Function: handle_call/3. Module: MyApp.Worker. \
             Documentation: Handles sync calls.. Visibility: public. \
             File: /srv/app/lib/worker.ex:27"
        );
    }

    #[test]
    fn missing_fields_are_elided() {
        let node = Node::new(EntityId::function("M", "f", 0));
        let text = describe_node(&node);
        assert_eq!(text, "Function: f/0. Module: M");
        assert!(!text.contains("Documentation"));
        assert!(!text.contains("File"));
    }

    #[test]
    fn module_description_format() {
        let node = Node::new(EntityId::module("MyApp"))
            .with_attr("doc", "Top-level app.")
            .with_attr("file", "/srv/app/lib/my_app.ex");
        assert_eq!(
            describe_node(&node),
            "Module: MyApp. Documentation: Top-level app.. File: /srv/app/lib/my_app.ex"
        );
    }

    #[test]
    fn description_is_deterministic() {
        let node = Node::new(EntityId::function("M", "f", 2))
            .with_attr("file", "/a.ex")
            .with_attr("line", 3i64);
        assert_eq!(describe_node(&node), describe_node(&node));
    }

    #[test]
    fn long_docs_are_truncated() {
        let node =
            Node::new(EntityId::module("M")).with_attr("doc", "x".repeat(MAX_EMBED_CHARS * 2));
        let text = describe_node(&node);
        assert_eq!(text.chars().count(), MAX_EMBED_CHARS);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let node = Node::new(EntityId::module("M")).with_attr("doc", "é".repeat(MAX_EMBED_CHARS));
        let text = describe_node(&node);
        assert_eq!(text.chars().count(), MAX_EMBED_CHARS);
    }
}
