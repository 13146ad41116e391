//! MCP tool parameter structs with schemars-derived JSON schemas.

use crate::edit::Change;
use schemars::JsonSchema;
use serde::Deserialize;

// ── Ingestion params ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct AnalyzeParams {
    #[schemars(description = "File or directory to ingest (incremental)")]
    pub path: String,
}

// ── Graph read params ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindEntityParams {
    #[schemars(
        description = "Entity id, e.g. 'module:MyApp' or 'function:MyApp.Worker.run/2'"
    )]
    pub id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FunctionRefParams {
    #[schemars(description = "Owning module name")]
    pub module: String,
    #[schemars(description = "Function name")]
    pub function: String,
    #[schemars(description = "Function arity")]
    pub arity: u32,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindPathsParams {
    #[schemars(description = "Source entity id (function)")]
    pub from: String,
    #[schemars(description = "Target entity id (function)")]
    pub to: String,
    #[schemars(description = "Maximum path length in edges (default 10)")]
    pub max_depth: Option<usize>,
    #[schemars(description = "Maximum number of paths to collect (default 100)")]
    pub max_paths: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RankLimitParams {
    #[schemars(description = "How many top entries to return (default 10)")]
    pub limit: Option<usize>,
}

// ── Search params ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SemanticSearchParams {
    #[schemars(description = "Free-text query, embedded with the active model")]
    pub query: String,
    #[schemars(description = "Restrict to one entity kind (module|function|file)")]
    pub kind: Option<String>,
    #[schemars(description = "Minimum cosine score (default from config)")]
    pub threshold: Option<f32>,
    #[schemars(description = "Maximum hits (default from config)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct HybridSearchParams {
    #[schemars(description = "Free-text query, embedded with the active model")]
    pub query: String,
    #[schemars(description = "fusion | semantic_first | graph_first (default fusion)")]
    pub strategy: Option<String>,
    #[schemars(description = "Structural constraint: entities owned by this module")]
    pub module: Option<String>,
    #[schemars(description = "Restrict to one entity kind (module|function|file)")]
    pub kind: Option<String>,
    #[schemars(description = "Maximum hits (default from config)")]
    pub limit: Option<usize>,
}

// ── Edit params ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChangeParam {
    #[schemars(description = "replace | insert | delete")]
    pub op: String,
    #[schemars(description = "First line of the range (1-based, replace/delete)")]
    pub line_start: Option<usize>,
    #[schemars(description = "Last line of the range, inclusive (replace/delete)")]
    pub line_end: Option<usize>,
    #[schemars(description = "Insert before this line; N+1 appends (insert)")]
    pub before_line: Option<usize>,
    #[schemars(description = "Replacement or inserted text (replace/insert)")]
    pub content: Option<String>,
}

impl ChangeParam {
    /// Lower the wire shape into a typed [`Change`]
    pub fn into_change(self) -> Result<Change, String> {
        match self.op.as_str() {
            "replace" => Ok(Change::Replace {
                line_start: self.line_start.ok_or("replace requires line_start")?,
                line_end: self.line_end.ok_or("replace requires line_end")?,
                content: self.content.ok_or("replace requires content")?,
            }),
            "insert" => Ok(Change::Insert {
                before_line: self.before_line.ok_or("insert requires before_line")?,
                content: self.content.ok_or("insert requires content")?,
            }),
            "delete" => Ok(Change::Delete {
                line_start: self.line_start.ok_or("delete requires line_start")?,
                line_end: self.line_end.ok_or("delete requires line_end")?,
            }),
            other => Err(format!("unknown change op: {}", other)),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EditFileParams {
    #[schemars(description = "File to edit")]
    pub path: String,
    #[schemars(description = "Line-addressed changes, applied against the file as read")]
    pub changes: Vec<ChangeParam>,
    #[schemars(description = "Validate before writing (default from config)")]
    pub validate: Option<bool>,
    #[schemars(description = "Format after writing (default from config)")]
    pub format: Option<bool>,
    #[schemars(description = "Snapshot to the backup vault first (default true)")]
    pub backup: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RollbackParams {
    #[schemars(description = "File to restore")]
    pub path: String,
    #[schemars(description = "Backup id; latest when omitted")]
    pub backup_id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileEditParam {
    #[schemars(description = "File to edit")]
    pub path: String,
    #[schemars(description = "Changes for this file")]
    pub changes: Vec<ChangeParam>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MultiEditParams {
    #[schemars(description = "Per-file edits, committed all-or-nothing")]
    pub files: Vec<FileEditParam>,
    #[schemars(description = "Validate each file before writing (default from config)")]
    pub validate: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListBackupsParams {
    #[schemars(description = "File whose backups to list")]
    pub path: String,
    #[schemars(description = "Maximum entries (newest first)")]
    pub limit: Option<usize>,
}

// ── Refactor params ────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenameFunctionParams {
    #[schemars(description = "Owning module of the function")]
    pub module: String,
    #[schemars(description = "Current function name")]
    pub old_name: String,
    #[schemars(description = "New function name")]
    pub new_name: String,
    #[schemars(description = "Arity of the function to rename")]
    pub arity: u32,
    #[schemars(description = "module (definition file only) | project (default)")]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenameModuleParams {
    #[schemars(description = "Current module name")]
    pub old_name: String,
    #[schemars(description = "New module name")]
    pub new_name: String,
    #[schemars(description = "module (definition file only) | project (default)")]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveFunctionParams {
    #[schemars(description = "Source module of the function")]
    pub module: String,
    #[schemars(description = "Function name")]
    pub function: String,
    #[schemars(description = "Function arity")]
    pub arity: u32,
    #[schemars(description = "Destination module")]
    pub target_module: String,
    #[schemars(
        description = "Destination file when the target module is not in the graph; created if absent"
    )]
    pub target_path: Option<String>,
}

// ── Undo params ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UndoHistoryParams {
    #[schemars(description = "Maximum entries, newest first (default 20)")]
    pub limit: Option<usize>,
    #[schemars(description = "Include entries already undone (default false)")]
    pub include_undone: Option<bool>,
}

// ── Cache params ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CacheClearParams {
    #[schemars(description = "Clear every project's cache, not just this one")]
    pub all: Option<bool>,
    #[schemars(description = "Only clear caches older than this many days")]
    pub older_than_days: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_param_lowers_replace() {
        let param = ChangeParam {
            op: "replace".into(),
            line_start: Some(1),
            line_end: Some(2),
            before_line: None,
            content: Some("x".into()),
        };
        assert!(matches!(
            param.into_change().unwrap(),
            Change::Replace {
                line_start: 1,
                line_end: 2,
                ..
            }
        ));
    }

    #[test]
    fn change_param_rejects_missing_fields() {
        let param = ChangeParam {
            op: "insert".into(),
            line_start: None,
            line_end: None,
            before_line: None,
            content: Some("x".into()),
        };
        assert!(param.into_change().is_err());
    }

    #[test]
    fn change_param_rejects_unknown_op() {
        let param = ChangeParam {
            op: "upsert".into(),
            line_start: None,
            line_end: None,
            before_line: None,
            content: None,
        };
        assert!(param.into_change().is_err());
    }
}
