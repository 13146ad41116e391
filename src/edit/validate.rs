//! Validator and formatter seams
//!
//! Both are per-language external collaborators invoked as subprocesses.
//! Validation gates a write; formatting runs after it and never fails the
//! enclosing edit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// One validator finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
    pub severity: String,
}

impl ValidationIssue {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            line: None,
            column: None,
            message: message.into(),
            severity: "error".to_string(),
        }
    }
}

/// Validator verdict for one file's content
#[derive(Debug, Clone)]
pub enum Verdict {
    Valid,
    Invalid(Vec<ValidationIssue>),
    /// No validator claims this file; treated as passing
    NoValidator,
}

/// Per-language syntax validator collaborator
#[async_trait]
pub trait Validator: Send + Sync {
    /// Whether this validator claims the path
    fn handles(&self, path: &Path) -> bool;

    /// Validate content destined for `path` (the file itself may not yet
    /// contain it)
    async fn validate(&self, content: &str, path: &Path) -> Verdict;
}

/// Per-language formatter collaborator
#[async_trait]
pub trait Formatter: Send + Sync {
    fn handles(&self, path: &Path) -> bool;

    /// Format the file in place
    async fn format(&self, path: &Path) -> Result<(), String>;
}

/// Registry dispatching validators by path
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    /// Run the first claiming validator; `NoValidator` when none claims
    pub async fn validate(&self, content: &str, path: &Path) -> Verdict {
        for validator in &self.validators {
            if validator.handles(path) {
                return validator.validate(content, path).await;
            }
        }
        Verdict::NoValidator
    }
}

/// Registry dispatching formatters by path
#[derive(Default)]
pub struct FormatterRegistry {
    formatters: Vec<Arc<dyn Formatter>>,
}

impl FormatterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, formatter: Arc<dyn Formatter>) {
        self.formatters.push(formatter);
    }

    /// Format with the first claiming formatter; failures are logged, never
    /// propagated
    pub async fn format_best_effort(&self, path: &Path) {
        for formatter in &self.formatters {
            if formatter.handles(path) {
                if let Err(message) = formatter.format(path).await {
                    warn!(path = %path.display(), %message, "formatter failed");
                }
                return;
            }
        }
    }
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_lowercase();
            extensions.iter().any(|e| *e == ext)
        })
        .unwrap_or(false)
}

/// Validator that pipes content to an external command's stdin
///
/// Exit status zero means valid; otherwise stderr becomes a single
/// error-severity issue.
pub struct CommandValidator {
    pub extensions: Vec<String>,
    pub program: String,
    pub args: Vec<String>,
}

#[async_trait]
impl Validator for CommandValidator {
    fn handles(&self, path: &Path) -> bool {
        has_extension(path, &self.extensions)
    }

    async fn validate(&self, content: &str, path: &Path) -> Verdict {
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.program, path = %path.display(), error = %e,
                    "validator unavailable; treating as no validator");
                return Verdict::NoValidator;
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if stdin.write_all(content.as_bytes()).await.is_err() {
                return Verdict::Invalid(vec![ValidationIssue::error(
                    "validator closed stdin early",
                )]);
            }
        }

        match child.wait_with_output().await {
            Ok(output) if output.status.success() => Verdict::Valid,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                let message = if stderr.is_empty() {
                    format!("{} reported invalid syntax", self.program)
                } else {
                    stderr
                };
                Verdict::Invalid(vec![ValidationIssue::error(message)])
            }
            Err(e) => Verdict::Invalid(vec![ValidationIssue::error(format!(
                "validator failed to run: {}",
                e
            ))]),
        }
    }
}

/// Formatter that runs an external command with the file path appended
pub struct CommandFormatter {
    pub extensions: Vec<String>,
    pub program: String,
    pub args: Vec<String>,
}

#[async_trait]
impl Formatter for CommandFormatter {
    fn handles(&self, path: &Path) -> bool {
        has_extension(path, &self.extensions)
    }

    async fn format(&self, path: &Path) -> Result<(), String> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {}", self.program, e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(String::from_utf8_lossy(&output.stderr).trim().to_string())
        }
    }
}
