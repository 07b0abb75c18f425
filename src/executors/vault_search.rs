//! `vault_search` executor: case-insensitive substring search over a vault
//! directory tree.
//!
//! Grounded on `km-tools::main.rs`'s gitignore-aware directory walk (the
//! `ignore` crate, built the same way: a `WalkBuilder` honoring `.gitignore`
//! and hidden-file conventions), generalized from "find missing READMEs" to
//! "search basenames and file contents for a query string".

use crate::error::ToolError;
use crate::executors::Executor;
use async_trait::async_trait;
use ignore::WalkBuilder;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

const PREVIEW_WINDOW: usize = 100;

#[derive(Debug, Deserialize)]
struct Args {
    query: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    20
}

pub struct VaultSearchExecutor {
    pub root: PathBuf,
}

impl VaultSearchExecutor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Executor for VaultSearchExecutor {
    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError> {
        let args: Args = serde_json::from_value(arguments.clone())
            .map_err(|e| ToolError::ExecutionFailed(format!("bad arguments: {}", e)))?;

        // limit=0 returns [] without touching the vault (spec boundary).
        if args.limit == 0 {
            return Ok(serde_json::json!({ "results": [] }));
        }

        if !self.root.is_dir() {
            return Ok(serde_json::json!({
                "error": format!("vault root does not exist: {}", self.root.display())
            }));
        }

        let needle = args.query.to_lowercase();
        let root = self.root.clone();
        let limit = args.limit.min(50);

        let results = tokio::task::spawn_blocking(move || search_blocking(&root, &needle, limit))
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("search task panicked: {}", e)))?;

        Ok(serde_json::json!({ "results": results }))
    }
}

fn search_blocking(root: &std::path::Path, needle: &str, limit: usize) -> Vec<Value> {
    let mut results = Vec::new();
    // Deterministic ordering: the Disclosure Filter's per-candidate toggles
    // (spec.md §4.5) address candidates by position, so search order must
    // be stable across runs rather than filesystem-dependent.
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker {
        if results.len() >= limit {
            break;
        }
        let Ok(entry) = entry else { continue };
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let path = entry.path();
        let basename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let name_matches = basename.to_lowercase().contains(needle);

        let content = std::fs::read_to_string(path).ok();
        let (content_matches, preview) = match &content {
            Some(content) => match_preview(content, needle),
            None => (false, None),
        };

        if name_matches || content_matches {
            results.push(serde_json::json!({
                "path": path.display().to_string(),
                "basename": basename,
                "matches": content_matches,
                "preview": preview.unwrap_or_else(|| leading_slice(content.as_deref().unwrap_or(""))),
            }));
        }
    }

    results
}

/// A ±`PREVIEW_WINDOW`-char window around the first case-insensitive match,
/// with ellipsis markers when truncated.
fn match_preview(content: &str, needle: &str) -> (bool, Option<String>) {
    let lower = content.to_lowercase();
    let Some(byte_pos) = lower.find(needle) else {
        return (false, None);
    };

    let start = byte_pos.saturating_sub(PREVIEW_WINDOW);
    let end = (byte_pos + needle.len() + PREVIEW_WINDOW).min(content.len());

    // Snap to char boundaries.
    let start = (0..=start).rev().find(|i| content.is_char_boundary(*i)).unwrap_or(0);
    let end = (end..=content.len()).find(|i| content.is_char_boundary(*i)).unwrap_or(content.len());

    let mut preview = String::new();
    if start > 0 {
        preview.push_str("...");
    }
    preview.push_str(content[start..end].trim());
    if end < content.len() {
        preview.push_str("...");
    }
    (true, Some(preview))
}

fn leading_slice(content: &str) -> String {
    let end = (0..PREVIEW_WINDOW.min(content.len()))
        .rev()
        .find(|i| content.is_char_boundary(*i))
        .unwrap_or(0);
    let end = if end == 0 && !content.is_empty() { content.len().min(PREVIEW_WINDOW) } else { end };
    let mut slice = content[..end.min(content.len())].trim().to_string();
    if end < content.len() {
        slice.push_str("...");
    }
    slice
}
