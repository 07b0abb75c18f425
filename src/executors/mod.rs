//! Side-Effect Executors (C4) — the concrete actions behind each `ToolKind`.
//!
//! Each executor returns a JSON payload on success and an error string
//! embedded *in* the payload on failure (spec.md §4.4: tool execution
//! failures are local/information-only, not trust-boundary errors), matching
//! `km-tools::tools::editor_edit`'s convention of reporting failures as data
//! rather than propagating them out of the tool-call path.

pub mod file_read;
pub mod vault_search;
pub mod web_search;

use crate::catalog::ToolKind;
use crate::error::ToolError;
use async_trait::async_trait;
use serde_json::Value;

/// One side-effecting action, dispatched on the closed `ToolKind` enum
/// rather than a trait-object registry.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, arguments: &Value) -> Result<Value, ToolError>;
}

/// Bundles the three built-in executors behind `ToolKind` dispatch.
pub struct ExecutorSet {
    pub vault_search: vault_search::VaultSearchExecutor,
    pub file_read: file_read::FileReadExecutor,
    pub web_search: web_search::WebSearchExecutor,
}

impl ExecutorSet {
    pub async fn run(&self, kind: ToolKind, arguments: &Value) -> Result<Value, ToolError> {
        match kind {
            ToolKind::VaultSearch => self.vault_search.execute(arguments).await,
            ToolKind::FileRead => self.file_read.execute(arguments).await,
            ToolKind::WebSearch => self.web_search.execute(arguments).await,
        }
    }
}
