//! Crate-wide error taxonomy.
//!
//! Mirrors the recovery table in the orchestrator design: transport and
//! authentication failures terminate a conversation turn, while tool
//! execution failures, denials, and truncation are recovered locally and
//! fed back into the conversation as data.

use thiserror::Error;

/// Trust-boundary failures: these terminate the Conversation Driver's loop.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication failed: check the API key for this provider")]
    AuthenticationFailed,

    #[error("bad request: {0} (check the model id and URL in settings)")]
    BadRequest(String),

    #[error("provider returned malformed data: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("adapter channel closed before the turn completed")]
    AdapterClosed,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Local, information-only failures: these become `role=tool` messages
/// rather than terminating the loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool '{0}' is not registered")]
    UnknownTool(String),

    #[error("invalid arguments for '{tool}': {detail}")]
    SchemaValidation { tool: String, detail: String },

    #[error("{0}")]
    ExecutionFailed(String),

    #[error("user cancelled")]
    UserCancelled,
}

impl ToolError {
    /// Render as the `{error: ...}` payload described in spec.md §4.3/§7.
    pub fn as_payload(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}
