//! Provider Adapter Port (C8) — the narrow interface the Conversation
//! Driver depends on.
//!
//! spec.md §4.8/§9: the port has exactly one method. All per-SDK
//! shape-shifting (tool-call block formats, system-field placement,
//! streaming vs polling) is confined to adapters; the core has no
//! conditional branches on provider identity.

pub mod assembler;
pub mod scripted;

use crate::error::OrchestratorError;
use crate::sink::StreamSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single message in the conversation history, the wire shape the
/// adapter sends upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub tool_call_id: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Developer,
    Tool,
}

/// `{toolCallId, toolName, args}` emitted by the model (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: serde_json::Value,
}

/// Cooperative abort signal shared across driver → sink → executor (§5).
#[derive(Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The result of one `run` call: final text, any tool calls requested, and
/// whether the turn ended early.
#[derive(Debug, Clone)]
pub struct AdapterTurn {
    pub final_text: String,
    pub tool_calls: Vec<ToolCall>,
    pub was_aborted: bool,
    pub was_truncated: bool,
}

/// A tool descriptor as advertised upstream; kept separate from
/// `catalog::ToolDescriptor` so the adapter boundary doesn't leak the
/// catalog's JSON-schema validator type across the port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolAdvertisement {
    pub name: String,
    pub description: String,
    pub schema: serde_json::Value,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Drive one assistant turn: stream text into `sink`, and collect any
    /// tool calls the model emits. Adapters are required to surface
    /// tool-call boundaries at the same granularity the provider emits
    /// them; batching or splitting is forbidden (spec.md §4.8).
    async fn run(
        &self,
        messages: &[Message],
        tools: Option<&[ToolAdvertisement]>,
        sink: &mut StreamSink<'_>,
        abort: &AbortSignal,
    ) -> Result<AdapterTurn, OrchestratorError>;
}
