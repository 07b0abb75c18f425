//! Reference/test adapter: replays a pre-programmed sequence of content
//! deltas and tool-call deltas, reusing `ToolCallAssembler` exactly as
//! `km-tools::llm::provider` does for streamed deltas. Concrete per-provider
//! SDK bindings are out of scope (spec.md §1); this is what exercises the
//! rest of the orchestrator end-to-end.

use crate::error::OrchestratorError;
use crate::provider::assembler::ToolCallAssembler;
use crate::provider::{AbortSignal, AdapterTurn, Message, ProviderAdapter, ToolAdvertisement, ToolCall};
use crate::sink::StreamSink;
use async_trait::async_trait;
use std::sync::Mutex;

/// One step of a scripted turn.
#[derive(Debug, Clone)]
pub enum ScriptEvent {
    Content(String),
    ToolCallDelta {
        id: String,
        name: Option<String>,
        arguments_delta: Option<String>,
    },
    Truncated,
}

/// A full scripted conversation: one `Vec<ScriptEvent>` per turn, consumed
/// in order as `run` is called repeatedly by the Conversation Driver.
pub struct ScriptedAdapter {
    turns: Mutex<Vec<Vec<ScriptEvent>>>,
}

impl ScriptedAdapter {
    pub fn new(turns: Vec<Vec<ScriptEvent>>) -> Self {
        Self {
            turns: Mutex::new(turns),
        }
    }

    /// A single-turn adapter that just emits `text` and ends.
    pub fn single_text_turn(text: impl Into<String>) -> Self {
        Self::new(vec![vec![ScriptEvent::Content(text.into())]])
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    async fn run(
        &self,
        _messages: &[Message],
        _tools: Option<&[ToolAdvertisement]>,
        sink: &mut StreamSink<'_>,
        abort: &AbortSignal,
    ) -> Result<AdapterTurn, OrchestratorError> {
        let events = {
            let mut turns = self.turns.lock().expect("lock poisoned");
            if turns.is_empty() {
                Vec::new()
            } else {
                turns.remove(0)
            }
        };

        let mut assembler = ToolCallAssembler::new();
        let mut was_truncated = false;
        let mut was_aborted = false;

        for event in events {
            if abort.is_aborted() || sink.is_aborted() {
                was_aborted = true;
                break;
            }

            match event {
                ScriptEvent::Content(text) => sink.append_delta(&text),
                ScriptEvent::ToolCallDelta { id, name, arguments_delta } => {
                    assembler.process_delta(id, name, arguments_delta);
                }
                ScriptEvent::Truncated => {
                    was_truncated = true;
                    sink.append_truncation_warning();
                }
            }

            // Yield between deltas so abort checks observe concurrent
            // cancellation (spec.md §5: abort is polled between deltas).
            tokio::task::yield_now().await;
        }

        let tool_calls: Vec<ToolCall> = assembler
            .into_tool_calls()
            .map_err(OrchestratorError::MalformedResponse)?;

        let final_text = sink.session().map(|s| s.accumulated_text.clone()).unwrap_or_default();

        Ok(AdapterTurn {
            final_text,
            tool_calls,
            was_aborted: was_aborted || sink.is_aborted(),
            was_truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{StreamSink, StringDocument};

    #[tokio::test]
    async fn replays_content_only_turn() {
        let adapter = ScriptedAdapter::single_text_turn("hello there");
        let mut doc = StringDocument::default();
        let mut sink = StreamSink::new(&mut doc);
        sink.begin_turn("### role::assistant", "scripted@v1");
        let abort = AbortSignal::new();

        let turn = adapter.run(&[], None, &mut sink, &abort).await.unwrap();
        assert_eq!(turn.final_text, "hello there");
        assert!(turn.tool_calls.is_empty());
        assert!(!turn.was_aborted);
    }

    #[tokio::test]
    async fn assembles_tool_call_from_scripted_deltas() {
        let adapter = ScriptedAdapter::new(vec![vec![
            ScriptEvent::ToolCallDelta {
                id: "call-1".to_string(),
                name: Some("vault_search".to_string()),
                arguments_delta: Some("{\"query\":\"bud".to_string()),
            },
            ScriptEvent::ToolCallDelta {
                id: "call-1".to_string(),
                name: None,
                arguments_delta: Some("get\"}".to_string()),
            },
        ]]);
        let mut doc = StringDocument::default();
        let mut sink = StreamSink::new(&mut doc);
        sink.begin_turn("### role::assistant", "scripted@v1");
        let abort = AbortSignal::new();

        let turn = adapter.run(&[], None, &mut sink, &abort).await.unwrap();
        assert_eq!(turn.tool_calls.len(), 1);
        assert_eq!(turn.tool_calls[0].tool_name, "vault_search");
        assert_eq!(turn.tool_calls[0].args, serde_json::json!({ "query": "budget" }));
    }

    #[tokio::test]
    async fn triggered_abort_signal_stops_mid_turn() {
        let adapter = ScriptedAdapter::new(vec![vec![
            ScriptEvent::Content("one".to_string()),
            ScriptEvent::Content("two".to_string()),
            ScriptEvent::Content("three".to_string()),
        ]]);
        let mut doc = StringDocument::default();
        let mut sink = StreamSink::new(&mut doc);
        sink.begin_turn("### role::assistant", "scripted@v1");
        let abort = AbortSignal::new();
        abort.trigger();

        let turn = adapter.run(&[], None, &mut sink, &abort).await.unwrap();
        assert!(turn.was_aborted);
        assert_eq!(turn.final_text, "");
    }

    #[tokio::test]
    async fn truncation_appends_warning_marker_once() {
        let adapter = ScriptedAdapter::new(vec![vec![
            ScriptEvent::Content("partial".to_string()),
            ScriptEvent::Truncated,
        ]]);
        let mut doc = StringDocument::default();
        let mut sink = StreamSink::new(&mut doc);
        sink.begin_turn("### role::assistant", "scripted@v1");
        let abort = AbortSignal::new();

        let turn = adapter.run(&[], None, &mut sink, &abort).await.unwrap();
        assert!(turn.was_truncated);
        assert_eq!(turn.final_text.matches("token limit reached").count(), 1);
    }
}
