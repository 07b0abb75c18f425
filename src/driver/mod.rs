//! Conversation Driver (C6) — the central loop.
//!
//! Grounded on `km-tools::llm::helpers::chat_loop_with_tools` for the
//! rounds-loop shape (call provider, inspect for tool calls, submit results,
//! repeat) and its `log(...)` call density, plus
//! `other_examples/673b3c84_..._agent_loop-mod.rs` for the circuit-breaker /
//! repeated-signature guard — adapted here to dispatch into the teacher's
//! own, more reusable `LoopGuard` (`driver::loop_guard`) rather than
//! reimplementing the hash-signature approach from scratch.

pub mod loop_guard;

use crate::approval::{ApprovalDecision, ApprovalOracle, ApprovalRequest};
use crate::catalog::ToolCatalog;
use crate::config::{DocumentConfig, GlobalSettings};
use crate::disclosure::{DisclosureOracle, DisclosureRequest};
use crate::error::{OrchestratorError, ToolError};
use crate::executors::ExecutorSet;
use crate::gate::CapabilityGate;
use crate::provider::{AbortSignal, Message, ProviderAdapter, Role, ToolAdvertisement, ToolCall};
use crate::sink::StreamSink;
use crate::transcript;
use loop_guard::{LoopAction, LoopGuard};
use std::sync::Arc;

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// No tool calls in the final turn: the conversation is done.
    Done,
    /// The abort signal was observed.
    Aborted,
    /// `max_rounds` was exhausted without the model stopping.
    RoundLimitReached,
    /// The loop guard escalated to `Terminate`.
    LoopGuardTerminated,
}

#[derive(Debug, Clone)]
pub struct DriverOutcome {
    pub messages: Vec<Message>,
    pub stop_reason: StopReason,
}

pub struct ConversationDriver {
    gate: Arc<CapabilityGate>,
    catalog: Arc<ToolCatalog>,
    approval: Arc<dyn ApprovalOracle>,
    disclosure: Arc<dyn DisclosureOracle>,
    executors: Arc<ExecutorSet>,
    adapter: Arc<dyn ProviderAdapter>,
}

impl ConversationDriver {
    pub fn new(
        gate: Arc<CapabilityGate>,
        catalog: Arc<ToolCatalog>,
        approval: Arc<dyn ApprovalOracle>,
        disclosure: Arc<dyn DisclosureOracle>,
        executors: Arc<ExecutorSet>,
        adapter: Arc<dyn ProviderAdapter>,
    ) -> Self {
        Self {
            gate,
            catalog,
            approval,
            disclosure,
            executors,
            adapter,
        }
    }

    /// Run the loop to completion, per spec.md §4.6's pseudocode, plus the
    /// additive `LoopGuard` check before each tool dispatch.
    pub async fn run(
        &self,
        mut messages: Vec<Message>,
        config: &DocumentConfig,
        settings: &GlobalSettings,
        sink: &mut StreamSink<'_>,
        abort: &AbortSignal,
    ) -> Result<DriverOutcome, OrchestratorError> {
        let mut loop_guard = LoopGuard::new();
        let tools_enabled = settings.enable_tool_calling && self.gate.may_use_tools(&config.full_model_id());

        if let Some(plugin_system_message) = &settings.plugin_system_message {
            messages.insert(
                0,
                Message {
                    role: Role::System,
                    content: plugin_system_message.clone(),
                    tool_call_id: None,
                    model: None,
                },
            );
        }

        for round in 0..config.max_rounds {
            if abort.is_aborted() {
                return Ok(DriverOutcome { messages, stop_reason: StopReason::Aborted });
            }

            let advertisements = self.advertisements_for(tools_enabled);
            let heading = transcript::heading_markup(settings.heading_level, Role::Assistant);
            sink.begin_turn(&heading, &config.full_model_id());

            let turn = self
                .adapter
                .run(&messages, advertisements.as_deref(), sink, abort)
                .await?;
            let session = sink.end_turn("", "");

            crate::logger::log(format!(
                "driver: round {} produced {} tool call(s), aborted={}, truncated={}",
                round,
                turn.tool_calls.len(),
                turn.was_aborted,
                turn.was_truncated
            ));

            messages.push(Message {
                role: Role::Assistant,
                content: session.accumulated_text,
                tool_call_id: None,
                model: Some(config.full_model_id()),
            });

            if turn.was_aborted {
                return Ok(DriverOutcome { messages, stop_reason: StopReason::Aborted });
            }

            if turn.tool_calls.is_empty() {
                return Ok(DriverOutcome { messages, stop_reason: StopReason::Done });
            }

            // Tool calls within a turn are handled sequentially, in
            // emission order (spec.md §4.6 ordering guarantee).
            for tool_call in &turn.tool_calls {
                if abort.is_aborted() {
                    return Ok(DriverOutcome { messages, stop_reason: StopReason::Aborted });
                }

                if let Some(detection) = loop_guard.check(tool_call) {
                    if let Some(warning) = &detection.warning_message {
                        messages.push(Message {
                            role: Role::Tool,
                            content: warning.clone(),
                            tool_call_id: Some(tool_call.tool_call_id.clone()),
                            model: None,
                        });
                    }
                    if detection.action == LoopAction::Terminate {
                        return Ok(DriverOutcome { messages, stop_reason: StopReason::LoopGuardTerminated });
                    }
                }

                let result_content = self.dispatch_tool_call(tool_call, settings, &config.full_model_id()).await;
                messages.push(Message {
                    role: Role::Tool,
                    content: result_content,
                    tool_call_id: Some(tool_call.tool_call_id.clone()),
                    model: None,
                });
            }
        }

        Ok(DriverOutcome { messages, stop_reason: StopReason::RoundLimitReached })
    }

    fn advertisements_for(&self, enabled: bool) -> Option<Vec<ToolAdvertisement>> {
        let descriptors = self.catalog.tools_for_request(enabled);
        if descriptors.is_empty() {
            return None;
        }
        Some(
            descriptors
                .into_iter()
                .map(|d| ToolAdvertisement {
                    name: d.kind.name().to_string(),
                    description: d.description.to_string(),
                    schema: d.schema.clone(),
                })
                .collect(),
        )
    }

    /// One tool call, through approval → execution → disclosure, collapsed
    /// into the `role=tool` message content string the driver appends.
    async fn dispatch_tool_call(&self, tool_call: &ToolCall, settings: &GlobalSettings, model_label: &str) -> String {
        let kind = match self.catalog.validate_call(&tool_call.tool_name, &tool_call.args) {
            Ok(kind) => kind,
            Err(err) => return err.as_payload().to_string(),
        };

        let decision = if settings.is_auto_approved(&tool_call.tool_name) {
            ApprovalDecision::approved()
        } else {
            let request = ApprovalRequest {
                call_id: tool_call.tool_call_id.clone(),
                tool_name: tool_call.tool_name.clone(),
                arguments: tool_call.args.clone(),
                model_label: model_label.to_string(),
            };
            self.approval.request_approval(request).await
        };

        if !decision.approved {
            crate::logger::log(format!("driver: call {} denied at approval", tool_call.tool_call_id));
            return ToolError::UserCancelled.as_payload().to_string();
        }

        // §4.6: `executor.run(approval.modifiedArgs ?? toolCall.args, ctx)`.
        let effective_args = decision.modified_args.as_ref().unwrap_or(&tool_call.args);

        let raw_result = match self.executors.run(kind, effective_args).await {
            Ok(value) => value,
            Err(err) => return err.as_payload().to_string(),
        };

        if !kind.requires_disclosure_review() || !settings.require_disclosure_review {
            return raw_result.to_string();
        }

        let query = effective_args.get("query").and_then(|v| v.as_str()).unwrap_or("").to_string();
        let candidates = raw_result
            .get("results")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        let disclosure_request = DisclosureRequest {
            call_id: tool_call.tool_call_id.clone(),
            tool_name: tool_call.tool_name.clone(),
            query,
            candidates,
            model_label: model_label.to_string(),
        };
        let disclosure_decision = self.disclosure.request_disclosure(disclosure_request).await;
        let disclosed_count = disclosure_decision.approved_subset.len();
        let disclosed = crate::disclosure::apply_decision(&disclosure_decision, raw_result);

        if !disclosure_decision.approved || disclosed_count == 0 {
            crate::logger::log(format!("driver: call {} withheld at disclosure", tool_call.tool_call_id));
        }

        disclosed.to_string()
    }
}
