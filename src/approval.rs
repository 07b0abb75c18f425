//! Approval Broker (C3) — human-in-the-loop gate on tool execution.
//!
//! spec.md §9 models approval as pure data flow: a request goes out, the
//! Conversation Driver suspends on `.await`, a response comes back. No modal
//! callback, no UI coupling in this module at all. Grounded directly on
//! `other_examples/673b3c84_elisplash-paw__src-tauri-src-engine-agent_loop-mod.rs`'s
//! `pending_approvals: Mutex<HashMap<String, oneshot::Sender<bool>>>` plus
//! `tokio::time::timeout` pattern.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

/// What the host shows the user when a tool call needs a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub call_id: String,
    pub tool_name: String,
    pub arguments: Value,
    pub model_label: String,
}

/// `{approved, modifiedArgs?}` (spec.md §3). For `sideEffectClass=readFile`
/// the broker additionally presents per-item toggles over `args.filePaths`;
/// `modified_args`, when present, reflects that selection and is what the
/// driver dispatches to the executor instead of the call's original `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    pub modified_args: Option<Value>,
}

impl ApprovalDecision {
    pub fn approved() -> Self {
        Self { approved: true, modified_args: None }
    }

    /// Approved, but with the arguments the executor should actually see —
    /// e.g. `args.filePaths` narrowed by the per-item toggle pass.
    pub fn approved_with_args(modified_args: Value) -> Self {
        Self { approved: true, modified_args: Some(modified_args) }
    }

    pub fn denied() -> Self {
        Self { approved: false, modified_args: None }
    }
}

/// The suspension point the Conversation Driver calls through. A production
/// implementation suspends on real human input; a test implementation can
/// resolve immediately from a script.
#[async_trait]
pub trait ApprovalOracle: Send + Sync {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalDecision;
}

/// Production oracle: registers a oneshot sender per call id, emits the
/// request for the host to render, and waits (bounded by `timeout`) for the
/// host to resolve it via `resolve`.
pub struct ChannelApprovalBroker {
    pending: Mutex<HashMap<String, oneshot::Sender<ApprovalDecision>>>,
    timeout: Duration,
}

impl ChannelApprovalBroker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Called by the host UI once the user picks approve, deny, or approves
    /// with a narrowed `modifiedArgs`.
    ///
    /// Returns `false` if the call id was not pending (already resolved or
    /// timed out), matching spec.md §4.3's "late resolution is a no-op".
    pub fn resolve(&self, call_id: &str, decision: ApprovalDecision) -> bool {
        let sender = {
            let mut pending = self.pending.lock().expect("lock poisoned");
            pending.remove(call_id)
        };
        match sender {
            Some(tx) => tx.send(decision).is_ok(),
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("lock poisoned").len()
    }
}

#[async_trait]
impl ApprovalOracle for ChannelApprovalBroker {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalDecision {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().expect("lock poisoned");
            pending.insert(request.call_id.clone(), tx);
        }

        crate::logger::log(format!(
            "approval: requested for call {} ({})",
            request.call_id, request.tool_name
        ));

        let decision = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(_)) => {
                crate::logger::log(format!(
                    "approval: sender dropped for call {}, denying",
                    request.call_id
                ));
                ApprovalDecision::denied()
            }
            Err(_) => {
                crate::logger::log(format!(
                    "approval: timed out for call {}, denying",
                    request.call_id
                ));
                let mut pending = self.pending.lock().expect("lock poisoned");
                pending.remove(&request.call_id);
                ApprovalDecision::denied()
            }
        };

        crate::logger::log(format!(
            "approval: resolved call {} as approved={}",
            request.call_id, decision.approved
        ));
        decision
    }
}

/// Test/reference oracle: resolves from a scripted map or a default
/// decision, so driver tests don't need a real human or a timeout.
pub struct ScriptedOracle {
    scripted: HashMap<String, ApprovalDecision>,
    default: ApprovalDecision,
    requests: AtomicUsize,
}

impl ScriptedOracle {
    pub fn always(decision: ApprovalDecision) -> Self {
        Self {
            scripted: HashMap::new(),
            default: decision,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn with_decisions(scripted: HashMap<String, ApprovalDecision>, default: ApprovalDecision) -> Self {
        Self {
            scripted,
            default,
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of times `request_approval` has been called, for asserting
    /// invariant 3 (one dialog per tool call, regardless of decision).
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApprovalOracle for ScriptedOracle {
    async fn request_approval(&self, request: ApprovalRequest) -> ApprovalDecision {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.scripted
            .get(&request.call_id)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Convert a denied decision into the `{error: ...}` payload fed back to the
/// model as a tool result (spec.md §4.3).
pub fn denial_error() -> ToolError {
    ToolError::UserCancelled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_oracle_honors_per_call_override() {
        let mut decisions = HashMap::new();
        decisions.insert("call-1".to_string(), ApprovalDecision::denied());
        let oracle = ScriptedOracle::with_decisions(decisions, ApprovalDecision::approved());

        let denied = oracle
            .request_approval(ApprovalRequest {
                call_id: "call-1".to_string(),
                tool_name: "file_read".to_string(),
                arguments: serde_json::json!({}),
                model_label: "openai@gpt-5.2".to_string(),
            })
            .await;
        assert_eq!(denied, ApprovalDecision::denied());

        let approved = oracle
            .request_approval(ApprovalRequest {
                call_id: "call-2".to_string(),
                tool_name: "file_read".to_string(),
                arguments: serde_json::json!({}),
                model_label: "openai@gpt-5.2".to_string(),
            })
            .await;
        assert_eq!(approved, ApprovalDecision::approved());
    }

    /// Scenario S4: the user deselects "B.md" in the per-file toggle pass;
    /// the oracle returns `modifiedArgs` with only "A.md"/"C.md".
    #[tokio::test]
    async fn scripted_oracle_can_narrow_args_via_per_file_toggle() {
        let mut decisions = HashMap::new();
        decisions.insert(
            "call-s4".to_string(),
            ApprovalDecision::approved_with_args(serde_json::json!({ "filePaths": ["A.md", "C.md"] })),
        );
        let oracle = ScriptedOracle::with_decisions(decisions, ApprovalDecision::approved());

        let decision = oracle
            .request_approval(ApprovalRequest {
                call_id: "call-s4".to_string(),
                tool_name: "file_read".to_string(),
                arguments: serde_json::json!({ "filePaths": ["A.md", "B.md", "C.md"] }),
                model_label: "openai@gpt-5.2".to_string(),
            })
            .await;

        assert!(decision.approved);
        let modified = decision.modified_args.unwrap();
        assert_eq!(modified["filePaths"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn channel_broker_resolves_with_host_decision() {
        let broker = ChannelApprovalBroker::new(Duration::from_secs(5));
        let request = ApprovalRequest {
            call_id: "call-42".to_string(),
            tool_name: "vault_search".to_string(),
            arguments: serde_json::json!({ "query": "x" }),
            model_label: "openai@gpt-5.2".to_string(),
        };

        let broker_ref = &broker;
        let (decision, _) = tokio::join!(
            broker_ref.request_approval(request),
            async {
                // Give request_approval a chance to register the sender.
                tokio::task::yield_now().await;
                assert!(broker_ref.resolve("call-42", ApprovalDecision::approved()));
            }
        );
        assert_eq!(decision, ApprovalDecision::approved());
    }

    #[tokio::test]
    async fn channel_broker_denies_on_timeout() {
        let broker = ChannelApprovalBroker::new(Duration::from_millis(20));
        let decision = broker
            .request_approval(ApprovalRequest {
                call_id: "call-timeout".to_string(),
                tool_name: "web_search".to_string(),
                arguments: serde_json::json!({ "query": "x" }),
                model_label: "openai@gpt-5.2".to_string(),
            })
            .await;
        assert_eq!(decision, ApprovalDecision::denied());
        assert_eq!(broker.pending_count(), 0);
    }

    #[test]
    fn resolve_unknown_call_id_is_a_no_op() {
        let broker = ChannelApprovalBroker::new(Duration::from_secs(5));
        assert!(!broker.resolve("never-requested", ApprovalDecision::approved()));
    }
}
