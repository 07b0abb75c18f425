//! Disclosure Filter (C5) — second-stage gate on data visibility.
//!
//! Approval (C3) decides whether a tool may *run*; disclosure decides
//! whether its *output* may reach the model. spec.md §9 models both
//! checkpoints with the same oracle shape deliberately, so a host can render
//! them as the same kind of dialog without the orchestrator caring.
//! Applies to `vault_search` and `web_search` results only (spec.md §4.5);
//! `file_read` bypasses this filter entirely.
//!
//! Every candidate is individually toggleable, initially selected
//! (spec.md §4.5): `DisclosureDecision` carries the selected subset itself,
//! not a blanket allow/withhold, so scenario S2's "deselect the 2nd of 3
//! hits" is representable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisclosureRequest {
    pub call_id: String,
    pub tool_name: String,
    /// The search query the candidates were found for, shown alongside the
    /// toggle list so the user has context for each candidate.
    pub query: String,
    /// The candidate result items the executor produced, before the model
    /// sees any of them — each individually toggleable.
    pub candidates: Vec<Value>,
    pub model_label: String,
}

/// `{approved, approvedSubset}` (spec.md §3). Cancel returns
/// `{approved: false, approved_subset: []}`, materialized as an empty tool
/// result rather than a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct DisclosureDecision {
    pub approved: bool,
    pub approved_subset: Vec<Value>,
}

impl DisclosureDecision {
    pub fn allow_all(candidates: Vec<Value>) -> Self {
        Self { approved: true, approved_subset: candidates }
    }

    pub fn withhold_all() -> Self {
        Self { approved: false, approved_subset: Vec::new() }
    }
}

#[async_trait]
pub trait DisclosureOracle: Send + Sync {
    async fn request_disclosure(&self, request: DisclosureRequest) -> DisclosureDecision;
}

/// Always-allow-everything oracle for when
/// `GlobalSettings::require_disclosure_review` is false.
pub struct PassthroughOracle;

#[async_trait]
impl DisclosureOracle for PassthroughOracle {
    async fn request_disclosure(&self, request: DisclosureRequest) -> DisclosureDecision {
        DisclosureDecision::allow_all(request.candidates)
    }
}

/// Test/reference oracle, mirrors `approval::ScriptedOracle`: selects
/// candidates by index per call id, so a scenario like S2 ("deselect the
/// 2nd of 3 hits") is one line to script.
pub struct ScriptedDisclosureOracle {
    selected_indices: HashMap<String, Vec<usize>>,
    allow_by_default: bool,
}

impl ScriptedDisclosureOracle {
    pub fn always_allow() -> Self {
        Self { selected_indices: HashMap::new(), allow_by_default: true }
    }

    pub fn always_withhold() -> Self {
        Self { selected_indices: HashMap::new(), allow_by_default: false }
    }

    /// Script a specific call id to approve only the candidates at
    /// `indices` (0-based, into the order the executor returned them).
    pub fn select(mut self, call_id: impl Into<String>, indices: Vec<usize>) -> Self {
        self.selected_indices.insert(call_id.into(), indices);
        self
    }
}

#[async_trait]
impl DisclosureOracle for ScriptedDisclosureOracle {
    async fn request_disclosure(&self, request: DisclosureRequest) -> DisclosureDecision {
        if let Some(indices) = self.selected_indices.get(&request.call_id) {
            let subset = indices.iter().filter_map(|&i| request.candidates.get(i).cloned()).collect();
            return DisclosureDecision { approved: true, approved_subset: subset };
        }
        if self.allow_by_default {
            DisclosureDecision::allow_all(request.candidates)
        } else {
            DisclosureDecision::withhold_all()
        }
    }
}

/// Project a raw executor payload (`{results: [...]}`) down to the
/// disclosed subset. Denial yields an empty result set, not a failure
/// payload — the model sees "no results", per spec.md §4.5.
pub fn apply_decision(decision: &DisclosureDecision, _payload: Value) -> Value {
    serde_json::json!({ "results": decision.approved_subset })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<Value> {
        vec![
            serde_json::json!({ "path": "A.md", "preview": "a" }),
            serde_json::json!({ "path": "B.md", "preview": "b" }),
            serde_json::json!({ "path": "C.md", "preview": "c" }),
        ]
    }

    #[tokio::test]
    async fn passthrough_allows_every_candidate() {
        let oracle = PassthroughOracle;
        let decision = oracle
            .request_disclosure(DisclosureRequest {
                call_id: "c1".to_string(),
                tool_name: "vault_search".to_string(),
                query: "budget".to_string(),
                candidates: candidates(),
                model_label: "openai@gpt-5.2".to_string(),
            })
            .await;
        assert!(decision.approved);
        assert_eq!(decision.approved_subset.len(), 3);
    }

    /// Scenario S2(d/e): deselect the 2nd of 3 hits, disclose only 1st/3rd.
    #[tokio::test]
    async fn scripted_oracle_can_select_a_subset_of_candidates() {
        let oracle = ScriptedDisclosureOracle::always_allow().select("c1", vec![0, 2]);
        let decision = oracle
            .request_disclosure(DisclosureRequest {
                call_id: "c1".to_string(),
                tool_name: "vault_search".to_string(),
                query: "budget".to_string(),
                candidates: candidates(),
                model_label: "openai@gpt-5.2".to_string(),
            })
            .await;
        assert!(decision.approved);
        let paths: Vec<&str> = decision.approved_subset.iter().map(|c| c["path"].as_str().unwrap()).collect();
        assert_eq!(paths, vec!["A.md", "C.md"]);
    }

    #[test]
    fn withheld_payload_yields_empty_results_not_a_failure() {
        let payload = serde_json::json!({ "results": candidates() });
        let result = apply_decision(&DisclosureDecision::withhold_all(), payload);
        assert_eq!(result["results"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn allowed_subset_projects_payload_down_to_selection() {
        let payload = serde_json::json!({ "results": candidates() });
        let decision = DisclosureDecision {
            approved: true,
            approved_subset: vec![candidates()[0].clone(), candidates()[2].clone()],
        };
        let result = apply_decision(&decision, payload);
        assert_eq!(result["results"].as_array().unwrap().len(), 2);
    }
}
