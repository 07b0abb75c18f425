//! Assembles parallel tool-call deltas (keyed by id) into complete
//! `ToolCall`s, kept near-verbatim from `km-tools::llm::provider`'s
//! `ToolCallAssembler`.

use crate::provider::ToolCall;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ToolCallAssembler {
    calls: HashMap<String, PartialToolCall>,
    /// Preserves first-seen order so assembled calls come back in emission
    /// order (spec.md §5: tool calls within a turn are processed in
    /// emission order).
    order: Vec<String>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: Option<String>,
    arguments: String,
}

impl ToolCallAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_delta(&mut self, id: String, name: Option<String>, arguments_delta: Option<String>) {
        if !self.calls.contains_key(&id) {
            self.order.push(id.clone());
        }
        let call = self.calls.entry(id.clone()).or_insert_with(|| PartialToolCall {
            id: id.clone(),
            name: None,
            arguments: String::new(),
        });

        if let Some(n) = name {
            call.name = Some(n);
        }
        if let Some(delta) = arguments_delta {
            call.arguments.push_str(&delta);
        }
    }

    /// Assemble all completed tool calls, in the order their ids first
    /// appeared.
    pub fn into_tool_calls(self) -> Result<Vec<ToolCall>, serde_json::Error> {
        let mut calls = self.calls;
        self.order
            .into_iter()
            .map(|id| {
                let partial = calls.remove(&id).expect("order tracks every inserted id");
                let args = if partial.arguments.is_empty() {
                    serde_json::Value::Object(Default::default())
                } else {
                    serde_json::from_str(&partial.arguments)?
                };
                Ok(ToolCall {
                    tool_call_id: partial.id,
                    tool_name: partial.name.unwrap_or_default(),
                    args,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_single_call_from_multiple_deltas() {
        let mut assembler = ToolCallAssembler::new();
        assembler.process_delta("c1".to_string(), Some("vault_search".to_string()), Some("{\"que".to_string()));
        assembler.process_delta("c1".to_string(), None, Some("ry\":\"x\"}".to_string()));
        let calls = assembler.into_tool_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "vault_search");
        assert_eq!(calls[0].args, serde_json::json!({ "query": "x" }));
    }

    #[test]
    fn preserves_emission_order_across_interleaved_deltas() {
        let mut assembler = ToolCallAssembler::new();
        assembler.process_delta("c1".to_string(), Some("a".to_string()), Some("{}".to_string()));
        assembler.process_delta("c2".to_string(), Some("b".to_string()), Some("{}".to_string()));
        assembler.process_delta("c1".to_string(), None, Some("".to_string()));
        let calls = assembler.into_tool_calls().unwrap();
        assert_eq!(calls[0].tool_call_id, "c1");
        assert_eq!(calls[1].tool_call_id, "c2");
    }

    #[test]
    fn empty_arguments_default_to_empty_object() {
        let mut assembler = ToolCallAssembler::new();
        assembler.process_delta("c1".to_string(), Some("noop".to_string()), None);
        let calls = assembler.into_tool_calls().unwrap();
        assert_eq!(calls[0].args, serde_json::json!({}));
    }
}
