//! Runaway-tool-call protection, kept near-verbatim from
//! `km-tools::llm::loop_detector::LoopDetector` (exact-duplicate detection
//! plus A→B→A→B pattern detection over a sliding window), adapted from the
//! teacher's own `ToolCall{id,name,arguments}` shape to
//! `provider::ToolCall{tool_call_id,tool_name,args}`. Additive to spec.md's
//! pseudocode: the spec's §4.6 loop has no runaway guard of its own, so this
//! sits as an extra check the driver consults before dispatching a call.

use crate::provider::ToolCall;
use serde_json::Value;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Warn,
    Terminate,
}

#[derive(Debug, Clone)]
pub struct LoopGuardConfig {
    pub max_exact_duplicates: usize,
    pub exact_window_size: usize,
    pub enable_pattern_detection: bool,
    pub min_pattern_length: usize,
    pub max_pattern_length: usize,
    pub pattern_window_size: usize,
    pub first_detection_action: LoopAction,
    pub second_detection_action: LoopAction,
    pub third_detection_action: LoopAction,
}

impl Default for LoopGuardConfig {
    fn default() -> Self {
        Self {
            max_exact_duplicates: 3,
            exact_window_size: 10,
            enable_pattern_detection: true,
            min_pattern_length: 2,
            max_pattern_length: 3,
            pattern_window_size: 20,
            first_detection_action: LoopAction::Warn,
            second_detection_action: LoopAction::Warn,
            third_detection_action: LoopAction::Terminate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopKind {
    ExactDuplicate { call: ToolCall, count: usize },
    Pattern { pattern: Vec<ToolCall>, repetitions: usize },
}

#[derive(Debug, Clone)]
pub struct LoopDetection {
    pub loop_kind: LoopKind,
    pub action: LoopAction,
    pub detection_count: usize,
    pub warning_message: Option<String>,
}

struct CallRecord {
    call: ToolCall,
}

pub struct LoopGuard {
    config: LoopGuardConfig,
    recent_calls: VecDeque<CallRecord>,
    detection_count: usize,
}

impl LoopGuard {
    pub fn new() -> Self {
        Self::with_config(LoopGuardConfig::default())
    }

    pub fn with_config(config: LoopGuardConfig) -> Self {
        let capacity = config.exact_window_size.max(config.pattern_window_size);
        Self {
            config,
            recent_calls: VecDeque::with_capacity(capacity),
            detection_count: 0,
        }
    }

    pub fn check(&mut self, call: &ToolCall) -> Option<LoopDetection> {
        if let Some(mut detection) = self.check_exact_duplicate(call) {
            self.detection_count += 1;
            self.apply_action_policy(&mut detection);
            self.record_call(call);
            return Some(detection);
        }

        if self.config.enable_pattern_detection {
            if let Some(mut detection) = self.check_pattern(call) {
                self.detection_count += 1;
                self.apply_action_policy(&mut detection);
                self.record_call(call);
                return Some(detection);
            }
        }

        self.record_call(call);
        None
    }

    fn apply_action_policy(&self, detection: &mut LoopDetection) {
        detection.detection_count = self.detection_count;
        let action = match self.detection_count {
            1 => self.config.first_detection_action,
            2 => self.config.second_detection_action,
            _ => self.config.third_detection_action,
        };
        detection.action = action;
        if action == LoopAction::Warn {
            detection.warning_message = Some(self.generate_warning_message(detection));
        }
    }

    fn generate_warning_message(&self, detection: &LoopDetection) -> String {
        let ordinal = match self.detection_count {
            1 => "first",
            2 => "second",
            3 => "third",
            n => return format!("Loop detected {} times", n),
        };

        let description = match &detection.loop_kind {
            LoopKind::ExactDuplicate { call, count } => format!(
                "You have called the tool '{}' with identical arguments {} times in a row",
                call.tool_name, count
            ),
            LoopKind::Pattern { pattern, repetitions } => {
                let names: Vec<_> = pattern.iter().map(|c| c.tool_name.as_str()).collect();
                format!(
                    "You are repeating a pattern of {} tool calls: [{}] (repeated {} times)",
                    pattern.len(),
                    names.join(" → "),
                    repetitions
                )
            }
        };

        format!(
            "LOOP DETECTION WARNING ({}): {}\n\nThis appears to be unproductive behavior. \
             Try a different approach, ask the user for clarification, or stop. If the \
             pattern continues, the conversation may be terminated.",
            ordinal, description
        )
    }

    fn check_exact_duplicate(&self, call: &ToolCall) -> Option<LoopDetection> {
        let count = self
            .recent_calls
            .iter()
            .rev()
            .take(self.config.exact_window_size)
            .filter(|r| Self::calls_equal(&r.call, call))
            .count();

        if count >= self.config.max_exact_duplicates {
            Some(LoopDetection {
                loop_kind: LoopKind::ExactDuplicate { call: call.clone(), count: count + 1 },
                action: LoopAction::Warn,
                detection_count: 0,
                warning_message: None,
            })
        } else {
            None
        }
    }

    fn check_pattern(&self, call: &ToolCall) -> Option<LoopDetection> {
        let min_required = self.config.min_pattern_length * 2;
        if self.recent_calls.len() < min_required {
            return None;
        }
        for pattern_len in self.config.min_pattern_length..=self.config.max_pattern_length {
            if let Some(detection) = self.check_pattern_of_length(call, pattern_len) {
                return Some(detection);
            }
        }
        None
    }

    fn check_pattern_of_length(&self, call: &ToolCall, pattern_len: usize) -> Option<LoopDetection> {
        if self.recent_calls.len() < pattern_len * 2 {
            return None;
        }

        let recent: Vec<_> = self.recent_calls.iter().rev().take(pattern_len).collect();
        let prev_pattern: Vec<_> = self.recent_calls.iter().rev().skip(pattern_len).take(pattern_len).collect();

        let matches = recent
            .iter()
            .zip(prev_pattern.iter())
            .all(|(a, b)| Self::calls_equal(&a.call, &b.call));
        if !matches {
            return None;
        }

        if !Self::calls_equal(call, &recent[recent.len() - 1].call) {
            return None;
        }

        let pattern: Vec<ToolCall> = recent.iter().rev().map(|r| r.call.clone()).collect();
        Some(LoopDetection {
            loop_kind: LoopKind::Pattern { pattern, repetitions: 2 },
            action: LoopAction::Warn,
            detection_count: 0,
            warning_message: None,
        })
    }

    fn record_call(&mut self, call: &ToolCall) {
        let max_size = self.config.exact_window_size.max(self.config.pattern_window_size);
        if self.recent_calls.len() >= max_size {
            self.recent_calls.pop_front();
        }
        self.recent_calls.push_back(CallRecord { call: call.clone() });
    }

    fn calls_equal(a: &ToolCall, b: &ToolCall) -> bool {
        a.tool_name == b.tool_name && Self::args_equal(&a.args, &b.args)
    }

    fn args_equal(a: &Value, b: &Value) -> bool {
        a == b
    }

    pub fn tracked_count(&self) -> usize {
        self.recent_calls.len()
    }

    pub fn clear(&mut self) {
        self.recent_calls.clear();
        self.detection_count = 0;
    }

    pub fn detection_count(&self) -> usize {
        self.detection_count
    }
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self::new()
    }
}
