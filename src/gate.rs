//! Capability Gate (C1) — decides whether a model may be offered tools.
//!
//! The gate is the single authority for tool suppression (spec.md §4.1); no
//! other component short-circuits tool availability on its own.

use once_cell_like::OnceCellSync;
use regex::Regex;
use std::sync::OnceLock;

/// `{provider, modelId}` pair. The canonical wire form is `provider@modelId`;
/// bare ids default to a configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelDescriptor {
    pub provider: String,
    pub model_id: String,
}

impl ModelDescriptor {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
        }
    }

    /// Canonical `provider@modelId` form.
    pub fn full_id(&self) -> String {
        format!("{}@{}", self.provider, self.model_id)
    }

    /// Parse a full or bare id, defaulting to `default_provider` when no
    /// `provider@` prefix is present.
    pub fn parse(raw: &str, default_provider: &str) -> Self {
        match raw.split_once('@') {
            Some((provider, model_id)) => Self::new(provider, model_id),
            None => Self::new(default_provider, raw),
        }
    }

    /// The bare id used for whitelist matching: strips the `provider@`
    /// prefix *and*, for composite ids like `openrouter@vendor/model`, the
    /// leading `vendor/` segment (spec.md §4.1).
    pub fn bare_id_for_matching(&self) -> &str {
        match self.model_id.split_once('/') {
            Some((_, rest)) => rest,
            None => &self.model_id,
        }
    }
}

/// One rule in a whitelist pattern set (spec.md §3 `WhitelistPattern`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WhitelistPattern {
    Exact(String),
    /// Matches `<base>` and `<base>-YYYYMMDD` / `<base>-YYYY-MM-DD`.
    DateSuffixed(String),
    /// Trailing `*` wildcard; stores the non-`*` prefix.
    Wildcard(String),
}

impl WhitelistPattern {
    fn matches(&self, date_re: &Regex, bare_id: &str) -> bool {
        match self {
            WhitelistPattern::Exact(base) => bare_id == base,
            WhitelistPattern::Wildcard(prefix) => bare_id.starts_with(prefix.as_str()),
            WhitelistPattern::DateSuffixed(base) => {
                if bare_id == base {
                    return true;
                }
                match bare_id.strip_prefix(base.as_str()) {
                    Some(suffix) => date_re.is_match(suffix),
                    None => false,
                }
            }
        }
    }

    fn to_line(&self) -> String {
        match self {
            WhitelistPattern::Exact(base) | WhitelistPattern::DateSuffixed(base) => base.clone(),
            WhitelistPattern::Wildcard(prefix) => format!("{}*", prefix),
        }
    }
}

fn date_suffix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-(\d{8}|\d{4}-\d{2}-\d{2})$").expect("valid regex"))
}

/// Parse one rule per non-empty, non-comment line of a whitelist string.
/// `#`-prefixed lines are comments; entries may also be comma-separated
/// within a line (spec.md §4.1).
pub fn parse_whitelist(text: &str) -> Vec<WhitelistPattern> {
    let mut patterns = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        for entry in line.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            patterns.push(parse_one(entry));
        }
    }
    patterns
}

fn parse_one(entry: &str) -> WhitelistPattern {
    if let Some(prefix) = entry.strip_suffix('*') {
        WhitelistPattern::Wildcard(prefix.to_string())
    } else {
        // A pattern is recorded as date-suffixed iff it is meant to also
        // match a date-stamped variant; since the grammar gives no separate
        // marker for this, any exact pattern is treated as
        // date-suffix-tolerant — an exact rule for "gpt-5.2" also matches
        // "gpt-5.2-20250601" per spec.md §4.1's auto-extension rule.
        WhitelistPattern::DateSuffixed(entry.to_string())
    }
}

/// Serialize a pattern set back to whitelist text, one rule per line.
/// `parse(serialize(patterns)) == patterns` is guaranteed (spec.md §8);
/// comments and blank lines are not round-tripped.
pub fn serialize_whitelist(patterns: &[WhitelistPattern]) -> String {
    patterns
        .iter()
        .map(WhitelistPattern::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A whitelist compiled once per settings change, per spec.md §9's
/// "capability gate as a precomputed predicate" design note.
#[derive(Debug, Clone)]
pub struct CompiledWhitelist {
    patterns: Vec<WhitelistPattern>,
}

impl CompiledWhitelist {
    pub fn compile(patterns: Vec<WhitelistPattern>) -> Self {
        Self { patterns }
    }

    pub fn from_text(text: &str) -> Self {
        Self::compile(parse_whitelist(text))
    }

    pub fn patterns(&self) -> &[WhitelistPattern] {
        &self.patterns
    }

    pub fn matches(&self, bare_id: &str) -> bool {
        let date_re = date_suffix_regex();
        self.patterns.iter().any(|p| p.matches(date_re, bare_id))
    }
}

/// `mayUseTools(modelFullId, whitelist) -> bool` (spec.md §4.1).
///
/// Deterministic and independent of pattern ordering within equivalence
/// classes: matching is a pure `any()` over the rule set.
pub fn may_use_tools(model: &ModelDescriptor, whitelist: &CompiledWhitelist) -> bool {
    whitelist.matches(model.bare_id_for_matching())
}

/// Canonical default whitelist. The specific list is data, not contract
/// (spec.md §4.1) — callers should treat this as a reasonable starting
/// point, not a frozen API guarantee.
pub fn reset_to_recommended() -> CompiledWhitelist {
    CompiledWhitelist::compile(vec![
        WhitelistPattern::Wildcard("gpt-5".to_string()),
        WhitelistPattern::Wildcard("claude-opus-4".to_string()),
        WhitelistPattern::Wildcard("claude-sonnet-4".to_string()),
        WhitelistPattern::Wildcard("gemini-2".to_string()),
    ])
}

/// Process-wide Capability Gate singleton: the compiled whitelist plus the
/// default provider used to resolve bare model ids.
pub struct CapabilityGate {
    whitelist: OnceCellSync<CompiledWhitelist>,
    default_provider: String,
}

impl CapabilityGate {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            whitelist: OnceCellSync::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Install or replace the compiled whitelist (e.g. after a settings
    /// change).
    pub fn set_whitelist(&self, whitelist: CompiledWhitelist) {
        self.whitelist.set(whitelist);
    }

    pub fn may_use_tools(&self, raw_model_id: &str) -> bool {
        let model = ModelDescriptor::parse(raw_model_id, &self.default_provider);
        match self.whitelist.get() {
            Some(wl) => may_use_tools(&model, wl),
            // No rule matches when no whitelist has been configured yet:
            // tools suppressed by default (spec.md §4.1 failure mode).
            None => false,
        }
    }
}

/// Tiny `OnceLock`-backed swappable cell, used so `CapabilityGate` can be a
/// `&'static`/`Arc`-shared singleton that still allows whitelist updates
/// without taking `&mut self` through the rest of the driver.
mod once_cell_like {
    use std::sync::RwLock;

    pub struct OnceCellSync<T> {
        inner: RwLock<Option<T>>,
    }

    impl<T: Clone> OnceCellSync<T> {
        pub fn new() -> Self {
            Self {
                inner: RwLock::new(None),
            }
        }

        pub fn set(&self, value: T) {
            *self.inner.write().expect("lock poisoned") = Some(value);
        }

        pub fn get(&self) -> Option<T> {
            self.inner.read().expect("lock poisoned").clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match() {
        let wl = CompiledWhitelist::from_text("gpt-5.2");
        assert!(wl.matches("gpt-5.2"));
        assert!(!wl.matches("gpt-5.3"));
    }

    #[test]
    fn wildcard_match() {
        let wl = CompiledWhitelist::from_text("gpt-5*");
        assert!(wl.matches("gpt-5.2"));
        assert!(wl.matches("gpt-5-mini"));
        assert!(!wl.matches("gpt-4"));
    }

    #[test]
    fn date_suffix_match_yyyymmdd() {
        let wl = CompiledWhitelist::from_text("gpt-5.2");
        assert!(wl.matches("gpt-5.2-20250601"));
    }

    #[test]
    fn date_suffix_match_dashed() {
        let wl = CompiledWhitelist::from_text("gpt-5.2");
        assert!(wl.matches("gpt-5.2-2025-06-01"));
    }

    #[test]
    fn date_suffix_rejects_garbage_suffix() {
        let wl = CompiledWhitelist::from_text("gpt-5.2");
        assert!(!wl.matches("gpt-5.2-beta"));
    }

    #[test]
    fn comments_and_blank_lines_ignored() {
        let wl = CompiledWhitelist::from_text("# comment\n\ngpt-5.2\n  # another\nclaude-opus-4-5");
        assert_eq!(wl.patterns().len(), 2);
    }

    #[test]
    fn comma_separated_entries() {
        let wl = CompiledWhitelist::from_text("gpt-5.2, claude-opus-4-5");
        assert_eq!(wl.patterns().len(), 2);
        assert!(wl.matches("gpt-5.2"));
        assert!(wl.matches("claude-opus-4-5"));
    }

    #[test]
    fn composite_id_strips_provider_and_vendor_segment() {
        let wl = CompiledWhitelist::from_text("gpt-5.2");
        let model = ModelDescriptor::new("openrouter", "vendor/gpt-5.2");
        assert!(may_use_tools(&model, &wl));
    }

    #[test]
    fn empty_whitelist_matches_nothing() {
        let wl = CompiledWhitelist::from_text("");
        assert!(!wl.matches("anything"));
    }

    #[test]
    fn round_trip_parse_serialize_parse() {
        let original = vec![
            WhitelistPattern::DateSuffixed("gpt-5.2".to_string()),
            WhitelistPattern::Wildcard("claude-".to_string()),
        ];
        let text = serialize_whitelist(&original);
        let reparsed = parse_whitelist(&text);
        assert_eq!(original, reparsed);
    }

    #[test]
    fn gate_suppresses_by_default_with_no_whitelist_installed() {
        let gate = CapabilityGate::new("openai");
        assert!(!gate.may_use_tools("gpt-5.2"));
    }

    #[test]
    fn gate_scenario_s1_tool_suppression() {
        let gate = CapabilityGate::new("openai");
        gate.set_whitelist(CompiledWhitelist::from_text("gpt-5.2\nclaude-opus-4-5"));
        assert!(!gate.may_use_tools("openai@gpt-3.5-turbo"));
    }

    #[test]
    fn gate_scenario_s6_date_suffix_whitelist() {
        let gate = CapabilityGate::new("openai");
        gate.set_whitelist(CompiledWhitelist::from_text("gpt-5.2"));
        assert!(gate.may_use_tools("openai@gpt-5.2-20250601"));
    }

    #[test]
    fn matching_is_order_independent() {
        let wl_a = CompiledWhitelist::from_text("gpt-5.2\nclaude-opus-4-5");
        let wl_b = CompiledWhitelist::from_text("claude-opus-4-5\ngpt-5.2");
        for id in ["gpt-5.2", "claude-opus-4-5", "gpt-4"] {
            assert_eq!(wl_a.matches(id), wl_b.matches(id));
        }
    }
}
