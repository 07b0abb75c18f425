//! Document-scoped and process-wide configuration.
//!
//! Mirrors the teacher's plain-struct-plus-`Default` convention rather than a
//! builder: both config types are small enough that field literals read more
//! clearly than a builder chain.

use serde::{Deserialize, Serialize};

/// Per-document configuration: the effective provider/model, the
/// tool-enablement state, and the recognized per-document generation
/// overrides of spec §6's frontmatter-style block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentConfig {
    pub provider: String,
    pub model_id: String,
    /// Optional per-document override of the process whitelist; `None`
    /// falls back to `GlobalSettings::tool_whitelist`.
    pub whitelist_override: Option<String>,
    pub system_prompt: Option<String>,
    pub max_rounds: u32,

    // Recognized per-document generation overrides (§6). Each falls back to
    // the provider/adapter default when absent; the document itself carries
    // only the override, not the resolved value.
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub stream: Option<bool>,
    pub system_commands: Vec<String>,
    pub stop: Option<String>,
    pub n: Option<u32>,
    pub top_p: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub frequency_penalty: Option<f64>,
    /// Provider-specific endpoint override.
    pub url: Option<String>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model_id: "gpt-5.2".to_string(),
            whitelist_override: None,
            system_prompt: None,
            max_rounds: 25,
            temperature: None,
            max_tokens: None,
            stream: None,
            system_commands: Vec::new(),
            stop: None,
            n: None,
            top_p: None,
            presence_penalty: None,
            frequency_penalty: None,
            url: None,
        }
    }
}

impl DocumentConfig {
    pub fn full_model_id(&self) -> String {
        format!("{}@{}", self.provider, self.model_id)
    }
}

/// Process-wide settings: the things a single user configures once and every
/// document inherits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalSettings {
    pub default_provider: String,
    /// Raw whitelist text, as edited by the user; compile with
    /// `gate::CompiledWhitelist::from_text` before use.
    pub tool_whitelist: String,
    pub enable_tool_calling: bool,
    pub auto_approved_tools: Vec<String>,
    pub require_disclosure_review: bool,
    pub tool_timeout_secs: u64,
    pub vault_root: Option<String>,
    pub web_search_endpoint: Option<String>,
    pub web_search_max_results: u32,
    /// Markdown heading depth for `role::<name>` headers, 0-6; 0 means a bare
    /// `role::<name>` line with no `#` prefix (spec §6 `headingLevel`).
    pub heading_level: u8,
    /// Environmental system prompt prepended to every conversation, ahead of
    /// any document- or title-inference-specific system message (spec §6
    /// `pluginSystemMessage`).
    pub plugin_system_message: Option<String>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            default_provider: "openai".to_string(),
            tool_whitelist: String::new(),
            enable_tool_calling: true,
            auto_approved_tools: Vec::new(),
            require_disclosure_review: true,
            tool_timeout_secs: 120,
            vault_root: None,
            web_search_endpoint: None,
            web_search_max_results: 10,
            heading_level: 3,
            plugin_system_message: None,
        }
    }
}

impl GlobalSettings {
    /// A tool call is pre-approved (no Approval Broker round trip) when its
    /// name appears verbatim in `auto_approved_tools` (spec.md §4.3).
    pub fn is_auto_approved(&self, tool_name: &str) -> bool {
        self.auto_approved_tools.iter().any(|t| t == tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_config_defaults_are_stable() {
        let cfg = DocumentConfig::default();
        assert_eq!(cfg.full_model_id(), "openai@gpt-5.2");
        assert_eq!(cfg.max_rounds, 25);
        assert_eq!(cfg.temperature, None);
        assert!(cfg.system_commands.is_empty());
    }

    #[test]
    fn document_config_round_trips_generation_overrides_through_yaml() {
        let mut cfg = DocumentConfig::default();
        cfg.temperature = Some(0.7);
        cfg.max_tokens = Some(4096);
        cfg.stream = Some(false);
        cfg.system_commands = vec!["/reset".to_string()];
        cfg.stop = Some("\n\n".to_string());
        cfg.n = Some(1);
        cfg.top_p = Some(0.9);
        cfg.presence_penalty = Some(0.1);
        cfg.frequency_penalty = Some(0.2);
        cfg.url = Some("https://api.example.com/v1".to_string());

        let text = serde_yaml::to_string(&cfg).expect("serialize");
        let parsed: DocumentConfig = serde_yaml::from_str(&text).expect("deserialize");
        assert_eq!(cfg, parsed);
    }

    #[test]
    fn auto_approved_lookup() {
        let mut settings = GlobalSettings::default();
        settings.auto_approved_tools.push("vault_search".to_string());
        assert!(settings.is_auto_approved("vault_search"));
        assert!(!settings.is_auto_approved("file_read"));
    }

    #[test]
    fn settings_round_trip_through_yaml() {
        let settings = GlobalSettings::default();
        let text = serde_yaml::to_string(&settings).expect("serialize");
        let parsed: GlobalSettings = serde_yaml::from_str(&text).expect("deserialize");
        assert_eq!(settings, parsed);
    }
}
