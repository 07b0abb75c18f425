//! Title Inference (C9) — proposes a short title after enough turns, reusing
//! the Conversation Driver with tools disabled.
//!
//! Grounded on `km-tools::llm::helpers::chat_with_registry`'s "reuse the
//! driver, swap one piece of config" pattern — there it swaps the tool
//! registry; here it swaps in a fixed system prompt and forces
//! `tools_enabled = false` regardless of the whitelist.

use crate::config::{DocumentConfig, GlobalSettings};
use crate::driver::ConversationDriver;
use crate::error::OrchestratorError;
use crate::provider::{AbortSignal, Message, Role};
use crate::sink::StreamSink;

pub const MIN_AUTO_INFER_MESSAGES: usize = 3;

const TITLE_SYSTEM_PROMPT: &str =
    "Propose a short, descriptive title (3-8 words, no punctuation) for this conversation. Reply with the title only.";

/// Whether title inference should run for this document, per spec.md §4.9's
/// trigger conditions.
pub fn should_infer(
    auto_infer_enabled: bool,
    filename_matches_date_template: bool,
    user_visible_message_count: usize,
) -> bool {
    auto_infer_enabled && filename_matches_date_template && user_visible_message_count >= MIN_AUTO_INFER_MESSAGES
}

/// Characters disallowed in filenames on common filesystems.
const DISALLOWED_FILENAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

pub fn sanitize_title(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !DISALLOWED_FILENAME_CHARS.contains(c))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "Untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Resolve a filename collision with a `(n)` suffix sequence: `Title.md`,
/// `Title (1).md`, `Title (2).md`, ...
pub fn resolve_collision(base_title: &str, extension: &str, exists: impl Fn(&str) -> bool) -> String {
    let candidate = format!("{}.{}", base_title, extension);
    if !exists(&candidate) {
        return candidate;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{} ({}).{}", base_title, n, extension);
        if !exists(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

pub async fn infer_title(
    driver: &ConversationDriver,
    conversation_history: Vec<Message>,
    settings: &GlobalSettings,
    config: &DocumentConfig,
) -> Result<String, OrchestratorError> {
    let mut messages = vec![Message {
        role: Role::System,
        content: TITLE_SYSTEM_PROMPT.to_string(),
        tool_call_id: None,
        model: None,
    }];
    messages.extend(conversation_history);

    let mut title_settings = settings.clone();
    title_settings.enable_tool_calling = false;

    let mut doc = crate::sink::StringDocument::default();
    let mut sink = StreamSink::new(&mut doc);
    let abort = AbortSignal::new();

    let outcome = driver.run(messages, config, &title_settings, &mut sink, &abort).await?;
    let raw_title = outcome
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Assistant)
        .map(|m| m.content.clone())
        .unwrap_or_default();

    Ok(sanitize_title(&raw_title))
}
