//! Transcript document format (spec.md §6): what the Conversation Driver
//! consumes and produces.
//!
//! No teacher analogue — `km-tools` has no document format of its own — so
//! this is new code, kept in the teacher's terse, comment-light style.
//! Explicitly NOT in scope: generic frontmatter key/value parsing (that's
//! the host's file-format layer); this module only understands the
//! turn-separator/role-header/comment-block/link-expansion grammar that the
//! Conversation Driver itself needs to read and write.

use crate::provider::{Message, Role};
use regex::Regex;
use std::sync::OnceLock;

fn role_heading_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{0,6}\s*role::(\w+)\s*$").expect("valid regex"))
}

fn comment_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)=begin-[^\n]*\n.*?\n=end-[^\n]*\n?").expect("valid regex"))
}

/// `[[target]]` or `[[target|display text]]`.
fn wiki_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]|]+)(?:\|[^\]]*)?\]\]").expect("valid regex"))
}

/// `[text](target)`.
fn markdown_link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]\(([^)]+)\)").expect("valid regex"))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("unknown role '{0}' in transcript")]
    UnknownRole(String),
}

fn parse_role(raw: &str) -> Result<Role, TranscriptError> {
    match raw {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        "developer" => Ok(Role::Developer),
        "system" => Ok(Role::System),
        other => Err(TranscriptError::UnknownRole(other.to_string())),
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Developer => "developer",
        Role::System => "system",
        Role::Tool => "tool",
    }
}

/// The `### role::<name>` (or bare `role::<name>` at `level` 0) heading
/// markup the Stream Sink writes between turns, at the configured
/// `headingLevel` (spec.md §6, 0-6; 0 means no `#` prefix).
pub fn heading_markup(level: u8, role: Role) -> String {
    let level = level.min(6);
    if level == 0 {
        format!("role::{}", role_name(role))
    } else {
        format!("{} role::{}", "#".repeat(level as usize), role_name(role))
    }
}

/// Strip `=begin-.../=end-...` comment blocks (content hidden from the
/// model) from a single message's text, before it is sent upstream.
pub fn strip_comment_blocks(text: &str) -> String {
    comment_block_regex().replace_all(text, "").to_string()
}

/// Resolves an internal link target to the content that should be inlined
/// in its place. The host owns the actual lookup (vault file, other
/// document); this module only owns the expansion grammar.
pub trait LinkResolver {
    fn resolve(&self, target: &str) -> Option<String>;
}

fn is_external_link(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://")
}

/// Expand wiki-style `[[target]]` and markdown-style `[text](target)`
/// internal links inline, substituting the resolver's content for the link
/// itself. `http(s)://` targets are left intact (spec.md §6). Links whose
/// target the resolver doesn't recognize are left as-is rather than
/// dropped, so an unresolved reference stays visible instead of vanishing.
pub fn expand_links(text: &str, resolver: &dyn LinkResolver) -> String {
    let after_wiki = wiki_link_regex().replace_all(text, |caps: &regex::Captures| {
        let target = caps[1].trim();
        resolver.resolve(target).unwrap_or_else(|| caps[0].to_string())
    });

    markdown_link_regex()
        .replace_all(&after_wiki, |caps: &regex::Captures| {
            let target = caps[2].trim();
            if is_external_link(target) {
                return caps[0].to_string();
            }
            resolver.resolve(target).unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

/// Parse a transcript document into its ordered messages. Turns are
/// separated by a horizontal rule followed by a `role::<rolename>` heading
/// at `heading_level` (0-6 `#` characters, any depth accepted on parse).
pub fn parse(document: &str, heading_level: u8) -> Result<Vec<Message>, TranscriptError> {
    let _ = heading_level; // parse accepts any depth; only render() is fixed-depth.
    let mut messages = Vec::new();
    let mut remaining = document;

    // The document may start directly with a role heading (no leading rule)
    // or with free text treated as an initial `user` turn.
    let heading_re = role_heading_regex();

    let first_match = heading_re.find(remaining);
    if let Some(m) = first_match {
        if m.start() > 0 {
            let leading = remaining[..m.start()].trim();
            if !leading.is_empty() {
                messages.push(Message {
                    role: Role::User,
                    content: leading.to_string(),
                    tool_call_id: None,
                    model: None,
                });
            }
        }
    } else {
        let leading = remaining.trim();
        if !leading.is_empty() {
            messages.push(Message {
                role: Role::User,
                content: leading.to_string(),
                tool_call_id: None,
                model: None,
            });
        }
        return Ok(messages);
    }

    loop {
        let Some(m) = heading_re.find(remaining) else { break };
        let role_text = heading_re.captures(remaining).unwrap().get(1).unwrap().as_str();
        let role = parse_role(role_text)?;

        let body_start = m.end();
        let rest = &remaining[body_start..];
        let next_heading = heading_re.find(rest);
        let (body, tail) = match next_heading {
            Some(next) => (&rest[..next.start()], &rest[next.start()..]),
            None => (rest, ""),
        };

        let content = strip_separator_rule(body.trim());
        messages.push(Message {
            role,
            content,
            tool_call_id: None,
            model: None,
        });

        remaining = tail;
        if remaining.is_empty() {
            break;
        }
    }

    Ok(messages)
}

/// Trim a trailing horizontal-rule line (`---`) that belongs to the *next*
/// turn's separator rather than this turn's content.
fn strip_separator_rule(body: &str) -> String {
    body.trim_end_matches("---").trim_end().to_string()
}

/// Render messages back into transcript document form, with a horizontal
/// rule + role heading at `heading_level` between turns.
pub fn render(messages: &[Message], heading_level: u8) -> String {
    let mut out = String::new();
    for (i, message) in messages.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n---\n");
        }
        out.push_str(&heading_markup(heading_level, message.role));
        out.push_str("\n\n");
        out.push_str(&message.content);
        out.push('\n');
    }
    out
}
