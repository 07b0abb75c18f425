//! Stream Sink (C7) — appends streamed tokens into the active document,
//! tracks the cursor, and handles abort/cancellation.
//!
//! No direct teacher analogue (`km-tools` streams to stdout/callbacks, not a
//! document); grounded on the shape of `km-tools::llm::provider::StreamChunk`
//! (content vs tool-call-delta discrimination), adapted to writes against a
//! `DocumentWriter` port instead of callbacks. Cursor tracking follows
//! spec.md §9's design note: record an absolute offset at `beginTurn` and
//! derive the write position by arithmetic on `accumulated_text.len()`
//! rather than retaining an editor cursor handle across suspensions.

/// Thin port onto the host's document buffer. The document editor itself is
/// out of scope (spec.md §1); this is the minimal surface the sink needs.
pub trait DocumentWriter {
    /// Insert `text` at `offset`. Returns the document's length after the
    /// insert.
    fn insert(&mut self, offset: usize, text: &str) -> usize;

    /// Current document length, used to detect concurrent edits at the
    /// write position.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory `DocumentWriter` used by tests and by hosts with no richer
/// buffer abstraction.
#[derive(Debug, Default, Clone)]
pub struct StringDocument {
    pub text: String,
}

impl DocumentWriter for StringDocument {
    fn insert(&mut self, offset: usize, text: &str) -> usize {
        let offset = offset.min(self.text.len());
        self.text.insert_str(offset, text);
        self.text.len()
    }

    fn len(&self) -> usize {
        self.text.len()
    }
}

/// Per-turn state, exclusively owned by the Stream Sink; destroyed at turn
/// boundary (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct StreamSession {
    pub cursor_anchor: usize,
    pub accumulated_text: String,
    pub abort_flag: bool,
    pub tool_calls_in_flight: usize,
}

pub struct StreamSink<'a> {
    document: &'a mut dyn DocumentWriter,
    session: Option<StreamSession>,
}

impl<'a> StreamSink<'a> {
    pub fn new(document: &'a mut dyn DocumentWriter) -> Self {
        Self { document, session: None }
    }

    pub fn session(&self) -> Option<&StreamSession> {
        self.session.as_ref()
    }

    /// `beginTurn(cursorAnchor, headingMarkup, modelLabel)` — inserts the
    /// document separator (horizontal rule + role header) and opens a new
    /// session anchored just after it.
    pub fn begin_turn(&mut self, heading_markup: &str, model_label: &str) {
        let separator = format!("\n\n---\n{} `{}`\n\n", heading_markup, model_label);
        let anchor = self.document.len();
        let new_len = self.document.insert(anchor, &separator);
        self.session = Some(StreamSession {
            cursor_anchor: new_len,
            accumulated_text: String::new(),
            abort_flag: false,
            tool_calls_in_flight: 0,
        });
    }

    /// `appendDelta(text)` — O(|delta|), and preserves the invariant that
    /// the write position is always `cursor_anchor + accumulated_text.len()`
    /// unless the user has moved the document around it, in which case the
    /// turn aborts (Open Question resolution in DESIGN.md).
    pub fn append_delta(&mut self, text: &str) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.abort_flag {
            return;
        }

        let expected_write_pos = session.cursor_anchor + session.accumulated_text.len();
        if expected_write_pos > self.document.len() {
            // The document shrank under us: an external edit removed part of
            // the region we own. Abort rather than silently overwrite.
            session.abort_flag = true;
            return;
        }

        self.document.insert(expected_write_pos, text);
        session.accumulated_text.push_str(text);
    }

    pub fn abort(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.abort_flag = true;
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.session.as_ref().map(|s| s.abort_flag).unwrap_or(false)
    }

    /// `endTurn({assistantSuffix, userSuffix})` — balances any odd number of
    /// triple-backtick fences, appends the standardized suffixes, and
    /// returns the finished session.
    pub fn end_turn(&mut self, assistant_suffix: &str, user_suffix: &str) -> StreamSession {
        let mut session = self.session.take().unwrap_or_default();

        if !session.abort_flag && has_unbalanced_fence(&session.accumulated_text) {
            let write_pos = session.cursor_anchor + session.accumulated_text.len();
            self.document.insert(write_pos, "\n```");
            session.accumulated_text.push_str("\n```");
        }

        let write_pos = session.cursor_anchor + session.accumulated_text.len();
        let suffix = if session.abort_flag { "" } else { assistant_suffix };
        if !suffix.is_empty() {
            self.document.insert(write_pos, suffix);
            session.accumulated_text.push_str(suffix);
        }

        if !session.abort_flag && !user_suffix.is_empty() {
            let write_pos = session.cursor_anchor + session.accumulated_text.len();
            self.document.insert(write_pos, user_suffix);
        }

        session
    }

    /// Appends a standardized truncation warning marker (token limit
    /// reached before end-of-turn).
    pub fn append_truncation_warning(&mut self) {
        self.append_delta("\n\n> ⚠ response truncated: token limit reached\n");
    }
}

fn has_unbalanced_fence(text: &str) -> bool {
    text.matches("```").count() % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_delta_is_linear_and_tracks_cursor() {
        let mut doc = StringDocument::default();
        let mut sink = StreamSink::new(&mut doc);
        sink.begin_turn("### role::assistant", "openai@gpt-5.2");
        sink.append_delta("Hello, ");
        sink.append_delta("world.");
        let session = sink.end_turn("", "");
        assert_eq!(session.accumulated_text, "Hello, world.");
        assert!(doc.text.ends_with("Hello, world."));
    }

    #[test]
    fn odd_fence_count_gets_closed_at_end_of_turn() {
        let mut doc = StringDocument::default();
        let mut sink = StreamSink::new(&mut doc);
        sink.begin_turn("### role::assistant", "openai@gpt-5.2");
        sink.append_delta("```rust\nfn main() {}\n");
        let session = sink.end_turn("", "");
        assert_eq!(session.accumulated_text.matches("```").count() % 2, 0);
    }

    #[test]
    fn even_fence_count_is_left_untouched() {
        let mut doc = StringDocument::default();
        let mut sink = StreamSink::new(&mut doc);
        sink.begin_turn("### role::assistant", "openai@gpt-5.2");
        sink.append_delta("```rust\ncode\n```");
        let session = sink.end_turn("", "");
        assert_eq!(session.accumulated_text, "```rust\ncode\n```");
    }

    #[test]
    fn external_shrink_of_write_region_triggers_abort() {
        let mut doc = StringDocument::default();
        let mut sink = StreamSink::new(&mut doc);
        sink.begin_turn("### role::assistant", "openai@gpt-5.2");
        sink.append_delta("partial");
        // Simulate a concurrent edit that truncates the document out from
        // under the sink's expected write position.
        doc.text.truncate(2);
        let mut sink = StreamSink::new(&mut doc);
        // Re-open is not how the real driver works (session would be held
        // across deltas); this directly exercises the abort path instead.
        sink.session = Some(StreamSession {
            cursor_anchor: 100,
            accumulated_text: "partial".to_string(),
            abort_flag: false,
            tool_calls_in_flight: 0,
        });
        sink.append_delta("more");
        assert!(sink.is_aborted());
    }

    #[test]
    fn idempotent_under_replay_of_identical_deltas() {
        let mut doc_a = StringDocument::default();
        let mut sink_a = StreamSink::new(&mut doc_a);
        sink_a.begin_turn("### role::assistant", "m");
        for chunk in ["a", "b", "c"] {
            sink_a.append_delta(chunk);
        }
        sink_a.end_turn("", "");

        let mut doc_b = StringDocument::default();
        let mut sink_b = StreamSink::new(&mut doc_b);
        sink_b.begin_turn("### role::assistant", "m");
        for chunk in ["a", "b", "c"] {
            sink_b.append_delta(chunk);
        }
        sink_b.end_turn("", "");

        assert_eq!(doc_a.text, doc_b.text);
    }

    #[test]
    fn abort_stops_further_appends() {
        let mut doc = StringDocument::default();
        let mut sink = StreamSink::new(&mut doc);
        sink.begin_turn("### role::assistant", "m");
        sink.append_delta("before");
        sink.abort();
        sink.append_delta("after");
        let session = sink.end_turn("SUFFIX", "");
        assert_eq!(session.accumulated_text, "before");
        assert!(!doc.text.contains("after"));
        assert!(!doc.text.contains("SUFFIX"));
    }
}
