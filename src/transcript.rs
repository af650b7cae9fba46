//! Terminal rendering of a chat's turns
//!
//! The view receives two feeds: the latest [`TurnView`] snapshot from a
//! `watch` channel and ordered [`ViewEvent`]s from a `broadcast` channel.
//! Snapshots coalesce, so the streamed answer is written from whichever feed
//! is ahead and the appended assistant message always completes it.

use crate::mention::{Segment, ToolMention};
use crate::runtime::{TurnView, ViewEvent};
use crate::state_machine::Phase;

/// Output state for the chat on screen
#[derive(Debug)]
pub struct Transcript {
    phase: Phase,
    /// Between our own user message and that turn's answer or failure
    live: bool,
    /// Bytes of the current answer already written
    printed: usize,
    /// Answer text was written without a trailing newline
    line_open: bool,
}

impl Transcript {
    pub fn new(view: &TurnView) -> Self {
        Self {
            phase: view.phase,
            live: false,
            printed: 0,
            line_open: false,
        }
    }

    /// Output for a new snapshot
    pub fn on_view(&mut self, view: &TurnView) -> String {
        let mut out = String::new();

        if self.live && matches!(view.phase, Phase::Streaming | Phase::Scoring) {
            self.write_answer(&view.preview, &mut out);
        }

        if view.phase != self.phase {
            self.phase = view.phase;
            // A snapshot read after the answer must not label a finished turn
            if view.loading && (self.live || view.phase == Phase::BuildingContext) {
                self.close_line(&mut out);
                out.push('[');
                out.push_str(view.label);
                out.push_str("]\n");
            }
        }
        out
    }

    /// Output for a discrete event
    pub fn on_event(&mut self, event: &ViewEvent) -> String {
        let mut out = String::new();
        match event {
            ViewEvent::MessageAppended { message } if message.is_user() => {
                self.live = true;
                self.printed = 0;
            }
            ViewEvent::MessageAppended { message } => {
                self.write_answer(&message.content, &mut out);
                self.close_line(&mut out);
                self.end_turn();

                if let Some(score) = message.score_label() {
                    out.push_str(&format!("score {score}\n"));
                }
                if let Some(references) = message.references.as_ref().filter(|r| !r.is_empty()) {
                    let labels: Vec<&str> = references.keys().map(String::as_str).collect();
                    out.push_str(&format!("sources: {} (/refs to read)\n", labels.join(", ")));
                }
            }
            ViewEvent::TurnCompleted { similar_queries } => {
                if !similar_queries.is_empty() {
                    out.push_str(&format!("related: {}\n", similar_queries.join(" | ")));
                }
            }
            ViewEvent::TurnFailed { error } => {
                self.close_line(&mut out);
                self.end_turn();
                out.push_str(&format!("request failed ({}): {}\n", error.kind, error.message));
            }
            ViewEvent::Error { message } => {
                self.close_line(&mut out);
                out.push_str(&format!("error: {message}\n"));
            }
        }
        out
    }

    fn write_answer(&mut self, answer: &str, out: &mut String) {
        if let Some(delta) = answer.get(self.printed..).filter(|d| !d.is_empty()) {
            out.push_str(delta);
            self.printed = answer.len();
            self.line_open = !delta.ends_with('\n');
        }
    }

    fn close_line(&mut self, out: &mut String) {
        if self.line_open {
            out.push('\n');
            self.line_open = false;
        }
    }

    fn end_turn(&mut self) {
        self.live = false;
        self.printed = 0;
    }
}

/// Draft with selected mentions bracketed and tagged with their tool icon
pub fn render_segments(segments: &[Segment], catalog: &[ToolMention]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Plain(text) => text.clone(),
            Segment::Mention { text, tool_id } => {
                let icon = catalog
                    .iter()
                    .find(|tool| &tool.id == tool_id)
                    .map_or("", |tool| tool.icon.as_str());
                format!("[{icon}{text}]")
            }
        })
        .collect()
}
