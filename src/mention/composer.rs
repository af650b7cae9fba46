//! Input composer reducer
//!
//! Each input event computes the next composer state synchronously. The
//! popup opens while the draft ends with `@`; arrow keys move a wrapping
//! highlight, Enter picks, Escape dismisses. With the popup closed, Enter
//! submits the draft and Shift+Enter inserts a newline.

use super::{highlight, strip_mentions, Segment, ToolMention};

/// Mention popup state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Popup {
    /// Index into the catalog
    pub highlighted: usize,
}

/// Draft input plus the tools selected for the next turn
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComposerState {
    pub input: String,
    pub selected: Vec<ToolMention>,
    pub popup: Option<Popup>,
}

impl ComposerState {
    /// The draft split into plain and highlighted mention runs
    pub fn segments(&self) -> Vec<Segment> {
        highlight(&self.input, &self.selected)
    }

    pub fn popup_open(&self) -> bool {
        self.popup.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    Enter,
    Escape,
}

/// Events that drive the composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerEvent {
    /// The full new value of the input after an edit
    Edit(String),
    KeyDown { key: Key, shift: bool },
    /// A popup entry was clicked
    Pick(usize),
}

/// Read-only inputs the reducer needs
#[derive(Debug, Clone, Copy)]
pub struct ComposerContext<'a> {
    pub catalog: &'a [ToolMention],
    /// A turn is already running for this chat
    pub in_flight: bool,
}

/// A draft handed off to start a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Raw input, mentions still present
    pub text: String,
    pub tools: Vec<ToolMention>,
}

/// Result of reducing one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposerUpdate {
    pub state: ComposerState,
    pub submission: Option<Submission>,
    /// The view should move focus back to the input
    pub focus_input: bool,
}

impl ComposerUpdate {
    fn new(state: ComposerState) -> Self {
        Self {
            state,
            submission: None,
            focus_input: false,
        }
    }
}

/// Pure composer transition
pub fn reduce(
    state: &ComposerState,
    ctx: &ComposerContext<'_>,
    event: ComposerEvent,
) -> ComposerUpdate {
    let catalog_len = ctx.catalog.len();

    match (state.popup, event) {
        (_, ComposerEvent::Edit(value)) => {
            let mut next = state.clone();
            next.selected.retain(|tool| is_mentioned(&value, tool));
            next.popup = (value.ends_with('@') && catalog_len > 0).then(Popup::default);
            next.input = value;
            ComposerUpdate::new(next)
        }

        (Some(popup), ComposerEvent::KeyDown { key, .. }) if catalog_len > 0 => {
            let current = popup.highlighted.min(catalog_len - 1);
            match key {
                Key::ArrowUp => {
                    let highlighted = if current > 0 { current - 1 } else { catalog_len - 1 };
                    ComposerUpdate::new(with_popup(state, Some(Popup { highlighted })))
                }
                Key::ArrowDown => {
                    let highlighted = (current + 1) % catalog_len;
                    ComposerUpdate::new(with_popup(state, Some(Popup { highlighted })))
                }
                Key::Enter => select_tool(state, &ctx.catalog[current]),
                Key::Escape => ComposerUpdate::new(with_popup(state, None)),
            }
        }

        (Some(_), ComposerEvent::Pick(index)) => match ctx.catalog.get(index) {
            Some(tool) => select_tool(state, tool),
            None => ComposerUpdate::new(state.clone()),
        },

        (_, ComposerEvent::KeyDown { key: Key::Enter, shift: true }) => {
            let mut next = with_popup(state, None);
            next.input.push('\n');
            ComposerUpdate::new(next)
        }

        (_, ComposerEvent::KeyDown { key: Key::Enter, shift: false }) => {
            // A draft that is only mentions would send an empty query
            if ctx.in_flight || strip_mentions(&state.input, &state.selected).is_empty() {
                return ComposerUpdate::new(state.clone());
            }
            ComposerUpdate {
                state: ComposerState::default(),
                submission: Some(Submission {
                    text: state.input.clone(),
                    tools: state.selected.clone(),
                }),
                focus_input: true,
            }
        }

        (_, ComposerEvent::KeyDown { key: Key::Escape, .. }) => {
            ComposerUpdate::new(with_popup(state, None))
        }

        _ => ComposerUpdate::new(state.clone()),
    }
}

/// `@Name` appears as a whole word, so `@Elasticsearch` does not keep `Elastic`
fn is_mentioned(text: &str, tool: &ToolMention) -> bool {
    let mention = tool.mention_text();
    text.match_indices(mention.as_str()).any(|(at, found)| {
        let next = text.get(at + found.len()..).and_then(|rest| rest.chars().next());
        !matches!(next, Some(c) if c.is_alphanumeric() || c == '_')
    })
}

fn with_popup(state: &ComposerState, popup: Option<Popup>) -> ComposerState {
    ComposerState {
        popup,
        ..state.clone()
    }
}

/// Replace the trailing `@` with `@Name ` and mark the tool selected
fn select_tool(state: &ComposerState, tool: &ToolMention) -> ComposerUpdate {
    let base = state.input.strip_suffix('@').unwrap_or(&state.input);
    let mut next = ComposerState {
        input: format!("{base}{} ", tool.mention_text()),
        selected: state.selected.clone(),
        popup: None,
    };
    if !next.selected.contains(tool) {
        next.selected.push(tool.clone());
    }

    ComposerUpdate {
        state: next,
        submission: None,
        focus_input: true,
    }
}
