//! `@ToolName` mentions in user input
//!
//! A mention activates a retrieval tool for one turn. Mentions are stripped
//! from the query before it is sent; the view highlights them while typing.

mod composer;
#[cfg(test)]
mod proptests;

pub use composer::{reduce, ComposerContext, ComposerEvent, ComposerState, Key};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A tool that can be mentioned in a query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolMention {
    /// Identifier sent to the context builder
    pub id: String,
    pub display_name: String,
    pub icon: String,
}

impl ToolMention {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            icon: icon.into(),
        }
    }

    /// The literal text inserted into the input, e.g. `@Elastic`
    pub fn mention_text(&self) -> String {
        format!("@{}", self.display_name)
    }
}

/// The fixed tool catalog offered in the mention popup
pub fn default_catalog() -> Vec<ToolMention> {
    vec![
        ToolMention::new("ElasticTool", "Elastic", "🔎"),
        ToolMention::new("PythonTool", "Python", "🐍"),
    ]
}

/// Tool identifiers in selection order
pub fn tool_ids(tools: &[ToolMention]) -> Vec<String> {
    tools.iter().map(|t| t.id.clone()).collect()
}

/// Remove every `@Name` (plus trailing whitespace) of the selected tools and trim.
///
/// Repeats until nothing matches, so removing one mention can never leave
/// another behind: `strip_mentions(strip_mentions(x)) == strip_mentions(x)`.
pub fn strip_mentions(text: &str, selected: &[ToolMention]) -> String {
    let Some(pattern) = mention_pattern(selected, r"\s*") else {
        return text.to_string();
    };

    let mut current = text.to_string();
    loop {
        let next = pattern.replace_all(&current, "").trim().to_string();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// A run of input text, either plain or a recognized mention
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Plain(String),
    Mention { text: String, tool_id: String },
}

/// Split input into plain text and highlighted mentions of the selected tools
pub fn highlight(text: &str, selected: &[ToolMention]) -> Vec<Segment> {
    let Some(pattern) = mention_pattern(selected, "") else {
        return plain_segment(text);
    };

    let mut segments = Vec::new();
    let mut last = 0;
    for found in pattern.find_iter(text) {
        if found.start() > last {
            let plain = text.get(last..found.start()).unwrap_or_default();
            segments.push(Segment::Plain(plain.to_string()));
        }
        let tool_id = selected
            .iter()
            .find(|t| t.mention_text() == found.as_str())
            .map(|t| t.id.clone())
            .unwrap_or_default();
        segments.push(Segment::Mention {
            text: found.as_str().to_string(),
            tool_id,
        });
        last = found.end();
    }
    if last < text.len() {
        segments.push(Segment::Plain(text.get(last..).unwrap_or_default().to_string()));
    }
    segments
}

fn plain_segment(text: &str) -> Vec<Segment> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Segment::Plain(text.to_string())]
    }
}

/// Alternation of the selected mentions, longest first so `@Python3` wins over `@Python`
fn mention_pattern(selected: &[ToolMention], suffix: &str) -> Option<Regex> {
    let mut names: Vec<&str> = selected
        .iter()
        .map(|t| t.display_name.as_str())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return None;
    }
    names.sort_by_key(|name| std::cmp::Reverse(name.len()));
    names.dedup();

    let alternation = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    // Escaped literals always form a valid pattern
    Regex::new(&format!("@(?:{alternation}){suffix}")).ok()
}
