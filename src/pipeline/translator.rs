//! Raw trace → protocol event mapping.
//!
//! Pure and infallible: each raw event maps to zero or one [`StreamEvent`].
//! Payloads that don't have the expected shape simply produce nothing.

use serde_json::Value;

use super::events::StreamEvent;
use crate::reasoning::{RawTraceEvent, TraceKind};

/// Upper bound on the `input` text of a `tool_use` event, in characters.
pub const MAX_TOOL_INPUT_CHARS: usize = 200;

const PROCESSING_NOTE: &str = "Processing…";
const THINKING_NOTE: &str = "Thinking…";

/// Translates a reasoning engine's trace into stream events.
#[derive(Debug, Clone)]
pub struct EventTranslator {
    root_name: String,
}

impl EventTranslator {
    /// `root_name` is the name the engine gives its top-level run.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            root_name: root_name.into(),
        }
    }

    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    pub fn translate(&self, raw: &RawTraceEvent) -> Option<StreamEvent> {
        match &raw.kind {
            TraceKind::ChainStart => (is_outer_scope(raw) && raw.name != self.root_name)
                .then(|| StreamEvent::thought(PROCESSING_NOTE)),
            TraceKind::ChatModelStart => {
                is_outer_scope(raw).then(|| StreamEvent::thought(THINKING_NOTE))
            }
            TraceKind::ToolStart => {
                let input = raw.data.get("input").map(flatten).unwrap_or_default();
                Some(StreamEvent::tool_use(
                    raw.name.clone(),
                    truncate_chars(&input, MAX_TOOL_INPUT_CHARS),
                ))
            }
            TraceKind::ToolEnd => {
                let output = raw.data.get("output").map(flatten).unwrap_or_default();
                Some(StreamEvent::tool_result(raw.name.clone(), output))
            }
            TraceKind::ChatModelStream => {
                let chunk = raw.data.get("chunk")?;
                let text = match chunk {
                    Value::Object(map) => map.get("content").map(text_of).unwrap_or_default(),
                    other => text_of(other),
                };
                (!text.is_empty()).then(|| StreamEvent::response(text))
            }
            TraceKind::ChainEnd if self.is_final_output(raw) => {
                final_text(&raw.data).map(StreamEvent::response)
            }
            TraceKind::ChainEnd | TraceKind::Unknown(_) => None,
        }
    }

    /// Whether `raw` is the end of the top-level run. Subgraphs may reuse
    /// the root name, so the run must also have no ancestors.
    pub fn is_final_output(&self, raw: &RawTraceEvent) -> bool {
        raw.kind == TraceKind::ChainEnd && raw.name == self.root_name && raw.parent_ids.is_empty()
    }
}

/// Outer scopes have at most one ancestor run.
fn is_outer_scope(raw: &RawTraceEvent) -> bool {
    raw.parent_ids.len() <= 1
}

/// Flatten a payload to text: strings as-is, anything structured as JSON.
fn flatten(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Message content is either plain text or a list of content parts.
fn text_of(value: &Value) -> String {
    match value {
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        other => flatten(other),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Final reply of a run: last message content, else `output`, else the
/// whole state as text. `None` when nothing non-blank remains.
fn final_text(data: &Value) -> Option<String> {
    let state = data.get("output").unwrap_or(data);

    let text = match state.get("messages").and_then(Value::as_array) {
        Some(messages) => match messages.last() {
            Some(Value::Object(msg)) => msg.get("content").map(text_of).unwrap_or_default(),
            Some(other) => text_of(other),
            None => String::new(),
        },
        None => match state.get("output") {
            Some(output) => text_of(output),
            None => flatten(state),
        },
    };

    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
