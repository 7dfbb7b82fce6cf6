//! Raw trace events emitted by a reasoning engine.
//!
//! Engines report their steps as loosely-typed records. The discriminator is
//! read from `event` (or `kind`), with or without the `on_` prefix; anything
//! unrecognised lands in [`TraceKind::Unknown`] instead of failing.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Step kind of a raw trace event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceKind {
    ChainStart,
    ChainEnd,
    ChatModelStart,
    ChatModelStream,
    ToolStart,
    ToolEnd,
    Unknown(String),
}

impl TraceKind {
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix("on_").unwrap_or(raw) {
            "chain_start" => Self::ChainStart,
            "chain_end" => Self::ChainEnd,
            "chat_model_start" => Self::ChatModelStart,
            "chat_model_stream" => Self::ChatModelStream,
            "tool_start" => Self::ToolStart,
            "tool_end" => Self::ToolEnd,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::ChainStart => "on_chain_start",
            Self::ChainEnd => "on_chain_end",
            Self::ChatModelStart => "on_chat_model_start",
            Self::ChatModelStream => "on_chat_model_stream",
            Self::ToolStart => "on_tool_start",
            Self::ToolEnd => "on_tool_end",
            Self::Unknown(raw) => raw,
        }
    }
}

impl Serialize for TraceKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TraceKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One step of a reasoning run. Read-only input to the translator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTraceEvent {
    #[serde(rename = "event", alias = "kind")]
    pub kind: TraceKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub parent_ids: Vec<String>,
}

impl RawTraceEvent {
    pub fn new(kind: TraceKind, name: impl Into<String>, data: Value) -> Self {
        Self {
            kind,
            name: name.into(),
            data,
            parent_ids: Vec::new(),
        }
    }

    /// Builder: set ancestor run ids.
    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_ids = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn tool_start(tool: &str, input: Value) -> Self {
        Self::new(TraceKind::ToolStart, tool, serde_json::json!({ "input": input }))
    }

    pub fn tool_end(tool: &str, output: Value) -> Self {
        Self::new(TraceKind::ToolEnd, tool, serde_json::json!({ "output": output }))
    }

    pub fn model_chunk(text: &str) -> Self {
        Self::new(
            TraceKind::ChatModelStream,
            "model",
            serde_json::json!({ "chunk": { "content": text } }),
        )
    }

    /// Root-scope end event whose state carries a final assistant message.
    pub fn final_message(root: &str, text: &str) -> Self {
        Self::new(
            TraceKind::ChainEnd,
            root,
            serde_json::json!({
                "output": { "messages": [ { "role": "assistant", "content": text } ] }
            }),
        )
    }
}
