//! Wire protocol for streamed responses.
//!
//! Every event encodes to exactly one JSON object followed by `\n`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Media type of a streamed response body.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

pub const END_DONE: &str = "done";
pub const END_CANCELED: &str = "canceled";

/// Generic text of an in-stream `error` event. Details go to the log only.
pub const GENERIC_ERROR: &str = "Something went wrong while processing your request.";

/// One record of the streamed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Transcript { content: String },
    Thought { content: String },
    ToolUse { tool: String, input: String },
    /// `output` mirrors `result` for older clients.
    ToolResult { tool: String, result: String, output: String },
    Response { content: String },
    Error { content: String },
    End { content: String },
}

impl StreamEvent {
    pub fn transcript(content: impl Into<String>) -> Self {
        Self::Transcript {
            content: content.into(),
        }
    }

    pub fn thought(content: impl Into<String>) -> Self {
        Self::Thought {
            content: content.into(),
        }
    }

    pub fn tool_use(tool: impl Into<String>, input: impl Into<String>) -> Self {
        Self::ToolUse {
            tool: tool.into(),
            input: input.into(),
        }
    }

    pub fn tool_result(tool: impl Into<String>, result: impl Into<String>) -> Self {
        let result = result.into();
        Self::ToolResult {
            tool: tool.into(),
            output: result.clone(),
            result,
        }
    }

    pub fn response(content: impl Into<String>) -> Self {
        Self::Response {
            content: content.into(),
        }
    }

    /// The generic in-stream error.
    pub fn error() -> Self {
        Self::Error {
            content: GENERIC_ERROR.to_string(),
        }
    }

    pub fn done() -> Self {
        Self::End {
            content: END_DONE.to_string(),
        }
    }

    pub fn canceled() -> Self {
        Self::End {
            content: END_CANCELED.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End { .. })
    }

    /// Discriminator as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transcript { .. } => "transcript",
            Self::Thought { .. } => "thought",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolResult { .. } => "tool_result",
            Self::Response { .. } => "response",
            Self::Error { .. } => "error",
            Self::End { .. } => "end",
        }
    }

    /// Encode as one newline-terminated NDJSON record.
    pub fn to_ndjson(&self) -> Result<Bytes, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn tool_result_mirrors_output() {
        let ev = StreamEvent::tool_result("create_task", r#"{"ok":true}"#);
        match ev {
            StreamEvent::ToolResult { result, output, .. } => assert_eq!(result, output),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ndjson_record_is_single_line() {
        let bytes = StreamEvent::response("line one\nline two").to_ndjson().unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));
        assert_eq!(bytes.iter().filter(|b| **b == b'\n').count(), 1);

        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, json!({"type": "response", "content": "line one\nline two"}));
    }

    #[test]
    fn wire_tags_are_snake_case() {
        let value = serde_json::to_value(StreamEvent::tool_use("t", "{}")).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(StreamEvent::tool_use("t", "{}").kind(), "tool_use");
        assert!(StreamEvent::canceled().is_terminal());
    }
}
