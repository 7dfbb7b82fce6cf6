//! Reasoning engine reached over HTTP.
//!
//! Posts the [`AgentInput`] as JSON and reads the response body as NDJSON,
//! one [`RawTraceEvent`] per line, decoding lines as bytes arrive.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, warn};

use super::{AgentInput, RawTraceEvent, ReasoningEngine, TraceStream};
use crate::error::ReasoningError;

/// Remote engine that streams its trace as newline-delimited JSON.
pub struct RemoteTraceEngine {
    client: reqwest::Client,
    url: String,
}

impl RemoteTraceEngine {
    /// `connect_timeout` bounds connection setup only; a trace may run long.
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Result<Self, ReasoningError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ReasoningError::Unavailable(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

/// Decode one NDJSON line. Blank and malformed lines yield `None`.
fn decode_line(line: &[u8]) -> Option<RawTraceEvent> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<RawTraceEvent>(text) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Skipping malformed trace line");
            None
        }
    }
}

#[async_trait]
impl ReasoningEngine for RemoteTraceEngine {
    fn name(&self) -> &str {
        "remote"
    }

    async fn trace(&self, input: AgentInput) -> Result<TraceStream, ReasoningError> {
        debug!(url = %self.url, user_id = %input.user_id, "Starting remote trace");

        let response = self
            .client
            .post(&self.url)
            .json(&input)
            .send()
            .await
            .map_err(|e| ReasoningError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::RequestFailed(format!(
                "HTTP {status}: {body}"
            )));
        }

        let mut bytes = Box::pin(response.bytes_stream());
        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        buffer.extend_from_slice(&chunk);
                        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=pos).collect();
                            if let Some(event) = decode_line(&line) {
                                yield Ok(event);
                            }
                        }
                    }
                    Err(e) => {
                        buffer.clear();
                        yield Err(ReasoningError::Stream(e.to_string()));
                        break;
                    }
                }
            }
            // Final line may lack a trailing newline.
            if let Some(event) = decode_line(&buffer) {
                yield Ok(event);
            }
        };

        Ok(Box::pin(stream))
    }
}
