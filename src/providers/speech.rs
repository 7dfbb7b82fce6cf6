//! Speech-to-text strategies.

use std::process::Stdio;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::{AudioClip, Transcriber};
use crate::error::ProviderError;

/// Hosted speech API (Deepgram `listen` endpoint).
pub struct DeepgramTranscriber {
    client: reqwest::Client,
    url: String,
    api_key: SecretString,
}

impl DeepgramTranscriber {
    pub fn new(client: reqwest::Client, url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client,
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Transcriber for DeepgramTranscriber {
    fn name(&self) -> &str {
        "deepgram"
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<String, ProviderError> {
        let mut params = vec![("punctuate", "true"), ("smart_format", "true")];
        if clip.content_type.contains("webm") {
            params.extend([("encoding", "opus"), ("container", "webm")]);
        }

        debug!(bytes = clip.bytes.len(), content_type = %clip.content_type, "Sending audio to Deepgram");
        let response = self
            .client
            .post(&self.url)
            .query(&params)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Token {}", self.api_key.expose_secret()),
            )
            .header(reqwest::header::CONTENT_TYPE, &clip.content_type)
            .body(clip.bytes.clone())
            .send()
            .await
            .map_err(|e| ProviderError::request(self.name(), e))?
            .error_for_status()
            .map_err(|e| ProviderError::request(self.name(), e))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid(self.name(), e))?;

        body.pointer("/results/channels/0/alternatives/0/transcript")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::invalid(self.name(), "missing transcript"))
    }
}

/// Delegated ML worker, `POST {base}/stt` → `{"text": ...}`.
pub struct WorkerTranscriber {
    client: reqwest::Client,
    endpoint: String,
}

impl WorkerTranscriber {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/stt", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl Transcriber for WorkerTranscriber {
    fn name(&self) -> &str {
        "ml-worker"
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, &clip.content_type)
            .body(clip.bytes.clone())
            .send()
            .await
            .map_err(|e| ProviderError::request(self.name(), e))?
            .error_for_status()
            .map_err(|e| ProviderError::request(self.name(), e))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid(self.name(), e))?;

        body.get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::invalid(self.name(), "missing text field"))
    }
}

/// Local speech model: ffmpeg converts the clip to 16 kHz mono WAV, which is
/// piped into a transcription command that prints the text on stdout.
pub struct LocalTranscriber {
    ffmpeg: String,
    command: String,
}

impl LocalTranscriber {
    pub fn new(ffmpeg: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            command: command.into(),
        }
    }
}

/// Run `program args…` with `input` on stdin and return stdout.
async fn run_piped(program: &str, args: &[&str], input: Vec<u8>) -> Result<Vec<u8>, ProviderError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    // Feed stdin concurrently so a full stdout pipe can't stall the child.
    let writer = child.stdin.take().map(|mut stdin| {
        tokio::spawn(async move {
            let _ = stdin.write_all(&input).await;
        })
    });

    let output = child.wait_with_output().await?;
    if let Some(writer) = writer {
        let _ = writer.await;
    }

    if !output.status.success() {
        return Err(ProviderError::request(
            "local",
            format!(
                "{program} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    Ok(output.stdout)
}

#[async_trait]
impl Transcriber for LocalTranscriber {
    fn name(&self) -> &str {
        "local"
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<String, ProviderError> {
        let wav = run_piped(
            &self.ffmpeg,
            &["-i", "pipe:0", "-f", "wav", "-ar", "16000", "-ac", "1", "pipe:1"],
            clip.bytes.to_vec(),
        )
        .await?;

        let mut parts = self.command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ProviderError::request(self.name(), "empty transcription command"))?;
        let args: Vec<&str> = parts.collect();

        let text = run_piped(program, &args, wav).await?;
        Ok(String::from_utf8_lossy(&text).trim().to_string())
    }
}
