//! Provider fallback chains for transcription and chat.
//!
//! A [`ProviderChain`] holds an ordered list of strategies per capability.
//! Strategies are tried in order; the first success wins; a failed strategy
//! is logged and skipped, never retried. When every strategy has failed, or
//! none is configured, the chain returns [`ProviderError::NoProviderAvailable`].

pub mod chat;
pub mod speech;

pub use chat::{OpenAiCompatibleChat, WorkerChat, extract_reply};
pub use speech::{DeepgramTranscriber, LocalTranscriber, WorkerTranscriber};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// Content type assumed for audio that arrives without one.
pub const DEFAULT_AUDIO_TYPE: &str = "audio/webm";

/// An uploaded audio payload.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Bytes,
    pub content_type: String,
}

impl AudioClip {
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type
                .filter(|ct| !ct.trim().is_empty())
                .unwrap_or(DEFAULT_AUDIO_TYPE)
                .to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Speech-to-text strategy.
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    /// An empty string means the clip held no speech.
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, ProviderError>;
}

/// Text completion strategy. Returns the provider's raw JSON reply.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, text: &str) -> Result<Value, ProviderError>;
}

/// Ordered strategies for both capabilities.
#[derive(Default, Clone)]
pub struct ProviderChain {
    transcribers: Vec<Arc<dyn Transcriber>>,
    chat: Vec<Arc<dyn ChatProvider>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transcription strategy at the lowest priority.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcribers.push(transcriber);
        self
    }

    /// Append a chat strategy at the lowest priority.
    pub fn with_chat(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.chat.push(provider);
        self
    }

    /// Build both chains from configuration. Only fully configured
    /// strategies are included.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ProviderError::request("http", e))?;

        let mut chain = Self::new();

        if let (Some(url), Some(key)) = (&config.stt_url, &config.deepgram_api_key) {
            chain = chain.with_transcriber(Arc::new(DeepgramTranscriber::new(
                client.clone(),
                url,
                key.clone(),
            )));
        }
        if let Some(worker) = &config.ml_worker_url {
            chain = chain.with_transcriber(Arc::new(WorkerTranscriber::new(client.clone(), worker)));
        }
        if config.enable_local_stt {
            chain = chain.with_transcriber(Arc::new(LocalTranscriber::new(
                &config.ffmpeg_path,
                &config.local_stt_command,
            )));
        }

        if let (Some(url), Some(key)) = (&config.llm_url, &config.groq_api_key) {
            chain = chain.with_chat(Arc::new(
                OpenAiCompatibleChat::new("groq", client.clone(), url, &config.groq_model)
                    .with_api_key(key.clone())
                    .with_system_prompt(&config.system_prompt),
            ));
        }
        if let Some(worker) = &config.ml_worker_url {
            chain = chain.with_chat(Arc::new(WorkerChat::new(client.clone(), worker)));
        }
        if let Some(base) = &config.local_llm_url {
            let endpoint = format!("{}/chat/completions", base.trim_end_matches('/'));
            chain = chain.with_chat(Arc::new(
                OpenAiCompatibleChat::new("local", client, endpoint, &config.ollama_model)
                    .with_system_prompt(&config.system_prompt),
            ));
        }

        info!(
            transcribers = ?chain.transcriber_names(),
            chat = ?chain.chat_names(),
            "Provider chains configured"
        );
        Ok(chain)
    }

    pub fn can_transcribe(&self) -> bool {
        !self.transcribers.is_empty()
    }

    pub fn transcriber_names(&self) -> Vec<&str> {
        self.transcribers.iter().map(|t| t.name()).collect()
    }

    pub fn chat_names(&self) -> Vec<&str> {
        self.chat.iter().map(|c| c.name()).collect()
    }

    /// Transcribe with the first strategy that succeeds.
    pub async fn transcribe(&self, clip: &AudioClip) -> Result<String, ProviderError> {
        let mut attempted = Vec::with_capacity(self.transcribers.len());
        for transcriber in &self.transcribers {
            let name = transcriber.name();
            match transcriber.transcribe(clip).await {
                Ok(text) => {
                    info!(provider = name, chars = text.len(), "Transcription succeeded");
                    return Ok(text.trim().to_string());
                }
                Err(e) => {
                    warn!(provider = name, error = %e, "Transcription failed, trying next provider");
                    attempted.push(name.to_string());
                }
            }
        }
        Err(ProviderError::NoProviderAvailable {
            capability: "transcription".to_string(),
            attempted,
        })
    }

    /// Chat with the first strategy that succeeds; returns the reply text.
    pub async fn chat(&self, text: &str) -> Result<String, ProviderError> {
        let mut attempted = Vec::with_capacity(self.chat.len());
        for provider in &self.chat {
            let name = provider.name();
            match provider.chat(text).await {
                Ok(raw) => {
                    info!(provider = name, "Chat succeeded");
                    return Ok(extract_reply(&raw));
                }
                Err(e) => {
                    warn!(provider = name, error = %e, "Chat failed, trying next provider");
                    attempted.push(name.to_string());
                }
            }
        }
        Err(ProviderError::NoProviderAvailable {
            capability: "chat".to_string(),
            attempted,
        })
    }
}
