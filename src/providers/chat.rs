//! Chat completion strategies and reply extraction.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::debug;

use super::ChatProvider;
use crate::config::DEFAULT_SYSTEM_PROMPT;
use crate::error::ProviderError;

/// Pull the assistant text out of a chat provider's JSON reply.
///
/// Tries `choices[0].message.content`, then `reply`, `output` and `text`.
/// A bare JSON string is returned as-is; anything else becomes compact JSON.
pub fn extract_reply(raw: &Value) -> String {
    let known = raw
        .pointer("/choices/0/message/content")
        .into_iter()
        .chain(["reply", "output", "text"].iter().filter_map(|key| raw.get(key)))
        .filter_map(Value::as_str)
        .find(|s| !s.is_empty());

    match (known, raw) {
        (Some(text), _) => text.to_string(),
        (None, Value::String(s)) => s.clone(),
        (None, other) => other.to_string(),
    }
}

/// OpenAI-compatible `/chat/completions` endpoint (Groq, Ollama, …).
pub struct OpenAiCompatibleChat {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    system_prompt: String,
}

impl OpenAiCompatibleChat {
    /// `endpoint` is the full completions URL.
    pub fn new(
        name: impl Into<String>,
        client: reqwest::Client,
        endpoint: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatibleChat {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, text: &str) -> Result<Value, ProviderError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": text},
            ],
        });

        debug!(provider = %self.name, model = %self.model, "Sending chat completion");
        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::request(&self.name, e))?
            .error_for_status()
            .map_err(|e| ProviderError::request(&self.name, e))?;

        response
            .json()
            .await
            .map_err(|e| ProviderError::invalid(&self.name, e))
    }
}

/// Delegated ML worker, `POST {base}/llm` with `{"text": ...}`.
pub struct WorkerChat {
    client: reqwest::Client,
    endpoint: String,
}

impl WorkerChat {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/llm", base_url.trim_end_matches('/')),
        }
    }
}

#[async_trait]
impl ChatProvider for WorkerChat {
    fn name(&self) -> &str {
        "ml-worker"
    }

    async fn chat(&self, text: &str) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "text": text }))
            .send()
            .await
            .map_err(|e| ProviderError::request(self.name(), e))?
            .error_for_status()
            .map_err(|e| ProviderError::request(self.name(), e))?;

        response
            .json()
            .await
            .map_err(|e| ProviderError::invalid(self.name(), e))
    }
}
