//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// System prompt handed to chat providers when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a friendly and concise AI productivity assistant.";

/// Root chain name emitted by the reasoning engine for the top-level run.
pub const DEFAULT_ROOT_CHAIN: &str = "LangGraph";

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port.
    pub port: u16,
    /// HS256 secret used to verify bearer tokens. `None` disables agent mode.
    pub jwt_secret: Option<SecretString>,
    /// Issuer required on verified tokens, if set.
    pub jwt_issuer: Option<String>,
    /// Remote reasoning engine endpoint. `None` means no engine is available.
    pub agent_trace_url: Option<String>,
    /// Name of the root chain in the reasoning engine's trace.
    pub root_chain_name: String,
    /// Directory for rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            jwt_secret: None,
            jwt_issuer: None,
            agent_trace_url: None,
            root_chain_name: DEFAULT_ROOT_CHAIN.to_string(),
            log_dir: None,
        }
    }
}

impl ServerConfig {
    /// Load from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            port: parse_var("VOICE_ASSIST_PORT")?.unwrap_or(defaults.port),
            jwt_secret: non_empty_var("JWT_SECRET_KEY").map(SecretString::from),
            jwt_issuer: non_empty_var("JWT_ISSUER"),
            agent_trace_url: non_empty_var("AGENT_TRACE_URL"),
            root_chain_name: non_empty_var("AGENT_ROOT_CHAIN").unwrap_or(defaults.root_chain_name),
            log_dir: non_empty_var("LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Configuration for the transcription and chat provider chains.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// External speech API endpoint (Deepgram).
    pub stt_url: Option<String>,
    pub deepgram_api_key: Option<SecretString>,
    /// External chat completion endpoint (Groq, OpenAI-compatible).
    pub llm_url: Option<String>,
    pub groq_api_key: Option<SecretString>,
    pub groq_model: String,
    /// Delegated ML worker base URL.
    pub ml_worker_url: Option<String>,
    /// Whether the local speech strategy is enabled.
    pub enable_local_stt: bool,
    /// Command that reads 16 kHz mono WAV on stdin and prints the transcript.
    pub local_stt_command: String,
    pub ffmpeg_path: String,
    /// Local OpenAI-compatible chat endpoint base (Ollama). `None` disables it.
    pub local_llm_url: Option<String>,
    pub ollama_model: String,
    /// Timeout applied by provider HTTP clients.
    pub http_timeout: Duration,
    /// System prompt sent with every chat request.
    pub system_prompt: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            stt_url: None,
            deepgram_api_key: None,
            llm_url: None,
            groq_api_key: None,
            groq_model: "llama-3.1-8b-instant".to_string(),
            ml_worker_url: None,
            enable_local_stt: false,
            local_stt_command: "whisper-stt".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            local_llm_url: Some("http://localhost:11434/v1".to_string()),
            ollama_model: "phi-3-mini".to_string(),
            http_timeout: Duration::from_secs(60),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Load from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // LOCAL_LLM_URL="" explicitly disables the local chat strategy.
        let local_llm_url = match std::env::var("LOCAL_LLM_URL") {
            Ok(url) if url.trim().is_empty() => None,
            Ok(url) => Some(url.trim().to_string()),
            Err(_) => defaults.local_llm_url,
        };

        let http_timeout = parse_var::<u64>("HTTP_TIMEOUT_SECONDS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_timeout);

        Ok(Self {
            stt_url: non_empty_var("STT_URL"),
            deepgram_api_key: non_empty_var("DEEPGRAM_API_KEY").map(SecretString::from),
            llm_url: non_empty_var("LLM_URL"),
            groq_api_key: non_empty_var("GROQ_API_KEY").map(SecretString::from),
            groq_model: non_empty_var("GROQ_MODEL").unwrap_or(defaults.groq_model),
            ml_worker_url: non_empty_var("ML_WORKER_URL"),
            enable_local_stt: std::env::var("ENABLE_LOCAL_STT").as_deref() == Ok("1"),
            local_stt_command: non_empty_var("LOCAL_STT_COMMAND")
                .unwrap_or(defaults.local_stt_command),
            ffmpeg_path: non_empty_var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            local_llm_url,
            ollama_model: non_empty_var("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            http_timeout,
            system_prompt: non_empty_var("ASSISTANT_SYSTEM_PROMPT")
                .unwrap_or(defaults.system_prompt),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
    }
}
