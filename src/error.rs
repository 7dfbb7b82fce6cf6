//! Error types for voice-assist.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Repository errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

/// Errors from the speech-to-text and chat provider strategies.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("No {capability} provider available (attempted: {attempted:?})")]
    NoProviderAvailable {
        capability: String,
        /// Providers that were tried and failed. Empty when none is configured.
        attempted: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Build a `RequestFailed` from any displayable cause.
    pub fn request(provider: &str, reason: impl std::fmt::Display) -> Self {
        Self::RequestFailed {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build an `InvalidResponse` from any displayable cause.
    pub fn invalid(provider: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Reasoning engine errors.
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("Reasoning engine unavailable: {0}")]
    Unavailable(String),

    #[error("Reasoning engine request failed: {0}")]
    RequestFailed(String),

    #[error("Reasoning trace interrupted: {0}")]
    Stream(String),
}

/// Failures surfaced synchronously, before any stream body is opened.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Login required for agent mode")]
    Unauthorized,

    #[error("Unsupported mode: {0}")]
    InvalidMode(String),

    #[error("Unknown trigger type: {0}")]
    InvalidTrigger(String),

    #[error("Request is missing an audio payload")]
    MissingAudio,

    #[error("Malformed request: {0}")]
    BadRequest(String),

    #[error("No speech-to-text backend available")]
    NoSttBackend,

    #[error("Speech-to-text failed")]
    SttFailed,
}

impl ApiError {
    /// Machine-readable code carried in the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidMode(_) => "INVALID_MODE",
            Self::InvalidTrigger(_) => "INVALID_TRIGGER",
            Self::MissingAudio => "MISSING_AUDIO",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NoSttBackend => "NO_STT_BACKEND",
            Self::SttFailed => "STT_FAILED",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::InvalidMode(_)
            | Self::InvalidTrigger(_)
            | Self::MissingAudio
            | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoSttBackend => StatusCode::SERVICE_UNAVAILABLE,
            Self::SttFailed => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<ProviderError> for ApiError {
    /// Map a transcription failure onto its pre-stream error.
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NoProviderAvailable { attempted, .. } if attempted.is_empty() => {
                Self::NoSttBackend
            }
            _ => Self::SttFailed,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        (self.status(), Json(body)).into_response()
    }
}
