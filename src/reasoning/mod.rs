//! Reasoning engine seam.
//!
//! The tool-using agent lives outside this crate. The pipeline only sees it
//! through [`ReasoningEngine`]: give it an [`AgentInput`], get back a stream of
//! [`RawTraceEvent`]s.

pub mod remote;
pub mod trace;

pub use remote::RemoteTraceEngine;
pub use trace::{RawTraceEvent, TraceKind};

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::auth::UserId;
use crate::error::ReasoningError;

/// Ordered, finite trace of one reasoning run.
pub type TraceStream = Pin<Box<dyn Stream<Item = Result<RawTraceEvent, ReasoningError>> + Send>>;

/// A chat message handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub role: String,
    pub content: String,
}

impl AgentMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Input for one reasoning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInput {
    pub user_id: UserId,
    pub messages: Vec<AgentMessage>,
}

impl AgentInput {
    /// System context message followed by the user's utterance.
    pub fn new(user_id: UserId, context: &str, utterance: &str) -> Self {
        Self {
            user_id,
            messages: vec![
                AgentMessage::system(format!("System Context: {context}")),
                AgentMessage::user(utterance),
            ],
        }
    }
}

/// A tool-using agent that reports its execution as a raw trace.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap readiness probe. `false` sends agent mode down the chat path.
    fn is_available(&self) -> bool {
        true
    }

    async fn trace(&self, input: AgentInput) -> Result<TraceStream, ReasoningError>;
}
