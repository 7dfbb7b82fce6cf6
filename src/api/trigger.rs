//! `POST /v1/agent/trigger`: proactive agent runs (briefings, reviews).

use std::str::FromStr;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Deserialize;
use tracing::info;

use super::AppState;
use super::stream::ndjson_response;
use crate::auth::authenticate;
use crate::error::ApiError;
use crate::pipeline::PipelineRequest;

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    pub trigger_type: String,
}

/// Kinds of proactive run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerType {
    MorningBriefing,
    EveningReview,
}

impl TriggerType {
    /// Prompt handed to the agent in place of a spoken utterance.
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::MorningBriefing => {
                "It is morning. Please provide a briefing of my day based on my tasks \
                 and habits. Be concise and motivating."
            }
            Self::EveningReview => {
                "It is evening. Please ask me how my day went and review my progress. \
                 Ask if I have any thoughts to journal."
            }
        }
    }
}

impl FromStr for TriggerType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "morning_briefing" => Ok(Self::MorningBriefing),
            "evening_review" => Ok(Self::EveningReview),
            other => Err(ApiError::InvalidTrigger(other.to_string())),
        }
    }
}

pub async fn trigger_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let identity = authenticate(&headers, state.verifier.as_deref()).ok_or(ApiError::Unauthorized)?;
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let trigger: TriggerType = payload.trigger_type.parse()?;

    info!(user_id = %identity, ?trigger, "Proactive agent run");
    Ok(ndjson_response(
        &state.pipeline,
        PipelineRequest::agent(trigger.prompt(), identity),
    ))
}
