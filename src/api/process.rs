//! `POST /process-utterance`: audio in, NDJSON event stream out.
//!
//! Everything that can fail before the first event (mode, identity, audio,
//! transcription) is answered with a plain error envelope instead.

use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::HeaderMap;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use bytes::Bytes;
use serde::Deserialize;
use tracing::{info, warn};

use super::AppState;
use super::stream::ndjson_response;
use crate::auth::authenticate;
use crate::error::ApiError;
use crate::pipeline::{Mode, PipelineRequest};
use crate::providers::AudioClip;

/// Preferred multipart field for the audio file.
pub const AUDIO_FIELD: &str = "audio_file";

#[derive(Debug, Default, Deserialize)]
pub struct ProcessQuery {
    pub mode: Option<String>,
}

/// Parsed request body.
#[derive(Debug, Default)]
struct Upload {
    audio: Option<AudioClip>,
    mode: Option<String>,
}

pub async fn process_utterance(
    State(state): State<AppState>,
    Query(query): Query<ProcessQuery>,
    headers: HeaderMap,
    request: Request,
) -> Result<Response, ApiError> {
    let upload = read_upload(&state, &headers, request).await?;

    let mode = match query.mode.or(upload.mode) {
        Some(raw) => raw.parse::<Mode>()?,
        None => Mode::Chat,
    };

    let identity = authenticate(&headers, state.verifier.as_deref());
    if mode == Mode::Agent && identity.is_none() {
        info!("Rejected agent request without a verified identity");
        return Err(ApiError::Unauthorized);
    }

    let clip = upload
        .audio
        .filter(|clip| !clip.is_empty())
        .ok_or(ApiError::MissingAudio)?;

    let utterance = state
        .pipeline
        .providers()
        .transcribe(&clip)
        .await
        .map_err(|e| {
            warn!(error = %e, "Transcription failed");
            ApiError::from(e)
        })?;

    info!(%mode, chars = utterance.len(), "Utterance transcribed");
    Ok(ndjson_response(
        &state.pipeline,
        PipelineRequest {
            utterance,
            identity,
            mode,
        },
    ))
}

async fn read_upload(state: &AppState, headers: &HeaderMap, request: Request) -> Result<Upload, ApiError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
    {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        return read_multipart(multipart).await;
    }

    let bytes = Bytes::from_request(request, state)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Upload {
        audio: Some(AudioClip::new(bytes, content_type.as_deref())),
        mode: None,
    })
}

/// `audio_file` wins over any other file field; otherwise the first file.
async fn read_multipart(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut preferred = None;
    let mut first_file = None;
    let mut mode = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == AUDIO_FIELD || field.file_name().is_some() {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            let clip = AudioClip::new(bytes, content_type.as_deref());
            if name == AUDIO_FIELD {
                preferred = Some(clip);
            } else if first_file.is_none() {
                first_file = Some(clip);
            }
        } else if name == "mode" {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            mode = Some(text);
        }
    }

    Ok(Upload {
        audio: preferred.or(first_file),
        mode,
    })
}
