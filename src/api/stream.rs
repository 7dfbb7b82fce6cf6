//! NDJSON response bodies backed by one producer task per request.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use crate::pipeline::{AgentPipeline, CancellationWatcher, ChannelLiveness, NDJSON_CONTENT_TYPE, PipelineRequest};

/// Start the pipeline for `request` and return the streaming response.
///
/// The producer writes into a channel of capacity one, so it never runs
/// more than one record ahead of the transport.
pub fn ndjson_response(pipeline: &AgentPipeline, request: PipelineRequest) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("stream", %request_id, mode = %request.mode);

    let (tx, rx) = mpsc::channel::<Bytes>(1);
    let liveness: Arc<dyn CancellationWatcher> = Arc::new(ChannelLiveness::new(tx.clone()));
    let mut events = pipeline.run(request, liveness);

    tokio::spawn(
        async move {
            let mut attached = true;
            while let Some(event) = events.next().await {
                debug!(kind = event.kind(), "Stream event");
                if event.is_terminal() {
                    info!(outcome = ?event, "Stream finished");
                }
                if !attached {
                    // Keep pulling so the run reaches its own terminal event.
                    continue;
                }
                let line = match event.to_ndjson() {
                    Ok(line) => line,
                    Err(e) => {
                        error!(error = %e, "Failed to encode stream event");
                        continue;
                    }
                };
                if tx.send(line).await.is_err() {
                    info!("Client disconnected");
                    attached = false;
                }
            }
        }
        .instrument(span),
    );

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    (
        [(CONTENT_TYPE, NDJSON_CONTENT_TYPE), (CACHE_CONTROL, "no-cache")],
        body,
    )
        .into_response()
}
