use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use voice_assist::api::voice_routes;
use voice_assist::auth::{IdentityVerifier, JwtVerifier};
use voice_assist::config::{ProviderConfig, ServerConfig};
use voice_assist::context::ContextProvider;
use voice_assist::pipeline::{AgentPipeline, EventTranslator};
use voice_assist::providers::ProviderChain;
use voice_assist::reasoning::RemoteTraceEngine;
use voice_assist::store::{Database, InMemoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server_config = ServerConfig::from_env().context("invalid server configuration")?;

    // Held for the lifetime of the process so buffered file logs get flushed.
    let _log_guard = init_tracing(server_config.log_dir.as_deref());

    let provider_config = ProviderConfig::from_env().context("invalid provider configuration")?;

    info!("Voice Assist v{}", env!("CARGO_PKG_VERSION"));

    // ── Providers ────────────────────────────────────────────────────────
    let providers = ProviderChain::from_config(&provider_config)?;
    if !providers.can_transcribe() {
        warn!("No speech-to-text provider configured; audio requests will be rejected");
    }

    // ── Store + pipeline ─────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(InMemoryStore::new());
    let mut pipeline = AgentPipeline::new(Arc::new(providers), ContextProvider::new(db))
        .with_translator(EventTranslator::new(&server_config.root_chain_name));

    match &server_config.agent_trace_url {
        Some(url) => {
            let engine = RemoteTraceEngine::new(url, provider_config.http_timeout)?;
            pipeline = pipeline.with_engine(Arc::new(engine));
            info!(url = %url, "Reasoning engine configured");
        }
        None => info!("No reasoning engine configured; agent mode answers via chat"),
    }

    // ── Auth ─────────────────────────────────────────────────────────────
    let verifier: Option<Arc<dyn IdentityVerifier>> = match &server_config.jwt_secret {
        Some(secret) => Some(Arc::new(JwtVerifier::new(
            secret,
            server_config.jwt_issuer.as_deref(),
        ))),
        None => {
            warn!("JWT_SECRET_KEY not set; agent mode will reject every caller");
            None
        }
    };

    // ── Serve ────────────────────────────────────────────────────────────
    let app = voice_routes(pipeline, verifier);
    let addr = SocketAddr::from(([0, 0, 0, 0], server_config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(%addr, "Listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Console logging, plus a daily-rolling file when `log_dir` is set.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer().with_target(false);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "voice-assist.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            None
        }
    }
}
