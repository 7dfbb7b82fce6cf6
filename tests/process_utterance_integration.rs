//! Integration tests for the streaming utterance endpoints.
//!
//! Each test spins up an Axum server on a random port with stub providers
//! and a scripted reasoning engine, then drives it over real HTTP.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{EncodingKey, Header, encode};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::time::timeout;

use voice_assist::api::voice_routes;
use voice_assist::auth::{Claims, IdentityVerifier, JwtVerifier};
use voice_assist::context::ContextProvider;
use voice_assist::error::{ProviderError, ReasoningError};
use voice_assist::pipeline::AgentPipeline;
use voice_assist::providers::{AudioClip, ChatProvider, ProviderChain, Transcriber};
use voice_assist::reasoning::{AgentInput, RawTraceEvent, ReasoningEngine, TraceStream};
use voice_assist::store::InMemoryStore;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const SECRET: &str = "integration-secret";

/// Transcribes by reading the audio bytes as UTF-8 text.
struct EchoTranscriber;

#[async_trait]
impl Transcriber for EchoTranscriber {
    fn name(&self) -> &str {
        "echo"
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<String, ProviderError> {
        Ok(String::from_utf8_lossy(&clip.bytes).trim().to_string())
    }
}

struct StubChat;

#[async_trait]
impl ChatProvider for StubChat {
    fn name(&self) -> &str {
        "stub"
    }

    async fn chat(&self, text: &str) -> Result<Value, ProviderError> {
        Ok(json!({"choices": [{"message": {"content": format!("chat: {text}")}}]}))
    }
}

/// Engine that creates a task and confirms it.
struct ScriptedEngine;

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn trace(&self, _input: AgentInput) -> Result<TraceStream, ReasoningError> {
        let events: Vec<Result<RawTraceEvent, ReasoningError>> = vec![
            Ok(RawTraceEvent::tool_start("create_task", json!({"title": "buy milk"}))),
            Ok(RawTraceEvent::tool_end("create_task", json!({"ok": true}))),
            Ok(RawTraceEvent::final_message("LangGraph", "I've added that task.")),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

/// Engine that stalls after `tool_use` until released, counting the trace
/// steps it has handed out.
struct GatedEngine {
    gate: Arc<Notify>,
    pulled: Arc<AtomicUsize>,
}

#[async_trait]
impl ReasoningEngine for GatedEngine {
    fn name(&self) -> &str {
        "gated"
    }

    async fn trace(&self, _input: AgentInput) -> Result<TraceStream, ReasoningError> {
        let gate = self.gate.clone();
        let pulled = self.pulled.clone();
        Ok(Box::pin(async_stream::stream! {
            pulled.fetch_add(1, Ordering::SeqCst);
            yield Ok(RawTraceEvent::tool_start("create_task", json!({"title": "buy milk"})));
            gate.notified().await;
            pulled.fetch_add(1, Ordering::SeqCst);
            yield Ok(RawTraceEvent::tool_end("create_task", json!({"ok": true})));
            pulled.fetch_add(1, Ordering::SeqCst);
            yield Ok(RawTraceEvent::final_message("LangGraph", "I've added that task."));
        }))
    }
}

struct ServerOptions {
    transcribe: bool,
    engine: Option<Arc<dyn ReasoningEngine>>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            transcribe: true,
            engine: Some(Arc::new(ScriptedEngine)),
        }
    }
}

/// Start an Axum server on a random port, return its base URL.
async fn start_server(options: ServerOptions) -> String {
    let mut providers = ProviderChain::new().with_chat(Arc::new(StubChat));
    if options.transcribe {
        providers = providers.with_transcriber(Arc::new(EchoTranscriber));
    }

    let mut pipeline = AgentPipeline::new(
        Arc::new(providers),
        ContextProvider::new(Arc::new(InMemoryStore::new())),
    );
    if let Some(engine) = options.engine {
        pipeline = pipeline.with_engine(engine);
    }

    let verifier: Arc<dyn IdentityVerifier> =
        Arc::new(JwtVerifier::new(&SecretString::from(SECRET.to_string()), None));
    let app = voice_routes(pipeline, Some(verifier));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

fn token_for(user: &str) -> String {
    let claims = Claims {
        sub: user.to_string(),
        exp: chrono::Utc::now().timestamp() + 3600,
        iss: None,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// Parse an NDJSON body into its records.
fn records(body: &str) -> Vec<Value> {
    assert!(body.is_empty() || body.ends_with('\n'), "unterminated record in {body:?}");
    body.lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn types(records: &[Value]) -> Vec<&str> {
    records.iter().map(|r| r["type"].as_str().unwrap()).collect()
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ok() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ServerOptions::default()).await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"status": "ok", "service": "voice-assist"}));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn chat_mode_streams_ndjson() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ServerOptions::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/process-utterance"))
            .header("content-type", "audio/webm")
            .body("hello there")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers()["content-type"].to_str().unwrap(),
            "application/x-ndjson"
        );

        let records = records(&resp.text().await.unwrap());
        assert_eq!(
            records,
            vec![
                json!({"type": "transcript", "content": "hello there"}),
                json!({"type": "response", "content": "chat: hello there"}),
                json!({"type": "end", "content": "done"}),
            ]
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn agent_mode_without_identity_is_unauthorized() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ServerOptions::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/process-utterance?mode=agent"))
            .body("remind me to buy milk")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 401);
        assert_ne!(
            resp.headers()["content-type"].to_str().unwrap(),
            "application/x-ndjson"
        );
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn agent_mode_rejects_forged_token() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ServerOptions::default()).await;
        let forged = encode(
            &Header::default(),
            &Claims {
                sub: "u1".into(),
                exp: chrono::Utc::now().timestamp() + 3600,
                iss: None,
            },
            &EncodingKey::from_secret(b"someone-else"),
        )
        .unwrap();

        let resp = reqwest::Client::new()
            .post(format!("{base}/process-utterance?mode=agent"))
            .bearer_auth(forged)
            .body("remind me to buy milk")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn agent_scenario_over_multipart() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ServerOptions::default()).await;
        let form = reqwest::multipart::Form::new()
            .text("mode", "agent")
            .part(
                "audio_file",
                reqwest::multipart::Part::bytes(b"remind me to buy milk".to_vec())
                    .file_name("clip.webm")
                    .mime_str("audio/webm")
                    .unwrap(),
            );

        let resp = reqwest::Client::new()
            .post(format!("{base}/process-utterance"))
            .bearer_auth(token_for("u1"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let records = records(&resp.text().await.unwrap());
        assert_eq!(
            records,
            vec![
                json!({"type": "transcript", "content": "remind me to buy milk"}),
                json!({"type": "tool_use", "tool": "create_task", "input": "{\"title\":\"buy milk\"}"}),
                json!({"type": "tool_result", "tool": "create_task", "result": "{\"ok\":true}", "output": "{\"ok\":true}"}),
                json!({"type": "response", "content": "I've added that task."}),
                json!({"type": "end", "content": "done"}),
            ]
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn agent_mode_without_engine_matches_chat() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ServerOptions {
            engine: None,
            ..ServerOptions::default()
        })
        .await;
        let client = reqwest::Client::new();

        let agent = client
            .post(format!("{base}/api/v1/process-audio?mode=agent"))
            .header("cookie", format!("access_token={}", token_for("u1")))
            .body("plan my day")
            .send()
            .await
            .unwrap();
        assert_eq!(agent.status(), 200);
        let agent = records(&agent.text().await.unwrap());

        let chat = client
            .post(format!("{base}/process-utterance?mode=chat"))
            .body("plan my day")
            .send()
            .await
            .unwrap();
        let chat = records(&chat.text().await.unwrap());

        assert_eq!(types(&agent), vec!["transcript", "response", "end"]);
        assert_eq!(agent, chat);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn silent_audio_asks_to_repeat() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ServerOptions::default()).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/process-utterance"))
            .body("   ")
            .send()
            .await
            .unwrap();

        let records = records(&resp.text().await.unwrap());
        assert_eq!(types(&records), vec!["response", "end"]);
        assert!(records[0]["content"].as_str().unwrap().contains("didn't catch"));
        assert_eq!(records[1]["content"], "done");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn no_stt_backend_is_service_unavailable() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ServerOptions {
            transcribe: false,
            ..ServerOptions::default()
        })
        .await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/process-utterance"))
            .body("hello")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), 503);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "NO_STT_BACKEND");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn bad_requests_get_error_envelopes() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ServerOptions::default()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/process-utterance?mode=dictation"))
            .body("hello")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "INVALID_MODE");

        let resp = client
            .post(format!("{base}/process-utterance"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "MISSING_AUDIO");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn trigger_runs_agent_for_user() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ServerOptions::default()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{base}/v1/agent/trigger"))
            .bearer_auth(token_for("u1"))
            .json(&json!({"trigger_type": "morning_briefing"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let records = records(&resp.text().await.unwrap());
        assert_eq!(
            types(&records),
            vec!["transcript", "tool_use", "tool_result", "response", "end"]
        );
        assert!(records[0]["content"].as_str().unwrap().starts_with("It is morning."));

        let resp = client
            .post(format!("{base}/v1/agent/trigger"))
            .bearer_auth(token_for("u1"))
            .json(&json!({"trigger_type": "lunch"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("{base}/v1/agent/trigger"))
            .json(&json!({"trigger_type": "morning_briefing"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dropped_body_stops_the_run() {
    timeout(TEST_TIMEOUT, async {
        let gate = Arc::new(Notify::new());
        let pulled = Arc::new(AtomicUsize::new(0));
        let base = start_server(ServerOptions {
            engine: Some(Arc::new(GatedEngine {
                gate: gate.clone(),
                pulled: pulled.clone(),
            })),
            ..ServerOptions::default()
        })
        .await;

        let mut resp = reqwest::Client::new()
            .post(format!("{base}/process-utterance?mode=agent"))
            .bearer_auth(token_for("u1"))
            .body("remind me to buy milk")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        // Read until the transcript and tool_use records have arrived.
        let mut received = String::new();
        while received.matches('\n').count() < 2 {
            let chunk = resp.chunk().await.unwrap().expect("body ended early");
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
        assert_eq!(
            types(&records(&received)),
            vec!["transcript", "tool_use"]
        );

        drop(resp);
        // Let the server notice the closed connection before the engine resumes.
        tokio::time::sleep(Duration::from_millis(200)).await;
        gate.notify_one();
        tokio::time::sleep(Duration::from_millis(200)).await;

        // The step pending at disconnect is pulled, then the run stops.
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    })
    .await
    .expect("test timed out");
}
