//! Agent pipeline: one utterance in, an ordered event stream out.
//!
//! Every stream either starts with a `transcript` or is the two-event reply
//! to an empty utterance, and always ends with exactly one `end` event.

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, error, info};

use super::events::StreamEvent;
use super::liveness::CancellationWatcher;
use super::translator::EventTranslator;
use crate::auth::UserId;
use crate::config::DEFAULT_ROOT_CHAIN;
use crate::context::ContextProvider;
use crate::error::ApiError;
use crate::providers::ProviderChain;
use crate::reasoning::{AgentInput, ReasoningEngine};

/// Reply to an utterance that transcribed to nothing.
pub const EMPTY_UTTERANCE_REPLY: &str = "I didn't catch that, please repeat";

/// Reply when an agent run finished without saying anything.
pub const NO_ANSWER_REPLY: &str = "I'm not sure how to help with that yet.";

/// Lazily produced, finite event sequence of one run.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Operating mode of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Single chat completion; identity optional.
    #[default]
    Chat,
    /// Tool-using reasoning engine; identity required.
    Agent,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Agent => "agent",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(Self::Chat),
            "agent" => Ok(Self::Agent),
            _ => Err(ApiError::InvalidMode(s.to_string())),
        }
    }
}

/// One utterance to process.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub utterance: String,
    /// Required in agent mode.
    pub identity: Option<UserId>,
    pub mode: Mode,
}

impl PipelineRequest {
    pub fn chat(utterance: impl Into<String>) -> Self {
        Self {
            utterance: utterance.into(),
            identity: None,
            mode: Mode::Chat,
        }
    }

    pub fn agent(utterance: impl Into<String>, identity: UserId) -> Self {
        Self {
            utterance: utterance.into(),
            identity: Some(identity),
            mode: Mode::Agent,
        }
    }
}

/// Orchestrates chat and agent runs.
#[derive(Clone)]
pub struct AgentPipeline {
    providers: Arc<ProviderChain>,
    context: ContextProvider,
    engine: Option<Arc<dyn ReasoningEngine>>,
    translator: EventTranslator,
}

impl AgentPipeline {
    pub fn new(providers: Arc<ProviderChain>, context: ContextProvider) -> Self {
        Self {
            providers,
            context,
            engine: None,
            translator: EventTranslator::new(DEFAULT_ROOT_CHAIN),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn ReasoningEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_translator(mut self, translator: EventTranslator) -> Self {
        self.translator = translator;
        self
    }

    pub fn providers(&self) -> &ProviderChain {
        &self.providers
    }

    /// Engine to use for agent mode, if one is configured and ready.
    fn ready_engine(&self) -> Option<Arc<dyn ReasoningEngine>> {
        self.engine.as_ref().filter(|e| e.is_available()).cloned()
    }

    /// Run one request. Nothing happens until the stream is polled.
    pub fn run(&self, request: PipelineRequest, liveness: Arc<dyn CancellationWatcher>) -> EventStream {
        let pipeline = self.clone();

        Box::pin(async_stream::stream! {
            if request.utterance.trim().is_empty() {
                yield StreamEvent::response(EMPTY_UTTERANCE_REPLY);
                yield StreamEvent::done();
                return;
            }

            yield StreamEvent::transcript(request.utterance.clone());

            let mut agent = None;
            if request.mode == Mode::Agent {
                let Some(identity) = request.identity.clone() else {
                    error!("Agent run requested without an identity");
                    yield StreamEvent::error();
                    yield StreamEvent::done();
                    return;
                };
                match pipeline.ready_engine() {
                    Some(engine) => agent = Some((identity, engine)),
                    None => info!(user_id = %identity, "No reasoning engine available, using chat"),
                }
            }

            let Some((identity, engine)) = agent else {
                match pipeline.providers.chat(&request.utterance).await {
                    Ok(reply) => {
                        yield StreamEvent::response(reply);
                    }
                    Err(e) => {
                        error!(error = %e, "Chat failed");
                        yield StreamEvent::error();
                    }
                }
                yield StreamEvent::done();
                return;
            };

            let context = match pipeline.context.build_context(&identity).await {
                Ok(context) => context,
                Err(e) => {
                    error!(error = %e, user_id = %identity, "Failed to build context");
                    yield StreamEvent::error();
                    yield StreamEvent::done();
                    return;
                }
            };
            debug!(user_id = %identity, context_len = context.len(), "Context built");

            let input = AgentInput::new(identity, &context, &request.utterance);
            let mut trace = match engine.trace(input).await {
                Ok(trace) => trace,
                Err(e) => {
                    error!(error = %e, engine = engine.name(), "Reasoning engine failed to start");
                    yield StreamEvent::error();
                    yield StreamEvent::done();
                    return;
                }
            };

            let mut responded = false;
            while let Some(next) = trace.next().await {
                if !liveness.is_connected() {
                    info!("Client disconnected, canceling run");
                    yield StreamEvent::canceled();
                    return;
                }

                let raw = match next {
                    Ok(raw) => raw,
                    Err(e) => {
                        error!(error = %e, engine = engine.name(), "Reasoning trace failed");
                        yield StreamEvent::error();
                        yield StreamEvent::done();
                        return;
                    }
                };

                let is_final = pipeline.translator.is_final_output(&raw);
                let Some(event) = pipeline.translator.translate(&raw) else {
                    continue;
                };
                if let StreamEvent::Response { .. } = event {
                    if is_final && responded {
                        debug!("Dropping final result already streamed as chunks");
                        continue;
                    }
                    responded = true;
                }
                yield event;
            }

            if !responded {
                yield StreamEvent::response(NO_ANSWER_REPLY);
            }
            yield StreamEvent::done();
        })
    }
}
