//! Streaming agent-response pipeline.
//!
//! An utterance flows through:
//! 1. `AgentPipeline::run()`: mode branch, context injection, engine trace
//! 2. `EventTranslator::translate()`: raw trace step → protocol event
//! 3. `CancellationWatcher::is_connected()`: checked between trace steps
//!
//! The caller encodes each [`StreamEvent`] as one NDJSON record.

pub mod agent;
pub mod events;
pub mod liveness;
pub mod translator;

pub use agent::{AgentPipeline, EventStream, Mode, PipelineRequest};
pub use events::{NDJSON_CONTENT_TYPE, StreamEvent};
pub use liveness::{AlwaysConnected, CancellationWatcher, ChannelLiveness};
pub use translator::EventTranslator;
