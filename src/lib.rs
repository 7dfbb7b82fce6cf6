//! Voice Assist: streaming agent-response pipeline.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod providers;
pub mod reasoning;
pub mod store;
