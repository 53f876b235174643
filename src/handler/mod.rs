//! Handler module - event routing and reply context.
//!
//! Provides:
//! - [`HandlerRegistry`] - maps event shapes to handlers
//! - [`RequestContext`] - lets handlers answer the envelope behind an event
//!
//! # Example
//!
//! ```ignore
//! use socketmode_client::handler::{HandlerRegistry, Selector};
//!
//! let mut registry = HandlerRegistry::new();
//!
//! // Answer a slash command with a payload
//! registry.register(Selector::SlashCommand("/echo".into()), |event, ctx| async move {
//!     ctx.reply(&serde_json::json!({"text": "pong"}))
//! });
//!
//! // Everything else lands here
//! registry.register_default(|event, _ctx| async move {
//!     tracing::debug!(kind = ?event.kind(), "unrouted event");
//!     Ok(())
//! });
//! ```

mod context;
mod registry;

pub use context::RequestContext;
pub use registry::{BoxFuture, FnHandler, Handler, HandlerRegistry, HandlerResult, Selector};
