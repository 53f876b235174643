//! Handler registry for routing events to application callbacks.
//!
//! Routing is hierarchical:
//!
//! 1. coarse handlers registered for the event's [`EventKind`]
//! 2. fine handlers for the refinement the payload carries: the inner
//!    event type of an Events API callback, the interaction type, each
//!    block action's `action_id`, or the slash command
//!
//! Every matching handler runs in its own task. When nothing matches at
//! any level the default handler runs instead, exactly once.
//!
//! # Example
//!
//! ```ignore
//! use socketmode_client::handler::{HandlerRegistry, Selector};
//! use socketmode_client::EventKind;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register(Selector::Kind(EventKind::Hello), |_event, _ctx| async { Ok(()) });
//! registry.register(Selector::SlashCommand("/deploy".into()), |_event, ctx| async move {
//!     ctx.reply(&serde_json::json!({"text": "on it"}))
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::FutureExt;

use super::RequestContext;
use crate::error::Result;
use crate::event::{Event, EventKind, EventPayload};

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Handle one event.
    fn call(&self, event: Arc<Event>, ctx: RequestContext) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper turning an async closure into a [`Handler`].
pub struct FnHandler<F, Fut>
where
    F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnHandler<F, Fut>
where
    F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new closure handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut> Handler for FnHandler<F, Fut>
where
    F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, event: Arc<Event>, ctx: RequestContext) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.handler)(event, ctx))
    }
}

/// Which events a handler receives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Every event of a coarse category.
    Kind(EventKind),
    /// Events API callbacks whose inner event has this `type`.
    EventType(String),
    /// Interactive callbacks of this `type` (e.g. `view_submission`).
    Interaction(String),
    /// Block actions with this `action_id`. One handler per id.
    BlockAction(String),
    /// This slash command. One handler per command.
    SlashCommand(String),
}

type SharedHandler = Arc<dyn Handler>;

/// Routing table from event shape to handlers.
///
/// Read-only once the client starts, so dispatch takes no locks.
#[derive(Default)]
pub struct HandlerRegistry {
    by_kind: HashMap<EventKind, Vec<SharedHandler>>,
    by_event_type: HashMap<String, Vec<SharedHandler>>,
    by_interaction: HashMap<String, Vec<SharedHandler>>,
    by_action: HashMap<String, SharedHandler>,
    by_command: HashMap<String, SharedHandler>,
    default: Option<SharedHandler>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure for `selector`.
    ///
    /// # Panics
    ///
    /// Panics if the block action id or slash command is empty, or already
    /// has a handler. Silently shadowing one would drop events.
    pub fn register<F, Fut>(&mut self, selector: Selector, handler: F)
    where
        F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_handler(selector, Arc::new(FnHandler::new(handler)));
    }

    /// Register a prepared handler for `selector`. Same rules as [`register`](Self::register).
    pub fn register_handler(&mut self, selector: Selector, handler: SharedHandler) {
        match selector {
            Selector::Kind(kind) => self.by_kind.entry(kind).or_default().push(handler),
            Selector::EventType(kind) => self.by_event_type.entry(kind).or_default().push(handler),
            Selector::Interaction(kind) => {
                self.by_interaction.entry(kind).or_default().push(handler)
            }
            Selector::BlockAction(action_id) => {
                if action_id.is_empty() {
                    panic!("block action id must not be empty");
                }
                if self.by_action.contains_key(&action_id) {
                    panic!("handler already registered for block action {action_id:?}");
                }
                self.by_action.insert(action_id, handler);
            }
            Selector::SlashCommand(command) => {
                if command.is_empty() {
                    panic!("slash command must not be empty");
                }
                if self.by_command.contains_key(&command) {
                    panic!("handler already registered for slash command {command:?}");
                }
                self.by_command.insert(command, handler);
            }
        }
    }

    /// Set the fallback run when no other handler matches.
    pub fn register_default<F, Fut>(&mut self, handler: F)
    where
        F: Fn(Arc<Event>, RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        if self.default.is_some() {
            tracing::debug!("replacing default handler");
        }
        self.default = Some(Arc::new(FnHandler::new(handler)));
    }

    /// Whether a default handler is set.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Total number of registered handlers, default excluded.
    pub fn len(&self) -> usize {
        let lists: usize = self
            .by_kind
            .values()
            .chain(self.by_event_type.values())
            .chain(self.by_interaction.values())
            .map(Vec::len)
            .sum();
        lists + self.by_action.len() + self.by_command.len()
    }

    /// Whether no handler (default excluded) is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handlers that would run for `event`, in registration order per level.
    pub fn matching(&self, event: &Event) -> Vec<SharedHandler> {
        let mut matched: Vec<SharedHandler> = Vec::new();

        if let Some(handlers) = self.by_kind.get(&event.kind()) {
            matched.extend(handlers.iter().cloned());
        }

        match event.payload() {
            Some(EventPayload::EventsApi(payload)) => {
                if let Some(handlers) = self.by_event_type.get(&payload.event.kind) {
                    matched.extend(handlers.iter().cloned());
                }
            }
            Some(EventPayload::Interactive(payload)) => {
                if let Some(handlers) = self.by_interaction.get(&payload.kind) {
                    matched.extend(handlers.iter().cloned());
                }
                let mut seen: Vec<&str> = Vec::new();
                for action in &payload.actions {
                    if seen.contains(&action.action_id.as_str()) {
                        continue;
                    }
                    seen.push(&action.action_id);
                    if let Some(handler) = self.by_action.get(&action.action_id) {
                        matched.push(handler.clone());
                    }
                }
            }
            Some(EventPayload::SlashCommand(payload)) => {
                if let Some(handler) = self.by_command.get(&payload.command) {
                    matched.push(handler.clone());
                }
            }
            None => {}
        }

        if matched.is_empty() {
            if let Some(default) = &self.default {
                matched.push(default.clone());
            }
        }
        matched
    }

    /// Spawn one task per matching handler and return how many were spawned.
    ///
    /// Fire-and-forget: tasks are not joined and may outlive this call.
    /// A handler error or panic is logged at the task boundary and never
    /// reaches the caller.
    pub fn dispatch(&self, event: Arc<Event>, ctx: RequestContext) -> usize {
        let handlers = self.matching(&event);
        let spawned = handlers.len();

        for handler in handlers {
            let event = event.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let kind = event.kind();
                // Keeps the envelope pending until the handler has finished.
                let _held = ctx.clone();
                let run = AssertUnwindSafe(async move { handler.call(event, ctx).await });
                match run.catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::error!(?kind, "Handler error: {}", e);
                    }
                    Err(_) => {
                        tracing::error!(?kind, "Handler panicked");
                    }
                }
            });
        }

        spawned
    }
}
