//! Render lifecycle hooks
//!
//! The host rendering pipeline emits [`RenderEvent`]s into a [`RenderHooks`]
//! registry around each page template render. Subscribers (the dispatch
//! coordinator, at minimum) register once at startup.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut hooks = RenderHooks::new();
//! hooks.subscribe(Arc::new(coordinator));
//!
//! let mut ctx = RequestContext::site(settings, client);
//! hooks.emit(&mut ctx, RenderEvent::WillRender { template: "home" }).await;
//! // ... render, emitting RenderEvent::Hook for each in-template hook ...
//! hooks.emit(&mut ctx, RenderEvent::DidRender).await;
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::coordinator::DispatchCoordinator;

/// Name of the in-template hook that sends the page view manually
pub const SEND_PAGE_VIEW_HOOK: &str = "pagehitSendPageView";

/// Notification emitted by the host around a page template render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEvent<'a> {
    /// A page template is about to render
    WillRender { template: &'a str },
    /// The page template finished rendering
    DidRender,
    /// The template invoked a named hook while rendering
    Hook { name: &'a str },
}

/// Something that reacts to render lifecycle notifications
#[async_trait]
pub trait RenderSubscriber: Send + Sync {
    async fn on_render_event(&self, ctx: &mut RequestContext, event: RenderEvent<'_>);
}

/// Subscriber registry the host emits into
#[derive(Clone, Default)]
pub struct RenderHooks {
    subscribers: Vec<Arc<dyn RenderSubscriber>>,
}

impl RenderHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; subscribers are notified in registration order.
    pub fn subscribe(&mut self, subscriber: Arc<dyn RenderSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Notify every subscriber of one event for this request.
    pub async fn emit(&self, ctx: &mut RequestContext, event: RenderEvent<'_>) {
        for subscriber in &self.subscribers {
            subscriber.on_render_event(ctx, event).await;
        }
    }
}

impl std::fmt::Debug for RenderHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHooks")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[async_trait]
impl RenderSubscriber for DispatchCoordinator {
    async fn on_render_event(&self, ctx: &mut RequestContext, event: RenderEvent<'_>) {
        match event {
            RenderEvent::WillRender { template } => self.on_template_will_render(ctx, template),
            RenderEvent::DidRender => {
                self.on_template_did_render(ctx).await;
            }
            RenderEvent::Hook { name } if name == SEND_PAGE_VIEW_HOOK => {
                self.trigger_manual_send(ctx).await;
            }
            RenderEvent::Hook { .. } => {}
        }
    }
}
