//! Dispatch coordinator
//!
//! Decides whether, when and with what payload a request's hit is sent.
//!
//! ## Flow
//!
//! ```text
//! will_render(template) ──► RequestContext.current_template
//!
//! did_render / manual hook / tracking route
//!        │
//!        ▼
//!   ┌─────────┐   not a site request, or already sent ──► Skipped
//!   │  guard  │
//!   └────┬────┘   page_view_sent = true
//!        ▼
//!   EventResolver ── NotConfigured / Excluded ──► Skipped
//!        ▼
//!   TitleEnrichment ──► CommerceEnrichment ──► Deliver
//! ```
//!
//! Title enrichment only applies to template page views. Tracking route
//! hits keep the title they were given.
//!
//! The sent flag is claimed before resolution and delivery, so a request
//! gets at most one delivery attempt even when several triggers fire or the
//! first attempt fails.

use std::sync::Arc;
use std::time::Duration;

use crate::config::DeliveryMode;
use crate::context::RequestContext;
use crate::delivery::Deliver;
use crate::enrich::{CommerceEnrichment, CommerceProvider, TitleEnrichment, TitleProvider};
use crate::resolver::{EventResolver, Resolution};
use crate::types::{AnalyticsEvent, CustomEventSpec, DeliveryResult, RequestKind};

/// Why a send did not reach the delivery client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Console, background or control panel invocation
    InvalidInvocationContext(RequestKind),
    /// This request already made its attempt
    AlreadySent,
    /// `did_render` fired with automatic page views turned off
    AutoSendDisabled,
    /// Tracking disabled or no tracking id
    NotConfigured,
    /// Visitor filtered out (e.g. crawler)
    ExcludedClient(&'static str),
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::InvalidInvocationContext(_) => "invalid_invocation_context",
            SkipReason::AlreadySent => "already_sent",
            SkipReason::AutoSendDisabled => "auto_send_disabled",
            SkipReason::NotConfigured => "not_configured",
            SkipReason::ExcludedClient(_) => "excluded_client",
        }
    }
}

/// What a call into the send path did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// No delivery attempt was made
    Skipped(SkipReason),
    /// Delivery ran inline and finished with this result
    Delivered(DeliveryResult),
    /// Delivery was handed to a detached task
    Dispatched,
}

impl SendOutcome {
    /// True when this call made the request's delivery attempt
    pub fn attempted(&self) -> bool {
        !matches!(self, SendOutcome::Skipped(_))
    }
}

/// Which hit a send call asks for
enum HitRequest<'a> {
    /// Default page view for the current template
    Template,
    PageView {
        path: &'a str,
        title: Option<&'a str>,
    },
    Event(&'a CustomEventSpec),
}

/// Coordinates resolution, enrichment and delivery for each request.
///
/// Holds no per-request state. One coordinator is shared by every request;
/// each request brings its own [`RequestContext`].
#[derive(Clone)]
pub struct DispatchCoordinator {
    resolver: EventResolver,
    title: TitleEnrichment,
    commerce: CommerceEnrichment,
    delivery: Arc<dyn Deliver>,
}

impl DispatchCoordinator {
    /// Create a coordinator with no enrichment providers installed.
    pub fn new(delivery: Arc<dyn Deliver>) -> Self {
        Self {
            resolver: EventResolver::new(),
            title: TitleEnrichment::absent(),
            commerce: CommerceEnrichment::absent(),
            delivery,
        }
    }

    /// Install an SEO title provider.
    pub fn with_title_provider(mut self, provider: Arc<dyn TitleProvider>) -> Self {
        self.title = TitleEnrichment::with_provider(provider);
        self
    }

    /// Install a commerce provider.
    pub fn with_commerce_provider(mut self, provider: Arc<dyn CommerceProvider>) -> Self {
        self.commerce = CommerceEnrichment::with_provider(provider);
        self
    }

    /// Record the template about to render. Never sends.
    pub fn on_template_will_render(&self, ctx: &mut RequestContext, template_id: &str) {
        tracing::trace!(template = %template_id, "Template will render");
        ctx.set_current_template(template_id);
    }

    /// Send the page view after rendering, if automatic page views are on.
    pub async fn on_template_did_render(&self, ctx: &mut RequestContext) -> SendOutcome {
        if !ctx.settings().auto_send_page_view {
            return SendOutcome::Skipped(SkipReason::AutoSendDisabled);
        }
        self.send(ctx).await
    }

    /// Send from an explicit in-template hook, regardless of auto send.
    pub async fn trigger_manual_send(&self, ctx: &mut RequestContext) -> SendOutcome {
        self.send(ctx).await
    }

    /// Send the page view for the current template, at most once per request.
    pub async fn send(&self, ctx: &mut RequestContext) -> SendOutcome {
        self.dispatch(ctx, HitRequest::Template).await
    }

    /// Send a page view for an explicit path, at most once per request.
    pub async fn send_page_view(
        &self,
        ctx: &mut RequestContext,
        path: &str,
        title: Option<&str>,
    ) -> SendOutcome {
        self.dispatch(ctx, HitRequest::PageView { path, title }).await
    }

    /// Send a custom event, at most once per request.
    pub async fn send_event(
        &self,
        ctx: &mut RequestContext,
        spec: &CustomEventSpec,
    ) -> SendOutcome {
        self.dispatch(ctx, HitRequest::Event(spec)).await
    }

    async fn dispatch(&self, ctx: &mut RequestContext, request: HitRequest<'_>) -> SendOutcome {
        let kind = ctx.kind();
        if !kind.is_site() {
            tracing::debug!(kind = %kind, "Not a site request, hit not sent");
            return SendOutcome::Skipped(SkipReason::InvalidInvocationContext(kind));
        }
        if !ctx.claim_send() {
            tracing::debug!("Hit already sent for this request");
            return SendOutcome::Skipped(SkipReason::AlreadySent);
        }

        // Explicit hits carry their own title
        let seo_title = matches!(request, HitRequest::Template);
        let resolution = match request {
            HitRequest::Template => self.resolver.resolve(ctx),
            HitRequest::PageView { path, title } => {
                self.resolver.resolve_page_view(ctx, path, title)
            }
            HitRequest::Event(spec) => self.resolver.resolve_event(ctx, spec),
        };

        let mut event = match resolution {
            Resolution::Event(event) => event,
            Resolution::NotConfigured => {
                tracing::debug!("Tracking not configured, hit not sent");
                return SendOutcome::Skipped(SkipReason::NotConfigured);
            }
            Resolution::Excluded(reason) => {
                tracing::debug!(reason, "Client excluded, hit not sent");
                return SendOutcome::Skipped(SkipReason::ExcludedClient(reason));
            }
        };

        if seo_title && self.title.apply(&mut event, ctx) {
            tracing::debug!(title = ?event.title(), "Title set from SEO provider");
        }
        let event = self.commerce.enrich(event, ctx);

        self.deliver(ctx, event).await
    }

    async fn deliver(&self, ctx: &RequestContext, event: AnalyticsEvent) -> SendOutcome {
        let settings = ctx.settings_arc();

        if settings.delivery_mode == DeliveryMode::Detached {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let delivery = Arc::clone(&self.delivery);
                let client = ctx.client().clone();
                let timeout = Duration::from_secs(settings.timeout_secs);

                handle.spawn(async move {
                    let attempt = delivery.deliver(&event, &client, &settings);
                    match tokio::time::timeout(timeout, attempt).await {
                        Ok(result) => log_result(&event, &result),
                        Err(_) => tracing::warn!(
                            hit_type = event.hit_type(),
                            timeout_secs = timeout.as_secs(),
                            "Detached delivery timed out"
                        ),
                    }
                });
                return SendOutcome::Dispatched;
            }
            tracing::debug!("No tokio runtime for detached delivery, sending inline");
        }

        let result = self
            .delivery
            .deliver(&event, ctx.client(), &settings)
            .await;
        log_result(&event, &result);
        SendOutcome::Delivered(result)
    }
}

impl std::fmt::Debug for DispatchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchCoordinator")
            .field("title", &self.title)
            .field("commerce", &self.commerce)
            .finish_non_exhaustive()
    }
}

fn log_result(event: &AnalyticsEvent, result: &DeliveryResult) {
    if result.success {
        tracing::info!(
            hit_type = event.hit_type(),
            path = ?event.path(),
            status = ?result.status,
            response = %result.raw_response,
            "Hit sent"
        );
    } else {
        tracing::warn!(
            hit_type = event.hit_type(),
            path = ?event.path(),
            status = ?result.status,
            error = result.error_detail.as_deref().unwrap_or("unknown"),
            "Failed to send hit"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::context::ClientInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<AnalyticsEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl Deliver for Recorder {
        async fn deliver(
            &self,
            event: &AnalyticsEvent,
            _client: &ClientInfo,
            _settings: &Settings,
        ) -> DeliveryResult {
            self.events.lock().unwrap().push(event.clone());
            if self.fail {
                DeliveryResult::failed(Some(500), "", "API error (500)")
            } else {
                DeliveryResult::succeeded(200, "")
            }
        }
    }

    fn ready() -> Arc<Settings> {
        Arc::new(Settings {
            tracking_enabled: true,
            tracking_id: "UA-1-1".to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_failed_delivery_is_not_retried() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let coordinator = DispatchCoordinator::new(recorder.clone());
        let mut ctx = RequestContext::site(ready(), ClientInfo::default());

        let first = coordinator.send(&mut ctx).await;
        assert!(matches!(first, SendOutcome::Delivered(ref r) if !r.success));
        assert_eq!(
            coordinator.send(&mut ctx).await,
            SendOutcome::Skipped(SkipReason::AlreadySent)
        );
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_not_configured_still_claims_send() {
        let recorder = Arc::new(Recorder::default());
        let coordinator = DispatchCoordinator::new(recorder.clone());
        let mut ctx = RequestContext::site(Arc::new(Settings::default()), ClientInfo::default());

        assert_eq!(
            coordinator.send(&mut ctx).await,
            SendOutcome::Skipped(SkipReason::NotConfigured)
        );
        assert!(ctx.page_view_sent());
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_control_panel_request_skipped() {
        let recorder = Arc::new(Recorder::default());
        let coordinator = DispatchCoordinator::new(recorder.clone());
        let mut ctx =
            RequestContext::new(RequestKind::ControlPanel, ready(), ClientInfo::default());

        assert_eq!(
            coordinator.send(&mut ctx).await,
            SendOutcome::Skipped(SkipReason::InvalidInvocationContext(
                RequestKind::ControlPanel
            ))
        );
        assert!(!ctx.page_view_sent());
    }

    #[tokio::test]
    async fn test_detached_delivery() {
        let recorder = Arc::new(Recorder::default());
        let coordinator = DispatchCoordinator::new(recorder.clone());
        let settings = Arc::new(Settings {
            delivery_mode: DeliveryMode::Detached,
            ..(*ready()).clone()
        });
        let mut ctx = RequestContext::site(settings, ClientInfo::default());

        assert_eq!(coordinator.send(&mut ctx).await, SendOutcome::Dispatched);
        drop(ctx);

        for _ in 0..50 {
            if !recorder.events.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(recorder.events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_skip_reason_names() {
        assert_eq!(SkipReason::AlreadySent.as_str(), "already_sent");
        assert!(!SendOutcome::Skipped(SkipReason::NotConfigured).attempted());
        assert!(SendOutcome::Dispatched.attempted());
    }
}
