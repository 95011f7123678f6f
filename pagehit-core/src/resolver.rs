//! Event payload resolution
//!
//! Turns what is known about a request (template, explicit hit parameters,
//! settings) into an [`AnalyticsEvent`]. Never performs I/O.

use crate::context::RequestContext;
use crate::types::{AnalyticsEvent, CustomEventSpec};

/// Template file extensions stripped when deriving a page path
const TEMPLATE_EXTENSIONS: &[&str] = &[".twig", ".html", ".htm"];

/// Lowercase user agent fragments treated as crawlers
///
/// `bot` only counts as a product token (`Googlebot/2.1`, `...bot;`,
/// `...bot)`), so device names like `Cubot` pass.
const BOT_USER_AGENT_MARKERS: &[&str] = &[
    "bot/",
    "bot;",
    "bot)",
    "crawler",
    "spider",
    "slurp",
    "facebookexternalhit",
    "headlesschrome",
    "lighthouse",
    "curl/",
    "wget/",
];

/// Result of resolving a request into an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A hit should be sent with this event
    Event(AnalyticsEvent),
    /// Tracking is disabled or no tracking id is configured
    NotConfigured,
    /// The visitor is excluded from tracking
    Excluded(&'static str),
}

/// Builds events from request state and settings.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventResolver;

impl EventResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the default page view for the template currently rendering.
    pub fn resolve(&self, ctx: &RequestContext) -> Resolution {
        let path = match ctx.current_template() {
            Some(template) => path_for_template(template),
            None => ctx
                .client()
                .path
                .as_deref()
                .map(normalize_path)
                .unwrap_or_else(|| "/".to_string()),
        };
        self.resolve_page_view(ctx, &path, None)
    }

    /// Resolve a page view for an explicit path and optional title.
    ///
    /// Without a title the path doubles as the title.
    pub fn resolve_page_view(
        &self,
        ctx: &RequestContext,
        path: &str,
        title: Option<&str>,
    ) -> Resolution {
        if let Some(inactive) = check_active(ctx) {
            return inactive;
        }

        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(path)
            .to_string();

        Resolution::Event(AnalyticsEvent::PageView {
            title,
            path: path.to_string(),
            custom_dimensions: ctx.settings().custom_dimensions.clone(),
        })
    }

    /// Resolve a custom event.
    pub fn resolve_event(&self, ctx: &RequestContext, spec: &CustomEventSpec) -> Resolution {
        if let Some(inactive) = check_active(ctx) {
            return inactive;
        }

        Resolution::Event(AnalyticsEvent::CustomEvent {
            category: spec.category.clone(),
            action: spec.action.clone(),
            label: spec.label.clone().filter(|l| !l.is_empty()),
            value: spec.value,
        })
    }
}

fn check_active(ctx: &RequestContext) -> Option<Resolution> {
    let settings = ctx.settings();
    if !settings.is_ready() {
        return Some(Resolution::NotConfigured);
    }
    if settings.filter_bot_user_agents {
        if let Some(ua) = ctx.client().user_agent.as_deref() {
            if is_bot_user_agent(ua) {
                return Some(Resolution::Excluded("bot user agent"));
            }
        }
    }
    None
}

/// Derive a logical page path from a template identifier.
///
/// `"home"` stays `"home"`, `"/blog/_entry.twig"` becomes `"blog/_entry"`.
/// An empty identifier maps to `"/"`.
pub fn path_for_template(template_id: &str) -> String {
    let mut path = template_id.trim().trim_matches('/');
    for ext in TEMPLATE_EXTENSIONS {
        if let Some(stripped) = path.strip_suffix(ext) {
            path = stripped;
            break;
        }
    }
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

fn normalize_path(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// Check a user agent against the crawler markers
pub fn is_bot_user_agent(user_agent: &str) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    BOT_USER_AGENT_MARKERS.iter().any(|marker| ua.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::context::ClientInfo;
    use std::sync::Arc;

    fn ready_settings() -> Settings {
        let mut settings = Settings {
            tracking_enabled: true,
            tracking_id: "UA-1-1".to_string(),
            ..Default::default()
        };
        settings
            .custom_dimensions
            .insert("1".to_string(), "member".to_string());
        settings
    }

    fn ctx_with(settings: Settings, client: ClientInfo) -> RequestContext {
        RequestContext::site(Arc::new(settings), client)
    }

    #[test]
    fn test_path_for_template() {
        assert_eq!(path_for_template("home"), "home");
        assert_eq!(path_for_template("/blog/_entry.twig"), "blog/_entry");
        assert_eq!(path_for_template("about.html"), "about");
        assert_eq!(path_for_template(""), "/");
        assert_eq!(path_for_template("/"), "/");
    }

    #[test]
    fn test_resolve_uses_current_template() {
        let mut ctx = ctx_with(ready_settings(), ClientInfo::default());
        ctx.set_current_template("home");

        match EventResolver::new().resolve(&ctx) {
            Resolution::Event(AnalyticsEvent::PageView {
                title,
                path,
                custom_dimensions,
            }) => {
                assert_eq!(path, "home");
                assert_eq!(title, "home");
                assert_eq!(custom_dimensions["1"], "member");
            }
            other => panic!("expected page view, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_falls_back_to_request_path() {
        let ctx = ctx_with(
            ready_settings(),
            ClientInfo::default().with_path("news/latest"),
        );
        let resolution = EventResolver::new().resolve(&ctx);
        let Resolution::Event(event) = resolution else {
            panic!("expected event");
        };
        assert_eq!(event.path(), Some("/news/latest"));

        let ctx = ctx_with(ready_settings(), ClientInfo::default());
        let Resolution::Event(event) = EventResolver::new().resolve(&ctx) else {
            panic!("expected event");
        };
        assert_eq!(event.path(), Some("/"));
    }

    #[test]
    fn test_not_configured() {
        let ctx = ctx_with(Settings::default(), ClientInfo::default());
        assert_eq!(EventResolver::new().resolve(&ctx), Resolution::NotConfigured);

        let settings = Settings {
            tracking_enabled: true,
            ..Default::default()
        };
        let ctx = ctx_with(settings, ClientInfo::default());
        let spec = CustomEventSpec {
            category: "c".to_string(),
            action: "a".to_string(),
            ..Default::default()
        };
        assert_eq!(
            EventResolver::new().resolve_event(&ctx, &spec),
            Resolution::NotConfigured
        );
    }

    #[test]
    fn test_bot_user_agents_excluded() {
        let client = ClientInfo::for_request(None, Some("Googlebot/2.1".to_string()), None);
        let ctx = ctx_with(ready_settings(), client.clone());
        assert!(matches!(
            EventResolver::new().resolve(&ctx),
            Resolution::Excluded(_)
        ));

        let settings = Settings {
            filter_bot_user_agents: false,
            ..ready_settings()
        };
        let ctx = ctx_with(settings, client);
        assert!(matches!(
            EventResolver::new().resolve(&ctx),
            Resolution::Event(_)
        ));
    }

    #[test]
    fn test_resolve_page_view_title() {
        let ctx = ctx_with(ready_settings(), ClientInfo::default());
        let resolver = EventResolver::new();

        let Resolution::Event(event) = resolver.resolve_page_view(&ctx, "/file.pdf", Some("Brochure"))
        else {
            panic!("expected event");
        };
        assert_eq!(event.title(), Some("Brochure"));

        let Resolution::Event(event) = resolver.resolve_page_view(&ctx, "/file.pdf", Some("  "))
        else {
            panic!("expected event");
        };
        assert_eq!(event.title(), Some("/file.pdf"));
    }

    #[test]
    fn test_resolve_event_drops_empty_label() {
        let ctx = ctx_with(ready_settings(), ClientInfo::default());
        let spec = CustomEventSpec {
            category: "newsletter".to_string(),
            action: "open".to_string(),
            label: Some(String::new()),
            value: Some(3),
        };
        assert_eq!(
            EventResolver::new().resolve_event(&ctx, &spec),
            Resolution::Event(AnalyticsEvent::CustomEvent {
                category: "newsletter".to_string(),
                action: "open".to_string(),
                label: None,
                value: Some(3),
            })
        );
    }

    #[test]
    fn test_is_bot_user_agent() {
        assert!(is_bot_user_agent("Mozilla/5.0 (compatible; bingbot/2.0)"));
        assert!(is_bot_user_agent("curl/8.1.2"));
        assert!(!is_bot_user_agent(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0) AppleWebKit/605.1.15"
        ));
    }

    #[test]
    fn test_bot_marker_needs_token_boundary() {
        assert!(is_bot_user_agent("Mozilla/5.0 (compatible; Googlebot/2.1)"));
        assert!(is_bot_user_agent("Mozilla/5.0 (compatible; YandexBot)"));
        assert!(is_bot_user_agent("DuckDuckBot; +https://duckduckgo.com"));
        assert!(!is_bot_user_agent(
            "Mozilla/5.0 (Linux; Android 10; Cubot X30) AppleWebKit/537.36 Chrome/120.0 Mobile"
        ));
    }
}
