//! HTTP surface: tracking routes and the page host
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /pagehit/pageViewTrack/:filename?url=&title=` | page view, then redirect or pixel |
//! | `GET /pagehit/eventTrack/:filename?url=&eventCategory=&eventAction=&eventLabel=&eventValue=` | custom event, then redirect or pixel |
//! | `GET /health` | liveness |
//! | anything else | page template host |
//!
//! Every request builds its own `RequestContext`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::header::{
    AsHeaderName, CACHE_CONTROL, CONTENT_TYPE, COOKIE, HOST, LOCATION, REFERER, USER_AGENT,
};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use pagehit_core::config::{Config, ServerConfig};
use pagehit_core::delivery::Deliver;
use pagehit_core::enrich::ConfiguredTitles;
use pagehit_core::lifecycle::RenderHooks;
use pagehit_core::{
    ClientInfo, CustomEventSpec, DispatchCoordinator, RequestContext, RequestKind, Settings,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::render::{render_page, resolve_template};

/// 1x1 transparent GIF
const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    coordinator: Arc<DispatchCoordinator>,
    hooks: RenderHooks,
    settings: Arc<Settings>,
    templates_dir: Arc<PathBuf>,
    cp_trigger: Arc<str>,
}

impl AppState {
    /// Build state from configuration, delivering hits through `delivery`.
    pub fn new(config: &Config, delivery: Arc<dyn Deliver>) -> Self {
        let coordinator = Arc::new(
            DispatchCoordinator::new(delivery)
                .with_title_provider(Arc::new(ConfiguredTitles::from_config(&config.seo))),
        );

        // The coordinator is the only render subscriber for now
        let mut hooks = RenderHooks::new();
        hooks.subscribe(coordinator.clone());

        Self::from_parts(coordinator, hooks, config.tracking.clone(), &config.server)
    }

    fn from_parts(
        coordinator: Arc<DispatchCoordinator>,
        hooks: RenderHooks,
        settings: Settings,
        server: &ServerConfig,
    ) -> Self {
        Self {
            coordinator,
            hooks,
            settings: Arc::new(settings),
            templates_dir: Arc::new(server.templates_dir.clone()),
            cp_trigger: Arc::from(server.cp_trigger.trim_matches('/')),
        }
    }

    fn request_kind(&self, path: &str) -> RequestKind {
        let first = path.trim_start_matches('/').split('/').next().unwrap_or("");
        if !self.cp_trigger.is_empty() && first == &*self.cp_trigger {
            RequestKind::ControlPanel
        } else {
            RequestKind::Site
        }
    }

    fn context(&self, kind: RequestKind, client: ClientInfo) -> RequestContext {
        RequestContext::new(kind, Arc::clone(&self.settings), client)
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pagehit/pageViewTrack", get(track_page_view))
        .route("/pagehit/pageViewTrack/:filename", get(track_page_view_file))
        .route("/pagehit/eventTrack", get(track_event))
        .route("/pagehit/eventTrack/:filename", get(track_event_file))
        .fallback(serve_page)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

#[derive(Debug, Deserialize)]
struct PageViewQuery {
    url: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventQuery {
    url: Option<String>,
    event_category: Option<String>,
    event_action: Option<String>,
    event_label: Option<String>,
    event_value: Option<String>,
}

async fn track_page_view_file(
    state: State<AppState>,
    Path(_filename): Path<String>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    query: Query<PageViewQuery>,
) -> Response {
    track_page_view(state, connect, headers, query).await
}

async fn track_page_view(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<PageViewQuery>,
) -> Response {
    let target = query.url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let (path, host) = match target {
        Some(url) => split_url(url),
        None => ("/".to_string(), None),
    };

    let client = client_info(&headers, connect.map(|c| c.0))
        .with_host(host.or_else(|| header_str(&headers, HOST)));
    let mut ctx = state.context(RequestKind::Site, client);
    let outcome = state
        .coordinator
        .send_page_view(&mut ctx, &path, query.title.as_deref())
        .await;
    tracing::debug!(path = %path, outcome = ?outcome, "Page view track request");

    redirect_or_pixel(target)
}

async fn track_event_file(
    state: State<AppState>,
    Path(_filename): Path<String>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    query: Query<EventQuery>,
) -> Response {
    track_event(state, connect, headers, query).await
}

async fn track_event(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<EventQuery>,
) -> Response {
    let target = query.url.as_deref().map(str::trim).filter(|u| !u.is_empty());
    let category = query.event_category.unwrap_or_default();
    let action = query.event_action.unwrap_or_default();

    if category.trim().is_empty() || action.trim().is_empty() {
        tracing::debug!("Event track request without category or action, hit not sent");
        return redirect_or_pixel(target);
    }

    let spec = CustomEventSpec {
        category,
        action,
        label: query.event_label,
        value: query.event_value.as_deref().and_then(parse_event_value),
    };
    let host = target.and_then(|url| split_url(url).1);
    let client = client_info(&headers, connect.map(|c| c.0))
        .with_host(host.or_else(|| header_str(&headers, HOST)));
    let mut ctx = state.context(RequestKind::Site, client);
    let outcome = state.coordinator.send_event(&mut ctx, &spec).await;
    tracing::debug!(
        category = %spec.category,
        action = %spec.action,
        outcome = ?outcome,
        "Event track request"
    );

    redirect_or_pixel(target)
}

async fn serve_page(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let path = uri.path();
    let Some(template) = resolve_template(&state.templates_dir, path).await else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };

    let source = match tokio::fs::read_to_string(&template.file).await {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(file = %template.file.display(), error = %e, "Failed to read template");
            return (StatusCode::INTERNAL_SERVER_ERROR, "template error").into_response();
        }
    };

    let client = client_info(&headers, connect.map(|c| c.0))
        .with_host(header_str(&headers, HOST))
        .with_path(path);
    let mut ctx = state.context(state.request_kind(path), client);

    let html = render_page(&state.hooks, &mut ctx, &template.id, &source).await;
    Html(html).into_response()
}

/// Lenient `eventValue`: blank or non-numeric values are dropped
fn parse_event_value(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}

/// Collect visitor metadata from request headers
fn client_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientInfo {
    let ip = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()));
    let ga_cookie = ga_cookie(headers);

    ClientInfo::for_request(ga_cookie.as_deref(), header_str(headers, USER_AGENT), ip)
        .with_referrer(header_str(headers, REFERER))
}

fn header_str<K: AsHeaderName>(headers: &HeaderMap, key: K) -> Option<String> {
    headers
        .get(key)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn ga_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "_ga")
        .map(|(_, value)| value.to_string())
}

/// Split a tracked URL into its path (plus query) and host
fn split_url(url: &str) -> (String, Option<String>) {
    match url.parse::<Uri>() {
        Ok(uri) => {
            let path = uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| "/".to_string());
            (path, uri.host().map(str::to_string))
        }
        Err(_) => (url.to_string(), None),
    }
}

/// Only plain web URLs and site-relative paths are followed
fn is_redirect_target(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://")
        || lower.starts_with("https://")
        || (url.starts_with('/') && !url.starts_with("//"))
}

fn redirect_or_pixel(target: Option<&str>) -> Response {
    match target {
        Some(url) if is_redirect_target(url) => {
            (StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response()
        }
        _ => (
            StatusCode::OK,
            [
                (CONTENT_TYPE, "image/gif"),
                (CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            ],
            PIXEL_GIF,
        )
            .into_response(),
    }
}
