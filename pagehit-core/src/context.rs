//! Per-request dispatch state
//!
//! A [`RequestContext`] is created when a request starts and dropped when it
//! ends. It is the only place the "current template" and "already sent"
//! markers live, so concurrent requests cannot see each other's state.

use crate::config::Settings;
use crate::types::RequestKind;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Where the coordinator is in its per-request state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Nothing recorded yet
    Idle,
    /// A page template is rendering
    TemplateKnown,
    /// A hit was attempted; terminal for this request
    Sent,
}

/// Visitor metadata attached to every hit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// Anonymous client id (`cid`)
    pub client_id: String,
    pub user_agent: Option<String>,
    pub ip: Option<String>,
    pub referrer: Option<String>,
    /// Host name the request was addressed to
    pub host: Option<String>,
    /// Request path, used when no template is known
    pub path: Option<String>,
}

impl ClientInfo {
    /// Build client info for an incoming request.
    ///
    /// The client id comes from the `_ga` cookie when present. Otherwise it
    /// is a hash of IP and user agent, so repeated pixel loads from the same
    /// mail client share an id. With neither available a random id is used.
    pub fn for_request(
        ga_cookie: Option<&str>,
        user_agent: Option<String>,
        ip: Option<String>,
    ) -> Self {
        let client_id = ga_cookie
            .and_then(client_id_from_ga_cookie)
            .or_else(|| hashed_client_id(ip.as_deref(), user_agent.as_deref()))
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        Self {
            client_id,
            user_agent,
            ip,
            ..Default::default()
        }
    }

    pub fn with_referrer(mut self, referrer: Option<String>) -> Self {
        self.referrer = referrer;
        self
    }

    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Extract the client id from a `_ga` cookie value.
///
/// `GA1.2.1234567890.1600000000` yields `1234567890.1600000000`.
pub fn client_id_from_ga_cookie(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.trim().split('.').collect();
    if parts.len() < 4 || !parts[0].starts_with("GA") {
        return None;
    }
    let id = parts[parts.len() - 2..].join(".");
    if id.chars().all(|c| c.is_ascii_digit() || c == '.') {
        Some(id)
    } else {
        None
    }
}

fn hashed_client_id(ip: Option<&str>, user_agent: Option<&str>) -> Option<String> {
    if ip.is_none() && user_agent.is_none() {
        return None;
    }
    let mut hasher = Sha256::new();
    hasher.update(ip.unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.unwrap_or_default().as_bytes());
    let digest = hex::encode(hasher.finalize());
    Some(digest[..32].to_string())
}

/// Per-request state owned by the host for the lifetime of one request
#[derive(Debug)]
pub struct RequestContext {
    kind: RequestKind,
    settings: Arc<Settings>,
    client: ClientInfo,
    current_template: Option<String>,
    page_view_sent: bool,
}

impl RequestContext {
    pub fn new(kind: RequestKind, settings: Arc<Settings>, client: ClientInfo) -> Self {
        Self {
            kind,
            settings,
            client,
            current_template: None,
            page_view_sent: false,
        }
    }

    /// Context for a public site request
    pub fn site(settings: Arc<Settings>, client: ClientInfo) -> Self {
        Self::new(RequestKind::Site, settings, client)
    }

    /// Context for console or background work
    pub fn console(settings: Arc<Settings>) -> Self {
        Self::new(RequestKind::Console, settings, ClientInfo::default())
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Settings snapshot taken when the request started
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn settings_arc(&self) -> Arc<Settings> {
        Arc::clone(&self.settings)
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    pub fn current_template(&self) -> Option<&str> {
        self.current_template.as_deref()
    }

    pub fn page_view_sent(&self) -> bool {
        self.page_view_sent
    }

    pub fn state(&self) -> DispatchState {
        if self.page_view_sent {
            DispatchState::Sent
        } else if self.current_template.is_some() {
            DispatchState::TemplateKnown
        } else {
            DispatchState::Idle
        }
    }

    pub(crate) fn set_current_template(&mut self, template_id: impl Into<String>) {
        self.current_template = Some(template_id.into());
    }

    /// Claim the single send for this request.
    ///
    /// Returns false if it was already claimed.
    pub(crate) fn claim_send(&mut self) -> bool {
        !std::mem::replace(&mut self.page_view_sent, true)
    }
}
