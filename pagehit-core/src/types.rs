//! Core domain types for pagehit
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Hit** | One request to the analytics collection endpoint |
//! | **Event** | The structured payload of a hit: a page view or a custom event |
//! | **Request context** | Per-request state guarding the one-hit-per-request rule |
//! | **Dimension** | A numbered custom value attached to page views (`cd1`..`cd200`) |

use serde::Serialize;
use std::collections::BTreeMap;

/// Highest custom dimension index accepted by the collection endpoint
pub const MAX_DIMENSION_INDEX: u16 = 200;

// ============================================
// Events
// ============================================

/// Structured payload of a single hit.
///
/// Built by the [`EventResolver`](crate::resolver::EventResolver) and
/// adjusted by enrichment adapters before it is handed to delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    /// A page view
    PageView {
        /// Document title
        title: String,
        /// Logical page path
        path: String,
        /// Custom dimensions keyed by index
        custom_dimensions: BTreeMap<String, String>,
    },
    /// A custom interaction event
    CustomEvent {
        category: String,
        action: String,
        label: Option<String>,
        value: Option<i64>,
    },
}

impl AnalyticsEvent {
    /// Hit type name used on the wire
    pub fn hit_type(&self) -> &'static str {
        match self {
            AnalyticsEvent::PageView { .. } => "pageview",
            AnalyticsEvent::CustomEvent { .. } => "event",
        }
    }

    /// Title of a page view, `None` for custom events
    pub fn title(&self) -> Option<&str> {
        match self {
            AnalyticsEvent::PageView { title, .. } => Some(title),
            AnalyticsEvent::CustomEvent { .. } => None,
        }
    }

    /// Path of a page view, `None` for custom events
    pub fn path(&self) -> Option<&str> {
        match self {
            AnalyticsEvent::PageView { path, .. } => Some(path),
            AnalyticsEvent::CustomEvent { .. } => None,
        }
    }

    /// Replace the title of a page view.
    ///
    /// Returns false (and leaves the event alone) for custom events.
    pub fn set_title(&mut self, new_title: impl Into<String>) -> bool {
        match self {
            AnalyticsEvent::PageView { title, .. } => {
                *title = new_title.into();
                true
            }
            AnalyticsEvent::CustomEvent { .. } => false,
        }
    }
}

/// Parameters for an explicitly requested custom event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomEventSpec {
    pub category: String,
    pub action: String,
    pub label: Option<String>,
    pub value: Option<i64>,
}

// ============================================
// Requests
// ============================================

/// Kind of request the coordinator is running in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Public-facing site request
    Site,
    /// Control panel (admin) request
    ControlPanel,
    /// Console or background invocation
    Console,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Site => "site",
            RequestKind::ControlPanel => "control_panel",
            RequestKind::Console => "console",
        }
    }

    /// Only public site requests may produce hits
    pub fn is_site(&self) -> bool {
        matches!(self, RequestKind::Site)
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Delivery
// ============================================

/// Outcome of one call to the collection endpoint.
///
/// Only ever logged. It never changes whether a request counts as sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// True for a 2xx response
    pub success: bool,
    /// Response body (empty on transport failure)
    pub raw_response: String,
    /// What went wrong, when `success` is false
    pub error_detail: Option<String>,
    /// HTTP status, when a response arrived
    pub status: Option<u16>,
}

impl DeliveryResult {
    pub fn succeeded(status: u16, raw_response: impl Into<String>) -> Self {
        Self {
            success: true,
            raw_response: raw_response.into(),
            error_detail: None,
            status: Some(status),
        }
    }

    pub fn failed(
        status: Option<u16>,
        raw_response: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            raw_response: raw_response.into(),
            error_detail: Some(detail.into()),
            status,
        }
    }
}

/// Parse a custom dimension key (`"3"` or `"cd3"`) into its index.
///
/// Returns `None` for anything outside `1..=200` and for non-canonical
/// spellings (`"05"`, `"+5"`), so each index has exactly one key.
pub fn dimension_index(key: &str) -> Option<u16> {
    let digits = key.strip_prefix("cd").unwrap_or(key);
    if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<u16>() {
        Ok(index) if (1..=MAX_DIMENSION_INDEX).contains(&index) => Some(index),
        _ => None,
    }
}
