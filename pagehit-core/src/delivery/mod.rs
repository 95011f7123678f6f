//! Delivery of hits to the analytics collection endpoint
//!
//! ## Architecture
//!
//! Delivery is fire-and-forget:
//! - Exactly one HTTP request per hit, no retries and no backoff
//! - Failures are reported as a [`DeliveryResult`] and logged by the caller
//! - Nothing here can fail the page request that produced the hit
//!
//! ## Usage
//!
//! Configure the endpoint in `~/.config/pagehit/config.toml`:
//!
//! ```toml
//! [tracking]
//! tracking_enabled = true
//! tracking_id = "UA-12345-1"
//! endpoint_url = "https://www.google-analytics.com/collect"
//! timeout_secs = 5
//! ```

mod client;
mod payload;

pub use client::CollectClient;
pub use payload::hit_params;

use async_trait::async_trait;

use crate::config::Settings;
use crate::context::ClientInfo;
use crate::types::{AnalyticsEvent, DeliveryResult};

/// Sends a finished event to the collection endpoint.
///
/// Implementations must not retry: the coordinator calls this at most once
/// per request and relies on that.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(
        &self,
        event: &AnalyticsEvent,
        client: &ClientInfo,
        settings: &Settings,
    ) -> DeliveryResult;
}
