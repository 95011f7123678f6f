//! HTTP client for the analytics collection endpoint
//!
//! Posts one form-encoded hit per call. The endpoint and timeout come from
//! the request's settings snapshot, so a single client serves every request.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::config::Settings;
use crate::context::ClientInfo;
use crate::error::Result;
use crate::types::{AnalyticsEvent, DeliveryResult};

use super::payload::hit_params;
use super::Deliver;

/// HTTP client for the collection endpoint
#[derive(Debug, Clone)]
pub struct CollectClient {
    http_client: reqwest::Client,
}

impl CollectClient {
    /// Create a new client
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("pagehit/", env!("CARGO_PKG_VERSION"))),
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl Deliver for CollectClient {
    async fn deliver(
        &self,
        event: &AnalyticsEvent,
        client: &ClientInfo,
        settings: &Settings,
    ) -> DeliveryResult {
        let cache_buster = chrono::Utc::now().timestamp_millis().to_string();
        let params = hit_params(event, client, settings, &cache_buster);

        let response = match self
            .http_client
            .post(&settings.endpoint_url)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .form(&params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                return DeliveryResult::failed(None, "", format!("HTTP request failed: {}", e))
            }
        };

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown".to_string());

        if status.is_success() {
            DeliveryResult::succeeded(status.as_u16(), body)
        } else {
            let detail = format!("API error ({}): {}", status, body);
            DeliveryResult::failed(Some(status.as_u16()), body, detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds() {
        assert!(CollectClient::new().is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_without_panicking() {
        let client = CollectClient::new().unwrap();
        let settings = Settings {
            tracking_enabled: true,
            tracking_id: "UA-1-1".to_string(),
            endpoint_url: "http://127.0.0.1:9/collect".to_string(),
            timeout_secs: 1,
            ..Default::default()
        };
        let event = AnalyticsEvent::CustomEvent {
            category: "c".to_string(),
            action: "a".to_string(),
            label: None,
            value: None,
        };

        let result = client
            .deliver(&event, &ClientInfo::default(), &settings)
            .await;
        assert!(!result.success);
        assert!(result.error_detail.is_some());
        assert!(result.status.is_none());
    }
}
