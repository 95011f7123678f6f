//! Form encoding of hits
//!
//! Produces Measurement Protocol v1 parameters. Only the fields pagehit
//! actually fills are emitted.

use crate::config::Settings;
use crate::context::ClientInfo;
use crate::types::{dimension_index, AnalyticsEvent};

/// Protocol version parameter
const PROTOCOL_VERSION: &str = "1";

/// Build the ordered parameter list for one hit.
///
/// `cache_buster` fills the `z` parameter; callers pass a fresh value per hit.
pub fn hit_params(
    event: &AnalyticsEvent,
    client: &ClientInfo,
    settings: &Settings,
    cache_buster: &str,
) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("v".into(), PROTOCOL_VERSION.into()),
        ("tid".into(), settings.tracking_id.trim().to_string()),
        ("cid".into(), client.client_id.clone()),
        ("t".into(), event.hit_type().into()),
    ];

    match event {
        AnalyticsEvent::PageView {
            title,
            path,
            custom_dimensions,
        } => {
            params.push(("dp".into(), document_path(path)));
            params.push(("dt".into(), title.clone()));
            for (key, value) in custom_dimensions {
                if let Some(index) = dimension_index(key) {
                    params.push((format!("cd{}", index), value.clone()));
                }
            }
        }
        AnalyticsEvent::CustomEvent {
            category,
            action,
            label,
            value,
        } => {
            params.push(("ec".into(), category.clone()));
            params.push(("ea".into(), action.clone()));
            if let Some(label) = label {
                params.push(("el".into(), label.clone()));
            }
            if let Some(value) = value {
                params.push(("ev".into(), value.to_string()));
            }
        }
    }

    push_opt(&mut params, "dh", client.host.as_deref());
    push_opt(&mut params, "dr", client.referrer.as_deref());
    push_opt(&mut params, "ua", client.user_agent.as_deref());
    push_opt(&mut params, "uip", client.ip.as_deref());
    params.push(("z".into(), cache_buster.to_string()));
    params
}

fn push_opt(params: &mut Vec<(String, String)>, key: &str, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        params.push((key.to_string(), value.to_string()));
    }
}

fn document_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
