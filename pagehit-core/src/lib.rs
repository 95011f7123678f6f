//! # pagehit-core
//!
//! Core library for pagehit - one analytics hit per rendered page.
//!
//! This library provides:
//! - Per-request dispatch state ([`RequestContext`])
//! - The [`DispatchCoordinator`] guaranteeing at most one hit per request
//! - Event resolution, optional title and commerce enrichment
//! - Delivery to a Measurement-Protocol style collection endpoint
//! - Render lifecycle hooks for the host page renderer
//! - Configuration management and logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pagehit_core::delivery::CollectClient;
//! use pagehit_core::{ClientInfo, Config, DispatchCoordinator, RequestContext};
//!
//! # async fn run() -> pagehit_core::Result<()> {
//! let config = Config::load()?;
//! let settings = Arc::new(config.tracking);
//! let coordinator = DispatchCoordinator::new(Arc::new(CollectClient::new()?));
//!
//! let mut ctx = RequestContext::site(settings, ClientInfo::for_request(None, None, None));
//! coordinator.on_template_will_render(&mut ctx, "home");
//! coordinator.on_template_did_render(&mut ctx).await;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use config::{Config, Settings};
pub use context::{ClientInfo, DispatchState, RequestContext};
pub use coordinator::{DispatchCoordinator, SendOutcome, SkipReason};
pub use error::{Error, Result};
pub use types::*;

// Public modules
pub mod config;
pub mod context;
pub mod coordinator;
pub mod delivery;
pub mod enrich;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod resolver;
pub mod types;
