//! Optional enrichment collaborators
//!
//! Enrichment adapters wrap an optional provider. A missing or inactive
//! provider is a normal state: the adapter yields `None` (titles) or hands
//! the event back untouched (commerce).
//!
//! ## Providers
//!
//! | Trait | Adapter | Built-in provider |
//! |-------|---------|-------------------|
//! | [`TitleProvider`] | [`TitleEnrichment`] | [`ConfiguredTitles`] |
//! | [`CommerceProvider`] | [`CommerceEnrichment`] | none |

use crate::config::SeoConfig;
use crate::context::RequestContext;
use crate::resolver::path_for_template;
use crate::types::AnalyticsEvent;
use std::collections::HashMap;
use std::sync::Arc;

/// SEO layer able to compute the title of the page being rendered.
pub trait TitleProvider: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &str;

    /// Whether the SEO layer is currently rendering titles
    fn is_active(&self) -> bool;

    /// Title computed for the current request, if any
    fn resolved_title(&self, ctx: &RequestContext) -> Option<String>;
}

/// E-commerce layer able to attach order or product data to an event.
///
/// No commerce fields are defined yet. Implementations receive the event
/// and return it, possibly modified.
pub trait CommerceProvider: Send + Sync {
    /// Short name for logging
    fn name(&self) -> &str;

    fn enrich(&self, event: AnalyticsEvent, ctx: &RequestContext) -> AnalyticsEvent;
}

/// Title override adapter
#[derive(Clone, Default)]
pub struct TitleEnrichment {
    provider: Option<Arc<dyn TitleProvider>>,
}

impl TitleEnrichment {
    /// Adapter with no SEO layer installed
    pub fn absent() -> Self {
        Self { provider: None }
    }

    pub fn with_provider(provider: Arc<dyn TitleProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.provider.is_some()
    }

    /// Title to use instead of the default one.
    ///
    /// `None` when no provider is installed, the provider is inactive, or it
    /// produced an empty title.
    pub fn resolve_title(&self, ctx: &RequestContext) -> Option<String> {
        let provider = self.provider.as_ref()?;
        if !provider.is_active() {
            tracing::trace!(provider = provider.name(), "Title provider inactive");
            return None;
        }
        provider
            .resolved_title(ctx)
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
    }

    /// Overwrite the event title when a non-empty title is available.
    pub fn apply(&self, event: &mut AnalyticsEvent, ctx: &RequestContext) -> bool {
        match self.resolve_title(ctx) {
            Some(title) => event.set_title(title),
            None => false,
        }
    }
}

impl std::fmt::Debug for TitleEnrichment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleEnrichment")
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .finish()
    }
}

/// Commerce data adapter
#[derive(Clone, Default)]
pub struct CommerceEnrichment {
    provider: Option<Arc<dyn CommerceProvider>>,
}

impl CommerceEnrichment {
    /// Adapter with no commerce layer installed
    pub fn absent() -> Self {
        Self { provider: None }
    }

    pub fn with_provider(provider: Arc<dyn CommerceProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.provider.is_some()
    }

    /// Pass the event through the commerce provider, if installed.
    pub fn enrich(&self, event: AnalyticsEvent, ctx: &RequestContext) -> AnalyticsEvent {
        match &self.provider {
            Some(provider) => provider.enrich(event, ctx),
            None => event,
        }
    }
}

impl std::fmt::Debug for CommerceEnrichment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceEnrichment")
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .finish()
    }
}

/// Title provider backed by the `[seo]` config section.
///
/// Looks up the current template (by id, then by derived path) in the
/// configured title table and appends the site name when set.
#[derive(Debug, Clone)]
pub struct ConfiguredTitles {
    render_enabled: bool,
    site_name: Option<String>,
    separator: String,
    titles: HashMap<String, String>,
}

impl ConfiguredTitles {
    pub fn from_config(config: &SeoConfig) -> Self {
        Self {
            render_enabled: config.render_enabled,
            site_name: config.site_name.clone().filter(|s| !s.trim().is_empty()),
            separator: config.separator.clone(),
            titles: config.titles.clone(),
        }
    }

    fn page_title(&self, template: &str) -> Option<&str> {
        self.titles
            .get(template)
            .or_else(|| self.titles.get(&path_for_template(template)))
            .map(String::as_str)
    }
}

impl TitleProvider for ConfiguredTitles {
    fn name(&self) -> &str {
        "configured-titles"
    }

    fn is_active(&self) -> bool {
        self.render_enabled
    }

    fn resolved_title(&self, ctx: &RequestContext) -> Option<String> {
        let page = ctx
            .current_template()
            .and_then(|template| self.page_title(template));

        match (page, self.site_name.as_deref()) {
            (Some(page), Some(site)) => Some(format!("{}{}{}", page, self.separator, site)),
            (Some(page), None) => Some(page.to_string()),
            (None, Some(site)) => Some(site.to_string()),
            (None, None) => None,
        }
    }
}
