//! Minimal page template host
//!
//! Maps request paths to HTML files under the templates directory and
//! drives the render lifecycle around them:
//!
//! 1. `WillRender { template }` before the file is processed
//! 2. `Hook { name }` for each `{% hook name %}` marker, which is removed
//! 3. `DidRender` once the output is complete

use pagehit_core::lifecycle::{RenderEvent, RenderHooks};
use pagehit_core::RequestContext;
use std::path::{Path, PathBuf};

const HOOK_OPEN: &str = "{% hook ";
const HOOK_CLOSE: &str = "%}";

/// Template resolved for a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplate {
    /// Template id reported to the lifecycle (path without extension)
    pub id: String,
    pub file: PathBuf,
}

/// Resolve a request path to a template file.
///
/// `/` maps to `index.html`, `/blog/post` to `blog/post.html` or
/// `blog/post/index.html`. Returns `None` for missing files and for paths
/// that try to leave the templates directory.
pub async fn resolve_template(
    templates_dir: &Path,
    request_path: &str,
) -> Option<PageTemplate> {
    let trimmed = request_path.trim_matches('/');
    if trimmed
        .split('/')
        .any(|segment| segment == ".." || segment == "." || segment.starts_with('_'))
    {
        return None;
    }

    let candidates = if trimmed.is_empty() {
        vec![("index".to_string(), templates_dir.join("index.html"))]
    } else {
        vec![
            (
                trimmed.to_string(),
                templates_dir.join(format!("{}.html", trimmed)),
            ),
            (
                format!("{}/index", trimmed),
                templates_dir.join(trimmed).join("index.html"),
            ),
        ]
    };

    for (id, file) in candidates {
        if is_file(&file).await {
            return Some(PageTemplate { id, file });
        }
    }
    None
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Render template source, emitting lifecycle events for this request.
pub async fn render_page(
    hooks: &RenderHooks,
    ctx: &mut RequestContext,
    template_id: &str,
    source: &str,
) -> String {
    hooks
        .emit(ctx, RenderEvent::WillRender { template: template_id })
        .await;

    let mut output = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find(HOOK_OPEN) {
        let after_open = &rest[start + HOOK_OPEN.len()..];
        let Some(end) = after_open.find(HOOK_CLOSE) else {
            break;
        };
        output.push_str(&rest[..start]);
        let name = after_open[..end].trim().trim_matches(|c| c == '"' || c == '\'');
        hooks.emit(ctx, RenderEvent::Hook { name }).await;
        rest = &after_open[end + HOOK_CLOSE.len()..];
    }
    output.push_str(rest);

    hooks.emit(ctx, RenderEvent::DidRender).await;
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pagehit_core::lifecycle::RenderSubscriber;
    use pagehit_core::{ClientInfo, Settings};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct EventLog {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RenderSubscriber for EventLog {
        async fn on_render_event(&self, _ctx: &mut RequestContext, event: RenderEvent<'_>) {
            let entry = match event {
                RenderEvent::WillRender { template } => format!("will:{}", template),
                RenderEvent::Hook { name } => format!("hook:{}", name),
                RenderEvent::DidRender => "did".to_string(),
            };
            self.seen.lock().unwrap().push(entry);
        }
    }

    #[tokio::test]
    async fn test_resolve_template() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "home").unwrap();
        std::fs::create_dir_all(dir.path().join("blog")).unwrap();
        std::fs::write(dir.path().join("blog/index.html"), "blog").unwrap();
        std::fs::write(dir.path().join("about.html"), "about").unwrap();

        assert_eq!(resolve_template(dir.path(), "/").await.unwrap().id, "index");
        assert_eq!(resolve_template(dir.path(), "/about").await.unwrap().id, "about");
        assert_eq!(resolve_template(dir.path(), "/blog/").await.unwrap().id, "blog/index");
        assert!(resolve_template(dir.path(), "/missing").await.is_none());
        assert!(resolve_template(dir.path(), "/../etc/passwd").await.is_none());
        assert!(resolve_template(dir.path(), "/_partials/nav").await.is_none());
    }

    #[tokio::test]
    async fn test_render_page_emits_lifecycle_in_order() {
        let log = Arc::new(EventLog::default());
        let mut hooks = RenderHooks::new();
        hooks.subscribe(log.clone());
        let mut ctx = RequestContext::site(Arc::new(Settings::default()), ClientInfo::default());

        let html = render_page(
            &hooks,
            &mut ctx,
            "home",
            "<p>a</p>{% hook pagehitSendPageView %}<p>b</p>{% hook 'other' %}",
        )
        .await;

        assert_eq!(html, "<p>a</p><p>b</p>");
        assert_eq!(
            *log.seen.lock().unwrap(),
            vec![
                "will:home".to_string(),
                "hook:pagehitSendPageView".to_string(),
                "hook:other".to_string(),
                "did".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_unterminated_hook_left_as_text() {
        let hooks = RenderHooks::new();
        let mut ctx = RequestContext::site(Arc::new(Settings::default()), ClientInfo::default());

        let html = render_page(&hooks, &mut ctx, "home", "x {% hook broken").await;
        assert_eq!(html, "x {% hook broken");
    }
}
