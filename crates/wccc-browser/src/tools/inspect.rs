//! screenshot, get_content, get_text, is_visible, evaluate

use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, info};
use wccc_core::tool::truncate_chars;

use super::{CONTENT_LIMIT, ToolContext, non_empty_str, render_value};
use crate::error::{BrowserError, Result};

/// `<artifact dir>/<name>.png`, rejecting names that would escape the directory
fn screenshot_path(ctx: &ToolContext, name: &str) -> Result<PathBuf> {
    let stem = name.trim();
    let stem = stem.strip_suffix(".png").unwrap_or(stem);
    if stem.is_empty()
        || stem.contains(['/', '\\', '\0'])
        || stem.starts_with('.')
    {
        return Err(BrowserError::InvalidInput(format!(
            "screenshot name '{}' must be a plain file name",
            name
        )));
    }
    Ok(ctx.artifact_dir().join(format!("{}.png", stem)))
}

pub(super) async fn screenshot(ctx: &ToolContext, input: &Value) -> Result<String> {
    let name = non_empty_str(input, "name")?;
    let path = screenshot_path(ctx, name)?;

    let png = ctx
        .within("screenshot", ctx.element_timeout(), ctx.page().screenshot())
        .await?;

    tokio::fs::create_dir_all(ctx.artifact_dir()).await?;
    tokio::fs::write(&path, &png).await.map_err(|e| {
        BrowserError::Screenshot(format!("Failed to write {}: {}", path.display(), e))
    })?;

    let absolute = std::path::absolute(&path).unwrap_or_else(|_| path.clone());
    info!("Screenshot saved: file://{}", absolute.display());
    Ok(format!("Screenshot saved: {}", path.display()))
}

pub(super) async fn get_content(ctx: &ToolContext) -> Result<String> {
    let html = ctx
        .within("get_content", ctx.element_timeout(), ctx.page().content(None))
        .await?;
    Ok(truncate_chars(&html, CONTENT_LIMIT).to_string())
}

pub(super) async fn get_text(ctx: &ToolContext, input: &Value) -> Result<String> {
    let selector = non_empty_str(input, "selector")?;
    let timeout = ctx.element_timeout();
    let text = ctx
        .within("get_text", timeout, ctx.page().text(selector, timeout))
        .await?;
    Ok(text.unwrap_or_default())
}

pub(super) async fn is_visible(ctx: &ToolContext, input: &Value) -> Result<String> {
    let selector = non_empty_str(input, "selector")?;
    let visible = match ctx
        .within("is_visible", ctx.element_timeout(), ctx.page().is_visible(selector))
        .await
    {
        Ok(visible) => visible,
        Err(e) => {
            debug!("Visibility check for '{}' failed: {}", selector, e);
            false
        }
    };
    Ok(visible.to_string())
}

pub(super) async fn evaluate(ctx: &ToolContext, input: &Value) -> Result<String> {
    let script = non_empty_str(input, "script")?;
    let value = ctx
        .within("evaluate", ctx.navigation_timeout(), ctx.page().evaluate(script))
        .await?;
    Ok(truncate_chars(&render_value(value), CONTENT_LIMIT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FAKE_PNG, FakePage};
    use crate::tools::tests::context;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_screenshot_same_name_overwrites() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new(), dir.path());

        let first = screenshot(&ctx, &json!({"name": "x"})).await.unwrap();
        let second = screenshot(&ctx, &json!({"name": "x"})).await.unwrap();
        assert_eq!(first, second);

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read(dir.path().join("x.png")).unwrap(), FAKE_PNG);
    }

    #[tokio::test]
    async fn test_screenshot_png_suffix_not_doubled() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new(), dir.path());

        let out = screenshot(&ctx, &json!({"name": "after_login.png"})).await.unwrap();
        assert!(out.ends_with("after_login.png"));
        assert!(dir.path().join("after_login.png").exists());
    }

    #[tokio::test]
    async fn test_screenshot_rejects_path_names() {
        let dir = TempDir::new().unwrap();
        let (page, ctx) = context(FakePage::new(), dir.path());

        for name in ["../escape", "a/b", "a\\b", ".hidden", ".png"] {
            let err = screenshot(&ctx, &json!({ "name": name })).await.unwrap_err();
            assert!(matches!(err, BrowserError::InvalidInput(_)), "{}", name);
        }
        assert!(page.actions().is_empty());
    }

    #[tokio::test]
    async fn test_get_content_is_capped() {
        let dir = TempDir::new().unwrap();
        let html = format!("<html><body>{}</body></html>", "é".repeat(CONTENT_LIMIT * 2));
        let (_, ctx) = context(FakePage::new().with_html(html), dir.path());

        let out = get_content(&ctx).await.unwrap();
        assert_eq!(out.chars().count(), CONTENT_LIMIT);
        assert!(out.starts_with("<html><body>"));
    }

    #[tokio::test]
    async fn test_get_text() {
        let dir = TempDir::new().unwrap();
        let page = FakePage::new()
            .with_element("h1", Some("Welcome back"))
            .with_element("#empty", None);
        let (_, ctx) = context(page, dir.path());

        assert_eq!(get_text(&ctx, &json!({"selector": "h1"})).await.unwrap(), "Welcome back");
        assert_eq!(get_text(&ctx, &json!({"selector": "#empty"})).await.unwrap(), "");
        assert!(get_text(&ctx, &json!({"selector": "#none"})).await.is_err());
    }

    #[tokio::test]
    async fn test_is_visible_maps_failures_to_false() {
        let dir = TempDir::new().unwrap();
        let page = FakePage::new()
            .with_element("#shown", None)
            .with_hidden_element("#hidden");
        let (_, ctx) = context(page, dir.path());

        assert_eq!(is_visible(&ctx, &json!({"selector": "#shown"})).await.unwrap(), "true");
        assert_eq!(is_visible(&ctx, &json!({"selector": "#hidden"})).await.unwrap(), "false");
        assert_eq!(is_visible(&ctx, &json!({"selector": "#absent"})).await.unwrap(), "false");
    }

    #[tokio::test]
    async fn test_evaluate() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new(), dir.path());

        assert_eq!(
            evaluate(&ctx, &json!({"script": "document.title"})).await.unwrap(),
            "Fake Page"
        );
        let err = evaluate(&ctx, &json!({"script": "throw new Error('x')"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Script(_)));
    }
}
