//! list_frames, get_frame_content, fill_in_frame, click_in_frame

use serde_json::Value;
use wccc_core::tool::truncate_chars;

use super::{CONTENT_LIMIT, ToolContext, frame_ref, non_empty_str, required_str};
use crate::error::{BrowserError, Result};
use crate::frames;
use crate::page::FrameInfo;

async fn resolve_frame(ctx: &ToolContext, input: &Value) -> Result<FrameInfo> {
    let frame_ref = frame_ref(input)?;
    let all = ctx
        .within("list_frames", ctx.element_timeout(), ctx.page().frames())
        .await?;
    frames::resolve(&frame_ref, &all)
        .cloned()
        .ok_or_else(|| BrowserError::Frame(frames::not_found_message(&frame_ref, &all)))
}

pub(super) async fn list_frames(ctx: &ToolContext) -> Result<String> {
    let all = ctx
        .within("list_frames", ctx.element_timeout(), ctx.page().frames())
        .await?;
    Ok(frames::describe(&all))
}

pub(super) async fn get_frame_content(ctx: &ToolContext, input: &Value) -> Result<String> {
    let frame = resolve_frame(ctx, input).await?;
    let html = ctx
        .within(
            "get_frame_content",
            ctx.element_timeout(),
            ctx.page().content(Some(&frame)),
        )
        .await?;
    Ok(truncate_chars(&html, CONTENT_LIMIT).to_string())
}

pub(super) async fn fill_in_frame(ctx: &ToolContext, input: &Value) -> Result<String> {
    let frame = resolve_frame(ctx, input).await?;
    let selector = non_empty_str(input, "selector")?;
    let text = required_str(input, "text")?;
    let timeout = ctx.element_timeout();
    ctx.within(
        "fill_in_frame",
        timeout,
        ctx.page().fill(Some(&frame), selector, text, timeout),
    )
    .await?;
    Ok(format!(
        "Filled '{}' in frame {} with {} characters",
        selector,
        frame.index,
        text.chars().count()
    ))
}

pub(super) async fn click_in_frame(ctx: &ToolContext, input: &Value) -> Result<String> {
    let frame = resolve_frame(ctx, input).await?;
    let selector = non_empty_str(input, "selector")?;
    let timeout = ctx.element_timeout();
    ctx.within(
        "click_in_frame",
        timeout,
        ctx.page().click(Some(&frame), selector, timeout),
    )
    .await?;
    Ok(format!("Clicked '{}' in frame {}", selector, frame.index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;
    use crate::tools::tests::context;
    use serde_json::json;
    use tempfile::TempDir;

    fn page_with_login_frame() -> FakePage {
        FakePage::new().with_frame(
            "auth",
            "https://login.wccc.example/embed",
            "<form><input id=\"user\"><input id=\"pass\"><button id=\"go\"></button></form>",
            &["#user", "#pass", "#go"],
        )
    }

    #[tokio::test]
    async fn test_list_frames() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(page_with_login_frame(), dir.path());

        let out = list_frames(&ctx).await.unwrap();
        assert!(out.contains("[0]"));
        assert!(out.contains("[1] name=auth url=https://login.wccc.example/embed"));
    }

    #[tokio::test]
    async fn test_frame_content_by_name_url_and_index() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(page_with_login_frame(), dir.path());

        for frame in [json!("auth"), json!("login.wccc"), json!(1), json!("1")] {
            let html = get_frame_content(&ctx, &json!({ "frame": frame }))
                .await
                .unwrap();
            assert!(html.starts_with("<form>"), "{}", frame);
        }
    }

    #[tokio::test]
    async fn test_fill_and_click_in_frame() {
        let dir = TempDir::new().unwrap();
        let (page, ctx) = context(page_with_login_frame(), dir.path());

        let out = fill_in_frame(&ctx, &json!({"frame": "auth", "selector": "#pass", "text": "s3cret"}))
            .await
            .unwrap();
        assert!(!out.contains("s3cret"));
        click_in_frame(&ctx, &json!({"frame": "auth", "selector": "#go"}))
            .await
            .unwrap();

        assert_eq!(page.actions(), vec!["fill #pass in frame 1", "click #go in frame 1"]);
    }

    #[tokio::test]
    async fn test_unknown_frame_lists_available() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(page_with_login_frame(), dir.path());

        let err = click_in_frame(&ctx, &json!({"frame": "zzz", "selector": "#go"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Frame(_)));
        let text = err.to_string();
        assert!(text.contains("'zzz'"));
        assert!(text.contains("name=auth"));
    }

    #[tokio::test]
    async fn test_missing_element_in_frame() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(page_with_login_frame(), dir.path());

        let err = click_in_frame(&ctx, &json!({"frame": 1, "selector": "#absent"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::ElementNotFound(_)));
    }
}
