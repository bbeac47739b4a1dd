//! navigate, wait_for_selector, wait

use std::time::Duration;

use serde_json::Value;
use tracing::info;
use url::Url;

use super::{MAX_SELECTOR_WAIT_MS, MAX_WAIT_SECS, MIN_WAIT_SECS, ToolContext, non_empty_str};
use crate::error::{BrowserError, Result};

pub(super) async fn navigate(ctx: &ToolContext, input: &Value) -> Result<String> {
    let raw = non_empty_str(input, "url")?;
    let url = Url::parse(raw.trim())
        .map_err(|e| BrowserError::InvalidUrl(format!("'{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(BrowserError::InvalidUrl(format!(
            "'{}': only http and https URLs can be opened",
            raw
        )));
    }

    let limit = ctx.navigation_timeout();
    let final_url = ctx
        .within("navigation", limit, ctx.page().navigate(url.as_str(), limit))
        .await?;
    Ok(format!("Navigated to {}", final_url))
}

pub(super) async fn wait_for_selector(ctx: &ToolContext, input: &Value) -> Result<String> {
    let selector = non_empty_str(input, "selector")?;
    let timeout = match input.get("timeout_ms") {
        None | Some(Value::Null) => ctx.element_timeout(),
        Some(value) => {
            let ms = value.as_u64().filter(|ms| *ms > 0).ok_or_else(|| {
                BrowserError::InvalidInput(format!(
                    "parameter 'timeout_ms' must be a positive integer, got {}",
                    value
                ))
            })?;
            Duration::from_millis(ms.min(MAX_SELECTOR_WAIT_MS))
        }
    };

    ctx.within(
        "wait_for_selector",
        timeout,
        ctx.page().wait_for_selector(selector, timeout),
    )
    .await?;
    Ok(format!("Element '{}' is present", selector))
}

pub(super) async fn wait(input: &Value) -> Result<String> {
    let seconds = input
        .get("seconds")
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            BrowserError::InvalidInput("parameter 'seconds' must be a number".to_string())
        })?;

    if !(MIN_WAIT_SECS as f64..=MAX_WAIT_SECS as f64).contains(&seconds) {
        return Err(BrowserError::InvalidInput(format!(
            "parameter 'seconds' must be between {} and {}, got {}",
            MIN_WAIT_SECS, MAX_WAIT_SECS, seconds
        )));
    }

    info!("Waiting {}s", seconds);
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    Ok(format!("Waited {} seconds", seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePage;
    use crate::tools::tests::context;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_navigate_returns_final_url() {
        let dir = TempDir::new().unwrap();
        let (page, ctx) = context(FakePage::new(), dir.path());

        let out = navigate(&ctx, &json!({"url": "https://wccc.example/login"}))
            .await
            .unwrap();
        assert_eq!(out, "Navigated to https://wccc.example/login");
        assert_eq!(page.url(), "https://wccc.example/login");
    }

    #[tokio::test]
    async fn test_navigate_rejects_bad_urls() {
        let dir = TempDir::new().unwrap();
        let (page, ctx) = context(FakePage::new(), dir.path());

        for url in ["not a url", "javascript:alert(1)", "file:///etc/passwd", ""] {
            let err = navigate(&ctx, &json!({ "url": url })).await.unwrap_err();
            assert!(
                matches!(err, BrowserError::InvalidUrl(_) | BrowserError::InvalidInput(_)),
                "{}",
                url
            );
        }
        assert!(page.actions().is_empty());
    }

    #[tokio::test]
    async fn test_navigate_failure_names_url() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new(), dir.path());

        let err = navigate(&ctx, &json!({"url": "https://unreachable.invalid/"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unreachable.invalid"));
    }

    #[tokio::test]
    async fn test_navigate_that_never_settles_times_out() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new().never_settling(), dir.path());

        let err = navigate(&ctx, &json!({"url": "https://slow.example/"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Timeout(_)), "{}", err);
        assert!(err.to_string().contains("did not settle"));
    }

    #[tokio::test]
    async fn test_wait_for_selector() {
        let dir = TempDir::new().unwrap();
        let (_, ctx) = context(FakePage::new().with_element("#ready", None), dir.path());

        let out = wait_for_selector(&ctx, &json!({"selector": "#ready", "timeout_ms": 500}))
            .await
            .unwrap();
        assert!(out.contains("#ready"));

        let err = wait_for_selector(&ctx, &json!({"selector": "#never"}))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Timeout(_)));

        let err = wait_for_selector(&ctx, &json!({"selector": "#ready", "timeout_ms": -5}))
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::InvalidInput(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_bounds() {
        for seconds in [0, 11] {
            let err = wait(&json!({ "seconds": seconds })).await.unwrap_err();
            assert!(err.to_string().contains("between 1 and 10"), "{}", seconds);
        }
        assert!(wait(&json!({"seconds": 0.5})).await.is_err());
        assert!(wait(&json!({})).await.is_err());

        let start = tokio::time::Instant::now();
        assert_eq!(wait(&json!({"seconds": 1})).await.unwrap(), "Waited 1 seconds");
        assert_eq!(wait(&json!({"seconds": 10})).await.unwrap(), "Waited 10 seconds");
        assert!(start.elapsed() >= Duration::from_secs(11));
    }
}
