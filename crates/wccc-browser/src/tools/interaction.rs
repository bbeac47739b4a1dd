//! click, fill, type, press_key

use serde_json::Value;

use super::{ToolContext, non_empty_str, required_str};
use crate::error::Result;

pub(super) async fn click(ctx: &ToolContext, input: &Value) -> Result<String> {
    let selector = non_empty_str(input, "selector")?;
    let timeout = ctx.element_timeout();
    ctx.within("click", timeout, ctx.page().click(None, selector, timeout))
        .await?;
    Ok(format!("Clicked '{}'", selector))
}

// Output reports the length only: the text may be a password.
pub(super) async fn fill(ctx: &ToolContext, input: &Value) -> Result<String> {
    let selector = non_empty_str(input, "selector")?;
    let text = required_str(input, "text")?;
    let timeout = ctx.element_timeout();
    ctx.within("fill", timeout, ctx.page().fill(None, selector, text, timeout))
        .await?;
    Ok(format!(
        "Filled '{}' with {} characters",
        selector,
        text.chars().count()
    ))
}

pub(super) async fn type_text(ctx: &ToolContext, input: &Value) -> Result<String> {
    let selector = non_empty_str(input, "selector")?;
    let text = required_str(input, "text")?;
    let timeout = ctx.element_timeout();
    ctx.within("type", timeout, ctx.page().type_text(selector, text, timeout))
        .await?;
    Ok(format!(
        "Typed {} characters into '{}'",
        text.chars().count(),
        selector
    ))
}

pub(super) async fn press_key(ctx: &ToolContext, input: &Value) -> Result<String> {
    let key = non_empty_str(input, "key")?;
    ctx.within("press_key", ctx.element_timeout(), ctx.page().press_key(key))
        .await?;
    Ok(format!("Pressed {}", key))
}
