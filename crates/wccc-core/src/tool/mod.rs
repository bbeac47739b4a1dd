//! Tool system for planner tool calls
//!
//! This module provides the tool system for executing tools
//! requested by the planner.

pub mod definition;
pub mod manager;
pub mod traits;

pub use definition::{SchemaBuilder, ToolDefinition};
pub use manager::ToolManager;
pub use traits::{Tool, ToolResult};

/// Longest prefix of `text` holding at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_chars;

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 2), "he");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
