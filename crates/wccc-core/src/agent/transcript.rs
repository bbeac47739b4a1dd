//! Read-only transcript rendering for post-mortems

use std::fmt::Write;

use super::conversation::Conversation;
use crate::llm::{MessageContent, Role};
use crate::tool::truncate_chars;

/// Characters of the final answer shown in terse mode
pub const TERSE_EXCERPT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Every turn except raw tool results
    Verbose,
    /// Excerpt of the final assistant turn
    Terse,
}

pub fn render(conversation: &Conversation, verbosity: Verbosity) -> String {
    match verbosity {
        Verbosity::Verbose => render_verbose(conversation),
        Verbosity::Terse => render_terse(conversation),
    }
}

fn render_verbose(conversation: &Conversation) -> String {
    let mut out = String::new();

    for (i, turn) in conversation.turns().iter().enumerate() {
        // tool results are page dumps; the assistant turn names the call
        if turn.role == Role::Tool {
            continue;
        }

        let _ = writeln!(out, "[{}] {}", i, label(turn.role));
        for block in &turn.content {
            match block {
                MessageContent::Text { text } => {
                    let _ = writeln!(out, "{}", text);
                }
                MessageContent::ToolUse { name, input, .. } => {
                    let _ = writeln!(out, "-> {}({})", name, input);
                }
                MessageContent::ToolResult { .. } => {}
            }
        }
        out.push('\n');
    }

    out
}

fn render_terse(conversation: &Conversation) -> String {
    let report = conversation.final_report().unwrap_or_default();
    let excerpt = truncate_chars(&report, TERSE_EXCERPT_CHARS);
    if excerpt.len() < report.len() {
        format!("{}...", excerpt)
    } else {
        excerpt.to_string()
    }
}

fn label(role: Role) -> &'static str {
    match role {
        Role::System => "SYSTEM",
        Role::User => "USER",
        Role::Assistant => "ASSISTANT",
        Role::Tool => "TOOL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Message;
    use serde_json::json;

    fn conversation() -> Conversation {
        let mut c = Conversation::seeded("You drive a browser.", "Open the club homepage.");
        c.push(Message::assistant_blocks(vec![MessageContent::ToolUse {
            id: "1".to_string(),
            name: "get_content".to_string(),
            input: json!({}),
        }]));
        c.push(Message::tool_results(vec![MessageContent::ToolResult {
            tool_use_id: "1".to_string(),
            content: "<html><body>huge markup dump</body></html>".to_string(),
            is_error: false,
        }]));
        c.push(Message::assistant("The homepage shows the ride calendar."));
        c
    }

    #[test]
    fn test_verbose_skips_tool_results() {
        let out = render(&conversation(), Verbosity::Verbose);

        assert!(out.contains("[0] SYSTEM"));
        assert!(out.contains("[1] USER"));
        assert!(out.contains("-> get_content({})"));
        assert!(out.contains("The homepage shows the ride calendar."));
        assert!(!out.contains("huge markup dump"));
        assert!(!out.contains("TOOL"));
    }

    #[test]
    fn test_terse_truncates_final_answer() {
        let mut c = Conversation::seeded("s", "t");
        c.push(Message::assistant("x".repeat(TERSE_EXCERPT_CHARS + 20)));

        let out = render(&c, Verbosity::Terse);
        assert_eq!(out.len(), TERSE_EXCERPT_CHARS + 3);
        assert!(out.ends_with("..."));

        assert_eq!(
            render(&conversation(), Verbosity::Terse),
            "The homepage shows the ride calendar."
        );
    }

    #[test]
    fn test_render_does_not_mutate() {
        let c = conversation();
        let before = c.clone();
        let _ = render(&c, Verbosity::Verbose);
        let _ = render(&c, Verbosity::Terse);
        assert_eq!(c, before);
    }
}
