//! Append-only conversation record

use crate::llm::{Message, Role};

/// Ordered turns of one run
///
/// Only the loop appends; nothing reorders or removes turns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    turns: Vec<Message>,
}

impl Conversation {
    /// Seed with the operating instructions and the task
    pub fn seeded(system: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            turns: vec![Message::system(system), Message::user(task)],
        }
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.turns.push(message);
    }

    pub fn turns(&self) -> &[Message] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Last assistant turn, if the planner has spoken
    pub fn last_assistant(&self) -> Option<&Message> {
        self.turns.iter().rev().find(|m| m.role == Role::Assistant)
    }

    /// Text of the last assistant turn
    pub fn final_report(&self) -> Option<String> {
        self.last_assistant().map(Message::text_content)
    }

    pub fn into_turns(self) -> Vec<Message> {
        self.turns
    }
}
