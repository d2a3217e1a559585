//! Agent memory: the ordered, append-only conversation store.
//!
//! Memory is the literal reasoning context handed to the backend on every
//! step, so insertion order is part of its meaning. The only operation that
//! removes messages is [`Memory::repair`], and it only filters.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::MemoryError;
use crate::message::{Message, Role};

/// Ordered store of the messages one agent has accumulated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Memory {
    messages: Vec<Message>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the end.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append several messages, preserving their order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Build a message for `role` and append it.
    ///
    /// Fails without touching memory when a tool message lacks its
    /// `tool_call_id`.
    pub fn update(
        &mut self,
        role: Role,
        content: impl Into<String>,
        attached_image: Option<String>,
        tool_call_id: Option<String>,
    ) -> Result<(), MemoryError> {
        let message = Message::from_role(role, content, attached_image, tool_call_id)?;
        self.append(message);
        Ok(())
    }

    /// The full ordered sequence.
    pub fn all(&self) -> &[Message] {
        &self.messages
    }

    /// Swap the whole sequence.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Every tool call id declared by an assistant message.
    fn declared_call_ids(&self) -> HashSet<&str> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.tool_calls.iter().map(|c| c.id.as_str()))
            .collect()
    }

    /// Tool messages that no assistant tool call accounts for.
    ///
    /// Returns their `tool_call_id` (empty when the id is missing), in
    /// memory order. These are exactly the messages [`Memory::repair`]
    /// would drop.
    pub fn orphaned_tool_call_ids(&self) -> Vec<String> {
        let declared = self.declared_call_ids();
        self.messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter(|m| !m.tool_call_id.as_deref().is_some_and(|id| declared.contains(id)))
            .map(|m| m.tool_call_id.clone().unwrap_or_default())
            .collect()
    }

    /// Tool calls declared by an assistant message that no tool message
    /// answers yet, in declaration order.
    pub fn unanswered_tool_call_ids(&self) -> Vec<String> {
        let answered: HashSet<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .flat_map(|m| m.tool_calls.iter())
            .filter(|c| !answered.contains(c.id.as_str()))
            .map(|c| c.id.clone())
            .collect()
    }

    /// Answer every unanswered tool call with `note`.
    ///
    /// Used after a step was cut short between announcing tool calls and
    /// recording their results. Only appends. Returns how many calls were
    /// closed.
    pub fn close_unanswered(&mut self, note: &str) -> usize {
        let pending = self.unanswered_tool_call_ids();
        for id in &pending {
            warn!(tool_call_id = %id, "Closing unanswered tool call");
            self.append(Message::tool_result(id.as_str(), note));
        }
        pending.len()
    }

    /// Drop tool messages that do not answer a declared tool call.
    ///
    /// Non-tool messages are always kept and relative order is unchanged.
    /// Returns how many messages were removed.
    pub fn repair(&mut self) -> usize {
        let declared: HashSet<String> = self
            .declared_call_ids()
            .into_iter()
            .map(str::to_string)
            .collect();

        let before = self.messages.len();
        let kept: Vec<Message> = std::mem::take(&mut self.messages)
            .into_iter()
            .filter(|m| {
                if m.role != Role::Tool {
                    return true;
                }
                let valid = m
                    .tool_call_id
                    .as_deref()
                    .is_some_and(|id| declared.contains(id));
                if !valid {
                    warn!(
                        tool_call_id = m.tool_call_id.as_deref().unwrap_or("<none>"),
                        "Dropping orphaned tool message"
                    );
                }
                valid
            })
            .collect();
        self.replace(kept);
        before - self.messages.len()
    }

    /// Content of the most recent assistant message with non-empty text.
    pub fn last_assistant_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && m.has_content())
            .map(|m| m.text())
    }

    /// Whether the latest assistant reply repeats earlier ones.
    ///
    /// True when the last message is an assistant message with non-empty
    /// content and at least `threshold` strictly earlier assistant messages
    /// carry byte-identical content.
    pub fn is_stuck(&self, threshold: usize) -> bool {
        let Some((last, earlier)) = self.messages.split_last() else {
            return false;
        };
        if last.role != Role::Assistant || !last.has_content() {
            return false;
        }

        let duplicates = earlier
            .iter()
            .filter(|m| m.role == Role::Assistant && m.content == last.content)
            .count();

        duplicates >= threshold
    }
}
