//! Per-NPC conversation history

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::id::NpcId;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    /// Role name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}

/// Ordered message log for every NPC the player has talked to.
///
/// Logs are created lazily and never evicted; a play session is short enough
/// that unbounded growth is acceptable. Access goes through `&mut self` from
/// the session loop only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    conversations: HashMap<NpcId, Vec<ChatMessage>>,
}

impl ConversationHistory {
    /// Create an empty history store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to an NPC's log
    pub fn append(&mut self, npc: &NpcId, message: ChatMessage) {
        self.entry(npc).push(message);
    }

    /// Messages exchanged with an NPC, oldest first.
    ///
    /// Creates the (empty) log on first access.
    pub fn get(&mut self, npc: &NpcId) -> &[ChatMessage] {
        self.entry(npc).as_slice()
    }

    /// Read-only view that does not create a log.
    pub fn peek(&self, npc: &NpcId) -> Option<&[ChatMessage]> {
        self.conversations.get(npc).map(Vec::as_slice)
    }

    /// Forget everything said to an NPC
    pub fn clear(&mut self, npc: &NpcId) {
        if let Some(messages) = self.conversations.get_mut(npc) {
            tracing::debug!(npc = %npc, cleared = messages.len(), "Cleared conversation history");
            messages.clear();
        }
    }

    /// Number of NPCs with a log
    pub fn npc_count(&self) -> usize {
        self.conversations.len()
    }

    fn entry(&mut self, npc: &NpcId) -> &mut Vec<ChatMessage> {
        self.conversations.entry(npc.clone()).or_insert_with(|| {
            tracing::debug!(npc = %npc, "Created conversation history");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_creates_empty_log() {
        let mut history = ConversationHistory::new();
        let npc = NpcId::from("innkeeper");

        assert!(history.peek(&npc).is_none());
        assert!(history.get(&npc).is_empty());
        assert_eq!(history.npc_count(), 1);
        assert!(history.peek(&npc).is_some());
    }

    #[test]
    fn test_append_preserves_order() {
        let mut history = ConversationHistory::new();
        let npc = NpcId::from("innkeeper");

        history.append(&npc, ChatMessage::user("Hello"));
        history.append(&npc, ChatMessage::model("Welcome!"));
        history.append(&npc, ChatMessage::user("Any rooms?"));

        let log = history.get(&npc);
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], ChatMessage::user("Hello"));
        assert_eq!(log[1].role, ChatRole::Model);
        assert_eq!(log[2].content, "Any rooms?");
    }

    #[test]
    fn test_logs_are_per_npc() {
        let mut history = ConversationHistory::new();
        let smith = NpcId::from("smith");
        let baker = NpcId::from("baker");

        history.append(&smith, ChatMessage::user("Sword?"));
        assert!(history.get(&baker).is_empty());
        assert_eq!(history.get(&smith).len(), 1);
    }

    #[test]
    fn test_clear_only_affects_one_npc() {
        let mut history = ConversationHistory::new();
        let smith = NpcId::from("smith");
        let baker = NpcId::from("baker");

        history.append(&smith, ChatMessage::user("Sword?"));
        history.append(&baker, ChatMessage::user("Bread?"));
        history.clear(&smith);

        assert!(history.get(&smith).is_empty());
        assert_eq!(history.get(&baker).len(), 1);
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(ChatRole::User.as_str(), "user");
        assert_eq!(ChatRole::Model.as_str(), "model");
        let json = serde_json::to_string(&ChatMessage::model("hi")).unwrap();
        assert_eq!(json, r#"{"role":"model","content":"hi"}"#);
    }
}
