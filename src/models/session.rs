//! The `Session` record itself (spec §3). The in-process store that owns a
//! `HashMap<String, Session>` under a mutex lives in `session::InMemorySessionStore`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::{Intent, Requirements};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<ConversationMessage>,
    pub intent: Option<Intent>,
    pub requirements: Option<Requirements>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub turn_count: u32,
}

impl Session {
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Session {
            id,
            messages: Vec::new(),
            intent: None,
            requirements: None,
            created_at: now,
            updated_at: now,
            turn_count: 0,
        }
    }

    pub fn append_message(&mut self, role: MessageRole, content: String) {
        self.messages.push(ConversationMessage {
            role,
            content,
            timestamp: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    /// Concatenates accumulated user messages space-separated, per spec §4.6.
    pub fn user_messages_joined(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
