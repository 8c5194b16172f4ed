//! Conversation data model shared by the model gateway, the orchestrator,
//! and the persistence layer.

mod content;

pub use content::{ContentBlock, MessageContent};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a conversation participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user talking to the assistant.
    User,
    /// The model's own messages.
    Assistant,
    /// Tool results fed back to the model.
    Tool,
}

impl Role {
    /// Stable string form used for storage and wire payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }

    /// Parse a stored role string. Returns `None` for unknown values so
    /// callers can decide how to degrade.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            "tool" => Some(Role::Tool),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted conversation message.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Who produced the message.
    pub role: Role,
    /// Text or structured content blocks.
    pub content: MessageContent,
    /// Creation time (UTC).
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Convenience constructor stamping the current time.
    pub fn new(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            created_at: Utc::now(),
        }
    }
}
