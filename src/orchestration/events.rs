//! Wire events sent to the chat client.

use serde::Serialize;
use serde_json::Value;

use crate::message::ContentBlock;

/// One event on the client-facing stream. Serialized as a single JSON
/// document per SSE frame; wire order matches generation order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// First event of every session: the conversation identifier.
    Id { conversation_id: String },
    /// An incremental piece of assistant text.
    Chunk { text: String },
    /// A content block finished assembling.
    ContentBlockComplete { block: ContentBlock },
    /// A model turn completed; `content` is the turn's full text.
    MessageComplete { content: String },
    /// Outcome of one tool call, keyed by the originating request id.
    /// Failures arrive here too, with `is_error` set and the error
    /// description as content.
    ToolResult {
        tool_use_id: String,
        tool_name: String,
        content: String,
        is_error: bool,
    },
    /// Terminal event of a successful session.
    EndTurn,
    /// Raw tool responses collected for display, sent after `end_turn`
    /// when any accumulated.
    NewMessage { items: Vec<Value> },
    /// Terminal event of a failed session.
    Error { message: String },
}
