//! Message content blocks and the permissive storage codec.
//!
//! Content is stored as an opaque string. Structured content serializes to a
//! JSON block array; on read, anything that does not parse as a block array
//! degrades to plain text instead of failing. Mixed historical data depends
//! on this, so the fallback must never be tightened into a parse error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One block of structured message content.
///
/// The wire shape matches the Anthropic Messages API so blocks can be passed
/// through to the provider without translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text.
    Text {
        /// The text payload.
        text: String,
    },
    /// A tool invocation requested by the model.
    ToolUse {
        /// Provider-assigned request id, echoed back in the result.
        id: String,
        /// Name of the tool to invoke.
        name: String,
        /// Tool arguments.
        input: Value,
    },
    /// The outcome of a tool invocation, fed back to the model.
    ToolResult {
        /// Id of the originating `ToolUse` block.
        tool_use_id: String,
        /// Result payload (text or structured).
        content: Value,
        /// Whether the invocation failed.
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    /// Shorthand for a text block.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }
}

/// Message content: either raw text or a list of structured blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text content.
    Text(String),
    /// Structured content blocks.
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Serialize for storage. Plain text is stored verbatim; blocks are
    /// stored as a JSON array string.
    pub fn to_stored(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => {
                serde_json::to_string(blocks).unwrap_or_default()
            }
        }
    }

    /// Deserialize from storage, falling back to raw text when the stored
    /// string is not a valid block array.
    pub fn from_stored(raw: &str) -> Self {
        match serde_json::from_str::<Vec<ContentBlock>>(raw) {
            Ok(blocks) => MessageContent::Blocks(blocks),
            Err(_) => MessageContent::Text(raw.to_string()),
        }
    }

    /// Concatenated text of all text-bearing parts.
    pub fn plain_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}
