//! Request, message, and event types for the model gateway.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;

use super::ModelResult;
use crate::mcp::ToolDescriptor;
use crate::message::{ContentBlock, Message, Role};

/// Stop indicator on a completed model message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The model finished its answer.
    EndTurn,
    /// The model wants tool results before continuing.
    ToolUse,
    /// The token budget was exhausted.
    MaxTokens,
    /// Any other provider-specific reason.
    Other(String),
}

impl StopReason {
    /// Parse the provider's wire value.
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "end_turn" => StopReason::EndTurn,
            "tool_use" => StopReason::ToolUse,
            "max_tokens" => StopReason::MaxTokens,
            other => StopReason::Other(other.to_string()),
        }
    }
}

/// Final assembled message for one model turn.
#[derive(Debug, Clone)]
pub struct ModelMessage {
    /// Always `Assistant` for provider output.
    pub role: Role,
    /// Content blocks in generation order.
    pub content: Vec<ContentBlock>,
    /// Stop indicator, when the provider reported one.
    pub stop_reason: Option<StopReason>,
}

impl ModelMessage {
    /// Concatenated text of all text blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Tool-use requests in block order as `(id, name, input)`.
    pub fn tool_uses(&self) -> Vec<(&str, &str, &Value)> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some((id.as_str(), name.as_str(), input))
                }
                _ => None,
            })
            .collect()
    }

    /// Whether the turn loop must run the model again after dispatching
    /// tools. True when the stop indicator says so or when tool-use blocks
    /// are present.
    pub fn requests_tool_use(&self) -> bool {
        matches!(self.stop_reason, Some(StopReason::ToolUse))
            || self
                .content
                .iter()
                .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }
}

/// Transient event produced while a turn is in flight. Not persisted.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    /// An incremental piece of text.
    TextDelta(String),
    /// A content block finished assembling.
    ContentBlockComplete(ContentBlock),
    /// The final message for the turn. Exactly one per turn.
    MessageComplete(ModelMessage),
}

/// One model turn request.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Model identifier.
    pub model: String,
    /// Token budget.
    pub max_tokens: u32,
    /// Resolved system instruction.
    pub system: String,
    /// Conversation history, oldest first.
    pub messages: Vec<Message>,
    /// Tool catalog; omitted from the wire request when empty.
    pub tools: Vec<ToolDescriptor>,
}

/// Stream of turn events from a provider.
pub type TurnEventStream = Pin<Box<dyn Stream<Item = ModelResult<TurnEvent>> + Send>>;

/// Provider seam: the two completion variants the gateway drives.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Non-streaming completion. Returns the final message directly.
    async fn create_message(&self, request: &TurnRequest) -> ModelResult<ModelMessage>;

    /// Streaming completion. Yields text deltas and completed blocks,
    /// ending with exactly one `MessageComplete`.
    async fn stream_message(&self, request: &TurnRequest) -> ModelResult<TurnEventStream>;

    /// Provider identifier for logging.
    fn provider_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stop_reason_from_wire() {
        assert_eq!(StopReason::from_wire("end_turn"), StopReason::EndTurn);
        assert_eq!(StopReason::from_wire("tool_use"), StopReason::ToolUse);
        assert_eq!(StopReason::from_wire("max_tokens"), StopReason::MaxTokens);
        assert_eq!(
            StopReason::from_wire("stop_sequence"),
            StopReason::Other("stop_sequence".to_string())
        );
    }

    #[test]
    fn test_tool_use_detection() {
        let plain = ModelMessage {
            role: Role::Assistant,
            content: vec![ContentBlock::text("done")],
            stop_reason: Some(StopReason::EndTurn),
        };
        assert!(!plain.requests_tool_use());
        assert!(plain.tool_uses().is_empty());

        let with_tool = ModelMessage {
            role: Role::Assistant,
            content: vec![
                ContentBlock::text("let me check"),
                ContentBlock::ToolUse {
                    id: "toolu_1".into(),
                    name: "get_cart".into(),
                    input: json!({}),
                },
            ],
            stop_reason: Some(StopReason::ToolUse),
        };
        assert!(with_tool.requests_tool_use());
        assert_eq!(with_tool.tool_uses().len(), 1);
        assert_eq!(with_tool.tool_uses()[0].1, "get_cart");
        assert_eq!(with_tool.text(), "let me check");
    }

    #[test]
    fn test_tool_use_blocks_win_over_missing_stop_reason() {
        let message = ModelMessage {
            role: Role::Assistant,
            content: vec![ContentBlock::ToolUse {
                id: "t".into(),
                name: "n".into(),
                input: json!({}),
            }],
            stop_reason: None,
        };
        assert!(message.requests_tool_use());
    }
}
