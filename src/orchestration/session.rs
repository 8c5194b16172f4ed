//! The chat session turn loop.
//!
//! One `ChatSession` drives one client request from the incoming user
//! message to the terminal event: persist the input, discover tools, run
//! model turns, dispatch tool calls between them, and keep looping until
//! the model stops asking for tools.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use super::{EventSender, OutboundEvent};
use crate::mcp::ToolGateway;
use crate::message::{ContentBlock, Message, MessageContent, Role};
use crate::provider::{ModelError, ModelGateway, ModelMessage, TurnObserver};
use crate::storage::{MessageStore, StorageError};

/// Incoming chat request body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's message. Must be non-empty; the server validates this.
    pub message: String,
    /// Continue an existing conversation, or start a new one when absent.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// System prompt selector; unknown names fall back to the default.
    #[serde(default)]
    pub prompt_type: Option<String>,
}

/// Errors that terminate a session.
///
/// Everything else the loop tolerates: discovery and tool-call failures
/// continue without tools or with an error-shaped result, history write
/// failures leave the in-memory copy authoritative.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The initial history load failed; the session has no context.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Both model paths failed for a turn.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Use the client-supplied conversation id, or mint a fresh one.
pub fn resolve_conversation_id(requested: Option<&str>) -> String {
    match requested {
        Some(id) if !id.trim().is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

/// Forwards in-flight turn progress onto the output channel. Delivery is
/// best effort; a vanished consumer does not abort the model turn.
struct SessionObserver {
    events: EventSender,
}

#[async_trait::async_trait]
impl TurnObserver for SessionObserver {
    async fn on_text(&self, delta: &str) {
        self.events
            .send(OutboundEvent::Chunk {
                text: delta.to_string(),
            })
            .await;
    }

    async fn on_content_block(&self, block: &ContentBlock) {
        self.events
            .send(OutboundEvent::ContentBlockComplete {
                block: block.clone(),
            })
            .await;
    }

    async fn on_message(&self, _message: &ModelMessage) {
        // The session emits `message_complete` itself, after persisting.
    }
}

/// One chat session over a resolved conversation.
pub struct ChatSession<G: ToolGateway> {
    gateway: ModelGateway,
    tools: G,
    store: MessageStore,
    conversation_id: String,
    max_turns: usize,
}

impl<G: ToolGateway> ChatSession<G> {
    /// Assemble a session for one request.
    pub fn new(
        gateway: ModelGateway,
        tools: G,
        store: MessageStore,
        conversation_id: impl Into<String>,
        max_turns: usize,
    ) -> Self {
        Self {
            gateway,
            tools,
            store,
            conversation_id: conversation_id.into(),
            max_turns,
        }
    }

    /// Drive the session to completion, reporting failures as a terminal
    /// `error` event. The channel closes when this returns.
    pub async fn run(mut self, request: ChatRequest, events: EventSender) {
        if let Err(err) = self.drive(&request, &events).await {
            error!(conversation = %self.conversation_id, error = %err, "session failed");
            events
                .send(OutboundEvent::Error {
                    message: err.to_string(),
                })
                .await;
        }
    }

    async fn drive(
        &mut self,
        request: &ChatRequest,
        events: &EventSender,
    ) -> Result<(), SessionError> {
        if !events
            .send(OutboundEvent::Id {
                conversation_id: self.conversation_id.clone(),
            })
            .await
        {
            return Ok(());
        }

        // Durability before the first model call: the user's input must
        // survive a crash mid-turn.
        let user_content = MessageContent::Text(request.message.clone());
        let persisted = match self
            .store
            .save_message(&self.conversation_id, Role::User, &user_content)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "failed to persist user message");
                false
            }
        };

        // The durable copy is the context source; rebuilding from it keeps
        // sessions identical across process restarts.
        let mut history = self
            .store
            .conversation_history(&self.conversation_id)
            .await?;
        if !persisted {
            history.push(Message::new(Role::User, user_content));
        }

        let tools = match self.tools.discover().await {
            Ok(catalog) => catalog,
            Err(err) => {
                warn!(error = %err, "tool discovery failed, continuing without tools");
                Vec::new()
            }
        };

        let observer = SessionObserver {
            events: events.clone(),
        };
        let mut display_items: Vec<Value> = Vec::new();

        let mut turns = 0;
        loop {
            turns += 1;
            if turns > self.max_turns {
                warn!(
                    conversation = %self.conversation_id,
                    max_turns = self.max_turns,
                    "turn limit reached, ending session"
                );
                break;
            }

            let message = self
                .gateway
                .stream_turn(
                    request.prompt_type.as_deref(),
                    history.clone(),
                    tools.clone(),
                    &observer,
                )
                .await?;

            let assistant_content = MessageContent::Blocks(message.content.clone());
            history.push(Message::new(Role::Assistant, assistant_content.clone()));
            if let Err(err) = self
                .store
                .save_message(&self.conversation_id, Role::Assistant, &assistant_content)
                .await
            {
                warn!(error = %err, "failed to persist assistant message");
            }

            if !events
                .send(OutboundEvent::MessageComplete {
                    content: message.text(),
                })
                .await
            {
                return Ok(());
            }

            // Loop only on actual tool-use blocks: a tool_use stop reason
            // without any is a provider quirk, and an empty tool message
            // would be rejected on the next call.
            let tool_uses = message.tool_uses();
            if tool_uses.is_empty() {
                break;
            }

            // Sequential dispatch in request order; all results of this
            // turn travel back to the model in one tool message.
            let mut result_blocks = Vec::new();
            for (id, name, input) in tool_uses {
                let (content, is_error) = match self.tools.call(name, input.clone()).await {
                    Ok(outcome) => {
                        display_items.push(outcome.raw_content);
                        (outcome.content, outcome.is_error)
                    }
                    Err(err) => {
                        warn!(tool = name, error = %err, "tool invocation failed");
                        (format!("tool call failed: {err}"), true)
                    }
                };

                events
                    .send(OutboundEvent::ToolResult {
                        tool_use_id: id.to_string(),
                        tool_name: name.to_string(),
                        content: content.clone(),
                        is_error,
                    })
                    .await;

                result_blocks.push(ContentBlock::ToolResult {
                    tool_use_id: id.to_string(),
                    content: Value::String(content),
                    is_error,
                });
            }

            let tool_content = MessageContent::Blocks(result_blocks);
            history.push(Message::new(Role::Tool, tool_content.clone()));
            if let Err(err) = self
                .store
                .save_message(&self.conversation_id, Role::Tool, &tool_content)
                .await
            {
                warn!(error = %err, "failed to persist tool results");
            }
        }

        events.send(OutboundEvent::EndTurn).await;
        if !display_items.is_empty() {
            events
                .send(OutboundEvent::NewMessage {
                    items: display_items,
                })
                .await;
        }

        Ok(())
    }
}
