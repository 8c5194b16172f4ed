//! Turn-level driver over a [`ModelProvider`].
//!
//! The gateway owns the model name and token budget, resolves the system
//! prompt, and runs one model turn: streaming first, with a transparent
//! non-streaming retry when the stream fails at any point. Callers observe
//! progress through [`TurnObserver`]; the final message is returned exactly
//! once per successful turn.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::warn;

use super::prompts;
use super::types::{ModelMessage, ModelProvider, TurnEvent, TurnRequest};
use super::{ModelError, ModelResult};
use crate::mcp::ToolDescriptor;
use crate::message::{ContentBlock, Message};

/// Observer for in-flight turn progress. Delivery is best effort; a
/// disconnected consumer must not abort the turn, so handlers return
/// nothing.
#[async_trait]
pub trait TurnObserver: Send + Sync {
    /// An incremental piece of assistant text.
    async fn on_text(&self, delta: &str);

    /// A content block finished assembling. Default: ignored.
    async fn on_content_block(&self, _block: &ContentBlock) {}

    /// The final message of a successful turn. Fires exactly once per
    /// turn, after streaming or after the fallback, never after both.
    async fn on_message(&self, message: &ModelMessage);

    /// A tool-use request from the completed message, in block order,
    /// after `on_message`. Default: ignored.
    async fn on_tool_use(&self, _id: &str, _name: &str, _input: &Value) {}
}

/// Drives single model turns against a provider.
pub struct ModelGateway {
    provider: Arc<dyn ModelProvider>,
    model: String,
    max_tokens: u32,
}

impl ModelGateway {
    /// Create a gateway for the given provider and model configuration.
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
        }
    }

    /// Run one model turn.
    ///
    /// Streams the completion, forwarding events to `observer`. If the
    /// stream fails before completing (transport error, protocol error, or
    /// an early end), the same request is retried once without streaming;
    /// the fallback replays the final text through `on_text` so consumers
    /// see the answer either way.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Unavailable`] when both paths fail.
    pub async fn stream_turn(
        &self,
        prompt_type: Option<&str>,
        messages: Vec<Message>,
        tools: Vec<ToolDescriptor>,
        observer: &dyn TurnObserver,
    ) -> ModelResult<ModelMessage> {
        let request = TurnRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: prompts::resolve(prompt_type).to_string(),
            messages,
            tools,
        };

        let streaming_error = match self.stream_once(&request, observer).await {
            Ok(message) => {
                notify_complete(observer, &message).await;
                return Ok(message);
            }
            Err(err) => err,
        };

        warn!(
            provider = self.provider.provider_name(),
            error = %streaming_error,
            "streaming turn failed; retrying without streaming"
        );

        match self.provider.create_message(&request).await {
            Ok(message) => {
                // The stream may have died before any text arrived; replay
                // the final text so the consumer is never left blank.
                for block in &message.content {
                    if let ContentBlock::Text { text } = block {
                        if !text.is_empty() {
                            observer.on_text(text).await;
                        }
                    }
                    observer.on_content_block(block).await;
                }
                notify_complete(observer, &message).await;
                Ok(message)
            }
            Err(fallback_error) => Err(ModelError::Unavailable {
                streaming: streaming_error.to_string(),
                fallback: fallback_error.to_string(),
            }),
        }
    }

    async fn stream_once(
        &self,
        request: &TurnRequest,
        observer: &dyn TurnObserver,
    ) -> ModelResult<ModelMessage> {
        let mut stream = self.provider.stream_message(request).await?;

        while let Some(event) = stream.next().await {
            match event? {
                TurnEvent::TextDelta(delta) => observer.on_text(&delta).await,
                TurnEvent::ContentBlockComplete(block) => {
                    observer.on_content_block(&block).await
                }
                TurnEvent::MessageComplete(message) => return Ok(message),
            }
        }

        Err(ModelError::Protocol(
            "stream ended without a final message".to_string(),
        ))
    }
}

async fn notify_complete(observer: &dyn TurnObserver, message: &ModelMessage) {
    observer.on_message(message).await;
    for (id, name, input) in message.tool_uses() {
        observer.on_tool_use(id, name, input).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageContent, Role};
    use crate::provider::types::TurnEventStream;
    use crate::provider::StopReason;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct Recorder {
        texts: Mutex<Vec<String>>,
        messages: AtomicUsize,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                texts: Mutex::new(Vec::new()),
                messages: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TurnObserver for Recorder {
        async fn on_text(&self, delta: &str) {
            self.texts.lock().unwrap().push(delta.to_string());
        }

        async fn on_message(&self, _message: &ModelMessage) {
            self.messages.fetch_add(1, Ordering::SeqCst);
        }
    }

    enum StreamBehavior {
        Events(Vec<TurnEvent>),
        FailOpen,
        DieMidway(Vec<TurnEvent>),
    }

    struct ScriptedProvider {
        behavior: StreamBehavior,
        fallback: Option<ModelMessage>,
        stream_calls: AtomicUsize,
        create_calls: AtomicUsize,
    }

    fn answer(text: &str) -> ModelMessage {
        ModelMessage {
            role: Role::Assistant,
            content: vec![ContentBlock::text(text)],
            stop_reason: Some(StopReason::EndTurn),
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn create_message(&self, _request: &TurnRequest) -> ModelResult<ModelMessage> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            self.fallback
                .clone()
                .ok_or_else(|| ModelError::InvalidResponse("no fallback scripted".into()))
        }

        async fn stream_message(&self, _request: &TurnRequest) -> ModelResult<TurnEventStream> {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<ModelResult<TurnEvent>> = match &self.behavior {
                StreamBehavior::Events(events) => events.iter().cloned().map(Ok).collect(),
                StreamBehavior::FailOpen => {
                    return Err(ModelError::Api {
                        status: 529,
                        message: "overloaded".into(),
                    })
                }
                StreamBehavior::DieMidway(events) => {
                    let mut items: Vec<ModelResult<TurnEvent>> =
                        events.iter().cloned().map(Ok).collect();
                    items.push(Err(ModelError::Protocol("connection reset".into())));
                    items
                }
            };
            Ok(Box::pin(futures_util::stream::iter(items)))
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }
    }

    fn user_turn() -> Vec<Message> {
        vec![Message::new(Role::User, MessageContent::Text("hi".into()))]
    }

    #[tokio::test]
    async fn test_streaming_happy_path() {
        let provider = Arc::new(ScriptedProvider {
            behavior: StreamBehavior::Events(vec![
                TurnEvent::TextDelta("hel".into()),
                TurnEvent::TextDelta("lo".into()),
                TurnEvent::MessageComplete(answer("hello")),
            ]),
            fallback: None,
            stream_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        });
        let gateway = ModelGateway::new(provider.clone(), "test-model", 256);
        let recorder = Recorder::new();

        let message = gateway
            .stream_turn(None, user_turn(), Vec::new(), &recorder)
            .await
            .unwrap();

        assert_eq!(message.text(), "hello");
        assert_eq!(*recorder.texts.lock().unwrap(), vec!["hel", "lo"]);
        assert_eq!(recorder.messages.load(Ordering::SeqCst), 1);
        assert_eq!(provider.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_on_stream_open_failure() {
        let provider = Arc::new(ScriptedProvider {
            behavior: StreamBehavior::FailOpen,
            fallback: Some(answer("fallback answer")),
            stream_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        });
        let gateway = ModelGateway::new(provider.clone(), "test-model", 256);
        let recorder = Recorder::new();

        let message = gateway
            .stream_turn(None, user_turn(), Vec::new(), &recorder)
            .await
            .unwrap();

        assert_eq!(message.text(), "fallback answer");
        // The fallback replays the answer text.
        assert_eq!(*recorder.texts.lock().unwrap(), vec!["fallback answer"]);
        // Exactly one final message across both paths.
        assert_eq!(recorder.messages.load(Ordering::SeqCst), 1);
        assert_eq!(provider.stream_calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_when_stream_dies_midway() {
        let provider = Arc::new(ScriptedProvider {
            behavior: StreamBehavior::DieMidway(vec![TurnEvent::TextDelta("par".into())]),
            fallback: Some(answer("partial answer, recovered")),
            stream_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        });
        let gateway = ModelGateway::new(provider.clone(), "test-model", 256);
        let recorder = Recorder::new();

        let message = gateway
            .stream_turn(None, user_turn(), Vec::new(), &recorder)
            .await
            .unwrap();

        assert_eq!(message.text(), "partial answer, recovered");
        assert_eq!(recorder.messages.load(Ordering::SeqCst), 1);
        assert_eq!(provider.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_paths_failing_is_unavailable() {
        let provider = Arc::new(ScriptedProvider {
            behavior: StreamBehavior::FailOpen,
            fallback: None,
            stream_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        });
        let gateway = ModelGateway::new(provider, "test-model", 256);
        let recorder = Recorder::new();

        let err = gateway
            .stream_turn(None, user_turn(), Vec::new(), &recorder)
            .await
            .unwrap_err();

        assert!(matches!(err, ModelError::Unavailable { .. }));
        assert_eq!(recorder.messages.load(Ordering::SeqCst), 0);
    }
}
