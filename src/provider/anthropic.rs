//! Anthropic Messages API adapter.
//!
//! Implements both completion variants behind [`ModelProvider`]: the
//! streaming call parses the provider's SSE event protocol and assembles
//! the final message on the fly; the non-streaming call is used by the
//! gateway's fallback path.

use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::types::{ModelMessage, ModelProvider, StopReason, TurnEvent, TurnEventStream, TurnRequest};
use super::{ModelError, ModelResult};
use crate::message::{ContentBlock, Role};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MESSAGES_PATH: &str = "/v1/messages";
const API_VERSION: &str = "2023-06-01";
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Client for the Anthropic Messages API.
pub struct AnthropicProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicProvider {
    /// Create a provider with the production base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Override the base URL (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), MESSAGES_PATH)
    }

    fn request_body(request: &TurnRequest, stream: bool) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|message| {
                json!({
                    "role": wire_role(message.role),
                    "content": &message.content,
                })
            })
            .collect();

        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "system": request.system,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            body["tools"] = request
                .tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.input_schema,
                    })
                })
                .collect();
        }
        if stream {
            body["stream"] = json!(true);
        }

        body
    }

    async fn send(&self, body: &Value) -> ModelResult<reqwest::Response> {
        let response = self
            .http
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl ModelProvider for AnthropicProvider {
    async fn create_message(&self, request: &TurnRequest) -> ModelResult<ModelMessage> {
        let body = Self::request_body(request, false);
        let response = self.send(&body).await?;

        let value: Value = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(format!("invalid JSON body: {e}")))?;

        let content = value
            .get("content")
            .ok_or_else(|| ModelError::InvalidResponse("missing content array".to_string()))?;
        let stop_reason = value
            .get("stop_reason")
            .and_then(Value::as_str)
            .map(StopReason::from_wire);

        Ok(ModelMessage {
            role: Role::Assistant,
            content: parse_blocks(content),
            stop_reason,
        })
    }

    async fn stream_message(&self, request: &TurnRequest) -> ModelResult<TurnEventStream> {
        let body = Self::request_body(request, true);
        let response = self.send(&body).await?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut bytes = Box::pin(response.bytes_stream());

        tokio::spawn(async move {
            let mut decoder = SseDecoder::new();
            let mut assembler = TurnAssembler::new();

            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx.send(Err(ModelError::Http(err))).await;
                        return;
                    }
                };

                for payload in decoder.feed(&chunk) {
                    match assembler.apply(&payload) {
                        Ok(events) => {
                            for event in events {
                                if tx.send(Ok(event)).await.is_err() {
                                    // Consumer gone; stop reading.
                                    return;
                                }
                            }
                        }
                        Err(err) => {
                            let _ = tx.send(Err(err)).await;
                            return;
                        }
                    }
                }

                if assembler.is_complete() {
                    return;
                }
            }

            if !assembler.is_complete() {
                let _ = tx
                    .send(Err(ModelError::Protocol(
                        "stream ended before message_stop".to_string(),
                    )))
                    .await;
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

/// The Messages API has no `tool` role; tool results travel in a user
/// message.
fn wire_role(role: Role) -> &'static str {
    match role {
        Role::User | Role::Tool => "user",
        Role::Assistant => "assistant",
    }
}

/// Parse a content array block by block, skipping block kinds this crate
/// does not model rather than failing the whole message.
fn parse_blocks(content: &Value) -> Vec<ContentBlock> {
    content
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|block| serde_json::from_value(block.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Splits a byte stream into SSE `data:` payloads.
///
/// Frames are delimited by a blank line; multiple `data:` lines within one
/// frame are joined with newlines per the SSE spec. `event:` lines are
/// ignored since the payload carries its own `type` field.
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn feed(&mut self, input: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(input);

        let mut payloads = Vec::new();
        while let Some((end, sep_len)) = frame_boundary(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + sep_len).collect();
            let frame = String::from_utf8_lossy(&frame[..end]);

            let data_lines: Vec<&str> = frame
                .lines()
                .filter_map(|line| {
                    line.trim_end_matches('\r')
                        .strip_prefix("data:")
                        .map(str::trim_start)
                })
                .collect();

            if !data_lines.is_empty() {
                payloads.push(data_lines.join("\n"));
            }
        }
        payloads
    }
}

fn frame_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let crlf = find_subsequence(buffer, b"\r\n\r\n");
    let lf = find_subsequence(buffer, b"\n\n");
    match (crlf, lf) {
        (Some(a), Some(b)) if a < b => Some((a, 4)),
        (Some(a), None) => Some((a, 4)),
        (_, Some(b)) => Some((b, 2)),
        (None, None) => None,
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

enum PartialBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input_json: String,
    },
    /// A block kind this crate does not model (e.g. thinking).
    Skipped,
}

/// Folds Messages API stream events into [`TurnEvent`]s and the final
/// message.
struct TurnAssembler {
    open: BTreeMap<u64, PartialBlock>,
    completed: BTreeMap<u64, ContentBlock>,
    stop_reason: Option<StopReason>,
    complete: bool,
}

impl TurnAssembler {
    fn new() -> Self {
        Self {
            open: BTreeMap::new(),
            completed: BTreeMap::new(),
            stop_reason: None,
            complete: false,
        }
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn apply(&mut self, payload: &str) -> ModelResult<Vec<TurnEvent>> {
        let event: Value = serde_json::from_str(payload)
            .map_err(|e| ModelError::Protocol(format!("malformed stream event: {e}")))?;

        let kind = event.get("type").and_then(Value::as_str).unwrap_or("");
        match kind {
            "content_block_start" => {
                let index = event.get("index").and_then(Value::as_u64).unwrap_or(0);
                let block = &event["content_block"];
                let partial = match block.get("type").and_then(Value::as_str) {
                    Some("text") => PartialBlock::Text(
                        block
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                    ),
                    Some("tool_use") => PartialBlock::ToolUse {
                        id: block
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        name: block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        input_json: String::new(),
                    },
                    _ => PartialBlock::Skipped,
                };
                self.open.insert(index, partial);
                Ok(Vec::new())
            }
            "content_block_delta" => {
                let index = event.get("index").and_then(Value::as_u64).unwrap_or(0);
                let delta = &event["delta"];
                match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => {
                        let text = delta
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string();
                        if let Some(PartialBlock::Text(buffer)) = self.open.get_mut(&index) {
                            buffer.push_str(&text);
                        }
                        if text.is_empty() {
                            Ok(Vec::new())
                        } else {
                            Ok(vec![TurnEvent::TextDelta(text)])
                        }
                    }
                    Some("input_json_delta") => {
                        let partial_json = delta
                            .get("partial_json")
                            .and_then(Value::as_str)
                            .unwrap_or("");
                        if let Some(PartialBlock::ToolUse { input_json, .. }) =
                            self.open.get_mut(&index)
                        {
                            input_json.push_str(partial_json);
                        }
                        Ok(Vec::new())
                    }
                    _ => Ok(Vec::new()),
                }
            }
            "content_block_stop" => {
                let index = event.get("index").and_then(Value::as_u64).unwrap_or(0);
                match self.open.remove(&index).and_then(finalize_block) {
                    Some(block) => {
                        self.completed.insert(index, block.clone());
                        Ok(vec![TurnEvent::ContentBlockComplete(block)])
                    }
                    None => Ok(Vec::new()),
                }
            }
            "message_delta" => {
                if let Some(reason) = event["delta"].get("stop_reason").and_then(Value::as_str) {
                    self.stop_reason = Some(StopReason::from_wire(reason));
                }
                Ok(Vec::new())
            }
            "message_stop" => {
                // Close any block the server never stopped explicitly.
                let open = std::mem::take(&mut self.open);
                for (index, partial) in open {
                    if let Some(block) = finalize_block(partial) {
                        self.completed.insert(index, block);
                    }
                }

                self.complete = true;
                let message = ModelMessage {
                    role: Role::Assistant,
                    content: std::mem::take(&mut self.completed).into_values().collect(),
                    stop_reason: self.stop_reason.clone(),
                };
                Ok(vec![TurnEvent::MessageComplete(message)])
            }
            "error" => {
                let message = event["error"]
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unspecified stream error");
                Err(ModelError::Protocol(message.to_string()))
            }
            // message_start, ping, and future event kinds carry nothing we
            // need here.
            _ => Ok(Vec::new()),
        }
    }
}

fn finalize_block(partial: PartialBlock) -> Option<ContentBlock> {
    match partial {
        PartialBlock::Text(text) => Some(ContentBlock::Text { text }),
        PartialBlock::ToolUse {
            id,
            name,
            input_json,
        } => {
            let input = if input_json.is_empty() {
                json!({})
            } else {
                serde_json::from_str(&input_json).unwrap_or_else(|_| json!({}))
            };
            Some(ContentBlock::ToolUse { id, name, input })
        }
        PartialBlock::Skipped => None,
    }
}
