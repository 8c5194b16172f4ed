//! Route handlers and router assembly.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{header, Method};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

use super::ApiError;
use crate::config::Settings;
use crate::mcp::{resolve_customer_endpoint, storefront_endpoint, McpClient, StorefrontGateway};
use crate::orchestration::{resolve_conversation_id, ChatRequest, ChatSession, OutputChannel};
use crate::provider::{ModelGateway, ModelProvider};
use crate::storage::MessageStore;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Message store; clones share one pool.
    pub store: MessageStore,
    /// Model provider shared by all sessions.
    pub provider: Arc<dyn ModelProvider>,
    /// Loaded application settings.
    pub settings: Arc<Settings>,
}

/// Build the application router.
///
/// Browsers call this API from storefront pages, so CORS mirrors the
/// request origin and allows credentials; the layer also answers
/// preflight `OPTIONS` with no body.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    Router::new()
        .route("/chat", post(post_chat).get(get_chat))
        .layer(cors)
        .with_state(state)
}

/// `POST /chat`: start a chat session and stream its events.
///
/// The response is `text/event-stream`, one JSON event per frame, held
/// open until the session's terminal event; the stream closes when the
/// session task returns.
async fn post_chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // A body that fails to parse (missing `message` included) must still
    // come back as a JSON error body, not the extractor's plain-text 422.
    let Json(request) =
        payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    if request.message.trim().is_empty() {
        return Err(ApiError::Validation("message is required".to_string()));
    }

    let conversation_id = resolve_conversation_id(request.conversation_id.as_deref());
    info!(conversation = %conversation_id, "chat session starting");

    // The customer endpoint is conversation-scoped, so it must resolve
    // before the session task takes over.
    let customer =
        resolve_customer_endpoint(&state.store, &conversation_id, &state.settings.mcp).await;
    let tools = StorefrontGateway::new(
        McpClient::new(),
        storefront_endpoint(&state.settings.mcp),
        customer,
    );

    let gateway = ModelGateway::new(
        state.provider.clone(),
        state.settings.model.model.clone(),
        state.settings.model.max_tokens,
    );
    let session = ChatSession::new(
        gateway,
        tools,
        state.store.clone(),
        conversation_id,
        state.settings.session.max_turns as usize,
    );

    let events = OutputChannel::open(state.settings.session.event_buffer, move |sender| {
        session.run(request, sender)
    });

    Ok((
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(sse_frames(events)).keep_alive(KeepAlive::default()),
    ))
}

fn sse_frames(
    events: impl Stream<Item = crate::orchestration::OutboundEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    events.map(|event| {
        let frame = match Event::default().json_data(&event) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize outbound event");
                Event::default().data(r#"{"type":"error","message":"serialization failure"}"#)
            }
        };
        Ok(frame)
    })
}

/// `GET /chat?history&conversation_id=<id>`: return the stored history as
/// one JSON document. Unknown conversation ids yield an empty list.
async fn get_chat(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let conversation_id = validate_history_query(&params)?;
    let messages = state.store.conversation_history(conversation_id).await?;
    Ok(Json(json!({ "messages": messages })))
}

/// The only supported GET shape is `?history&conversation_id=<id>`;
/// anything else is named in a client error.
fn validate_history_query(params: &HashMap<String, String>) -> Result<&str, ApiError> {
    if !params.contains_key("history") {
        return Err(ApiError::Unsupported(
            "GET /chat requires the history query parameter".to_string(),
        ));
    }
    if let Some(unknown) = params
        .keys()
        .find(|key| *key != "history" && *key != "conversation_id")
    {
        return Err(ApiError::Unsupported(format!(
            "unknown query parameter: {unknown}"
        )));
    }
    match params.get("conversation_id") {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(ApiError::Unsupported(
            "history query requires conversation_id".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::provider::{ModelError, ModelMessage, ModelResult, TurnEventStream, TurnRequest};

    struct OfflineProvider;

    #[async_trait::async_trait]
    impl ModelProvider for OfflineProvider {
        async fn create_message(&self, _request: &TurnRequest) -> ModelResult<ModelMessage> {
            Err(ModelError::InvalidResponse("offline".to_string()))
        }

        async fn stream_message(&self, _request: &TurnRequest) -> ModelResult<TurnEventStream> {
            Err(ModelError::InvalidResponse("offline".to_string()))
        }

        fn provider_name(&self) -> &str {
            "offline"
        }
    }

    async fn test_app() -> Router {
        let store = MessageStore::connect("sqlite::memory:").await.unwrap();
        router(AppState {
            store,
            provider: Arc::new(OfflineProvider),
            settings: Arc::new(Settings::default()),
        })
    }

    async fn post_chat_body(body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = test_app().await.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).expect("error responses must be JSON");
        (status, body)
    }

    #[tokio::test]
    async fn test_absent_message_field_yields_json_error() {
        let (status, body) = post_chat_body(r#"{"conversation_id": "c1"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("message"));
    }

    #[tokio::test]
    async fn test_empty_message_yields_json_error() {
        let (status, body) = post_chat_body(r#"{"message": "   "}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "message is required");
    }

    #[tokio::test]
    async fn test_malformed_body_yields_json_error() {
        let (status, body) = post_chat_body("{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some());
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_history_query_accepted() {
        let params = params(&[("history", ""), ("conversation_id", "conv-1")]);
        assert_eq!(validate_history_query(&params).unwrap(), "conv-1");
    }

    #[test]
    fn test_history_flag_required() {
        let params = params(&[("conversation_id", "conv-1")]);
        assert!(matches!(
            validate_history_query(&params),
            Err(ApiError::Unsupported(_))
        ));
    }

    #[test]
    fn test_conversation_id_required() {
        let params = params(&[("history", "")]);
        assert!(matches!(
            validate_history_query(&params),
            Err(ApiError::Unsupported(_))
        ));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let params = params(&[
            ("history", ""),
            ("conversation_id", "conv-1"),
            ("page", "2"),
        ]);
        let err = validate_history_query(&params).unwrap_err();
        assert!(err.to_string().contains("page"));
    }
}
