//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    CancelResponse, ChatRequest, ChatResponse, ConversationResponse, ErrorResponse, ModelInfo,
    ModelsResponse, RegenerateRequest, SettingsBody, SuccessResponse,
};
use super::AppState;
use crate::conversation::router_message_id;
use crate::llm::{all_models, GenerationParams, DEFAULT_MODEL};
use crate::runtime::{DispatchError, SseEvent};
use crate::state_machine::{message_reply_id, Event, TransitionError};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Conversation retrieval
        .route("/api/conversation", get(get_conversation))
        // SSE streaming
        .route("/api/conversation/stream", get(stream_conversation))
        // User actions
        .route("/api/conversation/messages", post(send_message))
        .route("/api/conversation/cancel", post(cancel_turn))
        .route("/api/conversation/regenerate", post(regenerate))
        // Lifecycle
        .route("/api/conversation/clear", post(clear_conversation))
        .route("/api/conversation/new", post(new_conversation))
        // Generation settings
        .route("/api/settings", get(get_settings).put(put_settings))
        // Model info
        .route("/api/models", get(list_models))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

/// Fresh turn id; message ids derive from it
fn new_turn_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ============================================================
// Conversation Retrieval
// ============================================================

async fn get_conversation(State(state): State<AppState>) -> Json<ConversationResponse> {
    let snapshot = state.runtime.snapshot().await;
    Json(ConversationResponse {
        messages: snapshot.messages,
        phase: snapshot.phase,
        technology: snapshot.technology,
        estimated_tokens: snapshot.estimated_tokens,
        busy: snapshot.busy,
    })
}

async fn stream_conversation(State(state): State<AppState>) -> impl IntoResponse {
    // Subscribe first so nothing falls between the snapshot and the stream
    let broadcast_rx = state.runtime.subscribe();
    let snapshot = state.runtime.snapshot().await;
    sse_stream(SseEvent::Init { snapshot }, broadcast_rx)
}

// ============================================================
// User Actions
// ============================================================

async fn send_message(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.text.trim().is_empty() {
        return Err(AppError::BadRequest("Message text is empty".to_string()));
    }

    let turn_id = new_turn_id();
    let snapshot = state.runtime.snapshot().await;
    let reply_id = message_reply_id(snapshot.phase, snapshot.technology.as_deref(), &turn_id);
    state
        .runtime
        .dispatch(Event::UserMessage {
            turn_id,
            text: req.text,
        })
        .await?;

    Ok(Json(ChatResponse {
        queued: true,
        reply_id,
    }))
}

async fn cancel_turn(State(state): State<AppState>) -> Result<Json<CancelResponse>, AppError> {
    state.runtime.dispatch(Event::Cancel).await?;
    Ok(Json(CancelResponse { ok: true }))
}

async fn regenerate(
    State(state): State<AppState>,
    Json(req): Json<RegenerateRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let turn_id = new_turn_id();
    let reply_id = router_message_id(&turn_id);
    state
        .runtime
        .dispatch(Event::Regenerate {
            message_id: req.message_id,
            turn_id,
        })
        .await?;

    Ok(Json(ChatResponse {
        queued: true,
        reply_id,
    }))
}

// ============================================================
// Lifecycle
// ============================================================

async fn clear_conversation(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.runtime.dispatch(Event::Clear).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn new_conversation(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse>, AppError> {
    let greeting_id = format!("msg-{}-greeting", new_turn_id());
    state
        .runtime
        .dispatch(Event::NewConversation { greeting_id })
        .await?;
    Ok(Json(SuccessResponse { success: true }))
}

// ============================================================
// Settings
// ============================================================

fn settings_body(params: GenerationParams) -> SettingsBody {
    SettingsBody {
        temperature: params.temperature,
        max_tokens: params.max_tokens,
        top_p: params.top_p,
    }
}

async fn get_settings(State(state): State<AppState>) -> Json<SettingsBody> {
    Json(settings_body(state.runtime.settings().await))
}

async fn put_settings(
    State(state): State<AppState>,
    Json(body): Json<SettingsBody>,
) -> Result<Json<SettingsBody>, AppError> {
    let stored = state
        .runtime
        .update_settings(GenerationParams {
            temperature: body.temperature,
            max_tokens: body.max_tokens,
            top_p: body.top_p,
        })
        .await?;
    Ok(Json(settings_body(stored)))
}

// ============================================================
// Model Info
// ============================================================

async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = all_models()
        .iter()
        .map(|m| ModelInfo {
            id: m.id.to_string(),
            description: m.description.to_string(),
        })
        .collect();

    Json(ModelsResponse {
        models,
        default: DEFAULT_MODEL.to_string(),
        active: state.model_id.clone(),
    })
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("tech-router ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<DispatchError> for AppError {
    fn from(error: DispatchError) -> Self {
        let message = error.to_string();
        match error {
            DispatchError::Rejected(
                TransitionError::AgentBusy | TransitionError::CancellationInProgress,
            ) => AppError::Conflict(message),
            DispatchError::Rejected(TransitionError::MessageNotFound(_)) => {
                AppError::NotFound(message)
            }
            DispatchError::Rejected(_) => AppError::BadRequest(message),
            DispatchError::Closed => AppError::Internal(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
