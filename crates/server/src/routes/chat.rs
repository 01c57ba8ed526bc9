// crates/server/src/routes/chat.rs
//! Chat endpoints: run a turn, read or reset the conversation.

use std::sync::Arc;

use agent_pulse_core::{
    validate_model, ChatMessage, ExecutionLogEntry, SessionInfo, TurnMetadata,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub model: Option<String>,
}

/// Session accounting attached to every chat reply.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct SessionSummary {
    pub total_cost_usd: f64,
    pub context_tokens: u64,
    pub context_window: u64,
    pub message_count: usize,
    pub model: Option<String>,
}

impl SessionSummary {
    fn from_info(info: &SessionInfo) -> Self {
        Self {
            total_cost_usd: info.metadata.total_cost_usd,
            context_tokens: info.metadata.context_tokens,
            context_window: info.metadata.context_window,
            message_count: info.message_count,
            model: info.metadata.current_model.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub execution_log: Vec<ExecutionLogEntry>,
    pub metadata: TurnMetadata,
    pub session: SessionSummary,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ClearedResponse {
    pub status: &'static str,
    pub session_reset: bool,
    pub session: SessionSummary,
}

/// POST /api/chat - Run one turn and wait for it to finish.
///
/// Tool activity is observable through `/api/activity` while this request
/// is in flight.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if !state.claude_available() {
        return Err(ApiError::Unavailable(
            "Claude Code is not available on this host".to_string(),
        ));
    }
    if body.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }
    if let Some(model) = &body.model {
        validate_model(model)?;
    }

    let outcome = state
        .session
        .run_turn(&state.runner, &body.message, body.model.as_deref())
        .await?;

    Ok(Json(ChatResponse {
        response: outcome.response,
        execution_log: outcome.execution_log,
        metadata: outcome.metadata,
        session: SessionSummary::from_info(&state.session.info()),
        timestamp: Utc::now(),
    }))
}

/// GET /api/chat/history
async fn history(State(state): State<Arc<AppState>>) -> Json<Vec<ChatMessage>> {
    Json(state.session.history())
}

/// DELETE /api/chat/history - Reset conversation, accounting and activity.
async fn clear_history(State(state): State<Arc<AppState>>) -> Json<ClearedResponse> {
    state.session.reset();
    Json(ClearedResponse {
        status: "cleared",
        session_reset: true,
        session: SessionSummary::from_info(&state.session.info()),
    })
}

/// GET /api/chat/session
async fn session_info(State(state): State<Arc<AppState>>) -> Json<SessionInfo> {
    Json(state.session.info())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/chat/history", get(history).delete(clear_history))
        .route("/chat/session", get(session_info))
}
