// crates/server/src/routes/activity.rs
//! Session activity endpoints, polled while a turn runs.

use std::sync::Arc;

use agent_pulse_core::{SessionActivity, ToolCallDetail};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ActivityCleared {
    pub status: &'static str,
    pub message: &'static str,
}

/// GET /api/activity - Snapshot of the tool timeline and aggregates.
async fn get_activity(State(state): State<Arc<AppState>>) -> Json<SessionActivity> {
    Json(state.session.activity())
}

/// GET /api/activity/{tool_id} - Full input and output of one tool call.
async fn get_tool_call(
    State(state): State<Arc<AppState>>,
    Path(tool_id): Path<String>,
) -> ApiResult<Json<ToolCallDetail>> {
    Ok(Json(state.session.drill_down(&tool_id)?))
}

/// DELETE /api/activity - Clear tool activity; conversation history stays.
async fn clear_activity(State(state): State<Arc<AppState>>) -> Json<ActivityCleared> {
    state.session.clear_activity();
    Json(ActivityCleared {
        status: "cleared",
        message: "Session activity cleared",
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activity", get(get_activity).delete(clear_activity))
        .route("/activity/{tool_id}", get(get_tool_call))
}
