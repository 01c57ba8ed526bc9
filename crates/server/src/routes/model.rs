// crates/server/src/routes/model.rs
//! Model selection API routes.

use std::sync::Arc;

use agent_pulse_core::MODEL_ALIASES;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ModelRequest {
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct ModelResponse {
    pub model: Option<String>,
    pub available_models: &'static [&'static str],
    pub note: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ModelUpdated {
    pub status: &'static str,
    pub model: Option<String>,
    pub note: &'static str,
}

/// GET /api/model - Current model selection.
async fn get_model(State(state): State<Arc<AppState>>) -> Json<ModelResponse> {
    Json(ModelResponse {
        model: state.session.current_model(),
        available_models: MODEL_ALIASES,
        note: "Add a [1m] suffix for 1M context (e.g. sonnet[1m]), or pass a full claude-* model id",
    })
}

/// PUT /api/model - Select the model for subsequent turns.
async fn set_model(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ModelRequest>,
) -> ApiResult<Json<ModelUpdated>> {
    state.session.set_model(body.model.trim())?;
    Ok(Json(ModelUpdated {
        status: "success",
        model: state.session.current_model(),
        note: "Model will be used for subsequent messages",
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/model", get(get_model).put(set_model))
}
