// crates/server/src/routes/agent.rs
//! Agent identity endpoint.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct AgentInfo {
    pub name: String,
    pub status: String,
    pub claude_version: Option<String>,
    pub version: String,
    pub uptime_secs: u64,
}

/// GET /api/agent/info
async fn agent_info(State(state): State<Arc<AppState>>) -> Json<AgentInfo> {
    Json(AgentInfo {
        name: state.agent_name.clone(),
        status: "running".to_string(),
        claude_version: state.claude_version.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/agent/info", get(agent_info))
}
