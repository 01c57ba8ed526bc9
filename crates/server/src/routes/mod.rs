//! API route handlers for the agent-pulse server.

pub mod activity;
pub mod agent;
pub mod chat;
pub mod health;
pub mod model;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET    /health - Liveness plus CLI availability
/// - GET    /api/agent/info - Agent name, CLI version, uptime
/// - POST   /api/chat - Run one turn
/// - GET    /api/chat/history - Conversation history
/// - DELETE /api/chat/history - Reset the whole session
/// - GET    /api/chat/session - Cost and context accounting
/// - GET    /api/model - Current model
/// - PUT    /api/model - Select a model
/// - GET    /api/activity - Tool activity snapshot
/// - DELETE /api/activity - Clear tool activity only
/// - GET    /api/activity/{tool_id} - Full detail for one tool call
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api", agent::router())
        .nest("/api", chat::router())
        .nest("/api", model::router())
        .nest("/api", activity::router())
        .with_state(state)
}
