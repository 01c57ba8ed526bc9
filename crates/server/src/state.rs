// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use agent_pulse_core::{AgentSession, TurnRunner};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub agent_name: String,
    /// The one conversation this agent hosts.
    pub session: Arc<AgentSession>,
    pub runner: TurnRunner,
    /// `<cli> --version` output captured at startup; `None` when the CLI
    /// could not be run.
    pub claude_version: Option<String>,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(
        agent_name: impl Into<String>,
        session: AgentSession,
        runner: TurnRunner,
        claude_version: Option<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            agent_name: agent_name.into(),
            session: Arc::new(session),
            runner,
            claude_version,
        })
    }

    pub fn claude_available(&self) -> bool {
        self.claude_version.is_some()
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
