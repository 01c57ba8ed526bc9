// crates/server/src/main.rs
//! Agent-pulse server binary.
//!
//! Reads configuration from the environment, checks that the agent CLI runs,
//! then serves the HTTP API until shut down.

use anyhow::{Context, Result};
use agent_pulse_core::{AgentCommand, AgentSession, TurnRunner};
use agent_pulse_observability::init_tracing;
use agent_pulse_server::{create_app, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env();
    let _logging = init_tracing(&config.log)?;

    let command = AgentCommand::claude(config.cli_path.clone()).with_timeout(config.turn_timeout);
    let claude_version = command.version().await;
    match &claude_version {
        Some(version) => tracing::info!(cli = %config.cli_path, version = %version, "agent CLI available"),
        None => tracing::warn!(cli = %config.cli_path, "agent CLI not available; chat requests will be rejected"),
    }

    let state = AppState::new(
        config.agent_name.clone(),
        AgentSession::new(config.initial_model.clone()),
        TurnRunner::new(command),
        claude_version,
    );
    let app = create_app(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        agent = %config.agent_name,
        model = ?config.initial_model,
        turn_timeout_secs = ?config.turn_timeout.map(|d| d.as_secs()),
        "agent-pulse listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("agent-pulse stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
