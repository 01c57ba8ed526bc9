// crates/server/src/config.rs
//! Environment-driven server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use agent_pulse_core::DEFAULT_TURN_TIMEOUT_SECS;
use agent_pulse_observability::{LogConfig, LogFormat};

/// Default port for the server.
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub agent_name: String,
    /// Model selected at startup; `None` lets the CLI pick.
    pub initial_model: Option<String>,
    pub cli_path: String,
    /// `None` lets a turn run without a wall-clock limit.
    pub turn_timeout: Option<Duration>,
    pub log: LogConfig,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = non_empty("AGENT_PULSE_PORT")
            .or_else(|| non_empty("PORT"))
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let host = non_empty("AGENT_PULSE_HOST")
            .and_then(|h| h.trim().parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let timeout_secs = non_empty("AGENT_TURN_TIMEOUT_SECS")
            .and_then(|t| t.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_TURN_TIMEOUT_SECS);

        let log = LogConfig {
            level: non_empty("AGENT_PULSE_LOG").unwrap_or_else(|| "info".to_string()),
            format: non_empty("AGENT_PULSE_LOG_FORMAT")
                .and_then(|f| f.parse().ok())
                .unwrap_or(LogFormat::Compact),
            log_dir: non_empty("AGENT_PULSE_LOG_DIR").map(PathBuf::from),
        };

        Self {
            host,
            port,
            agent_name: non_empty("AGENT_NAME").unwrap_or_else(|| "unknown".to_string()),
            initial_model: non_empty("CLAUDE_MODEL"),
            cli_path: non_empty("CLAUDE_CLI_PATH").unwrap_or_else(|| "claude".to_string()),
            turn_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            log,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
