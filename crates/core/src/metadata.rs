// crates/core/src/metadata.rs
//! Session-level cost and context accounting.

use serde::{Deserialize, Serialize};

use crate::envelope::TurnResult;
use crate::error::ModelError;

/// Context window assumed until the agent reports one.
pub const DEFAULT_CONTEXT_WINDOW: u64 = 200_000;

/// Model aliases accepted by [`validate_model`], with or without the `[1m]`
/// long-context suffix.
pub const MODEL_ALIASES: &[&str] = &["sonnet", "opus", "haiku"];

/// Running totals for one session.
///
/// Cost and output tokens accumulate across turns. Context tokens and the
/// context window describe current occupancy, so each result overwrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub total_cost_usd: f64,
    pub total_output_tokens: u64,
    pub context_tokens: u64,
    pub context_window: u64,
    pub current_model: Option<String>,
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            total_cost_usd: 0.0,
            total_output_tokens: 0,
            context_tokens: 0,
            context_window: DEFAULT_CONTEXT_WINDOW,
            current_model: None,
        }
    }
}

impl SessionMetadata {
    pub fn with_model(model: Option<String>) -> Self {
        Self {
            current_model: model,
            ..Self::default()
        }
    }

    /// Fold one terminal result into the totals.
    pub fn record_result(&mut self, result: &TurnResult) {
        self.total_cost_usd += result.cost_usd.unwrap_or(0.0);
        self.total_output_tokens += result.usage.output_tokens;
        self.context_tokens = result.usage.context_tokens();
        if let Some(window) = result.context_window {
            self.context_window = window;
        }
    }

    /// Zero the conversation accounting. The selected model survives.
    pub fn reset(&mut self) {
        *self = Self::with_model(self.current_model.take());
    }

    /// Percentage of the context window in use, rounded to one decimal.
    pub fn context_percent(&self) -> f64 {
        if self.context_window == 0 {
            return 0.0;
        }
        let pct = self.context_tokens as f64 / self.context_window as f64 * 100.0;
        (pct * 10.0).round() / 10.0
    }
}

/// Accept a model alias (`sonnet`, `opus[1m]`, ...) or a full `claude-*` id.
pub fn validate_model(model: &str) -> Result<(), ModelError> {
    let base = model.strip_suffix("[1m]").unwrap_or(model);
    if MODEL_ALIASES.contains(&base) || model.starts_with("claude-") {
        Ok(())
    } else {
        Err(ModelError::Invalid(model.to_string()))
    }
}
