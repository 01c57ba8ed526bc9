// crates/core/src/error.rs
use thiserror::Error;

/// Maximum number of characters of an offending line kept in a
/// [`EnvelopeError::MalformedLine`] for logging.
pub const LINE_PREVIEW_CHARS: usize = 100;

/// Maximum number of stderr characters carried by [`TurnError::ExitNonZero`].
pub const STDERR_EXCERPT_CHARS: usize = 200;

/// Errors produced while decoding one line of the agent's event stream.
///
/// These never escape the line being parsed: the stream reader logs them
/// and moves on to the next line.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Malformed stream line ({message}): {preview}")]
    MalformedLine { preview: String, message: String },
}

impl EnvelopeError {
    pub fn malformed(line: &str, source: serde_json::Error) -> Self {
        Self::MalformedLine {
            preview: line.chars().take(LINE_PREVIEW_CHARS).collect(),
            message: source.to_string(),
        }
    }
}

/// Errors from session-activity lookups.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("Tool call {call_id} not found")]
    NotFound { call_id: String },
}

/// Errors from explicit model selection.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Invalid model: {0}. Use aliases (sonnet, opus, haiku) or full model names.")]
    Invalid(String),
}

/// Errors that end a turn. Tool activity recorded before the failure stays
/// in the session ledger.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Failed to launch agent process `{program}`: {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Agent process exited with {label}: {stderr}", label = exit_label(.code))]
    ExitNonZero { code: Option<i32>, stderr: String },

    #[error("Agent returned empty response")]
    EmptyResponse,

    #[error("Agent process timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error talking to agent process: {0}")]
    Io(#[from] std::io::Error),

    #[error("Turn task aborted: {0}")]
    Aborted(String),
}

impl TurnError {
    /// Build an [`TurnError::ExitNonZero`] keeping only the head of stderr.
    pub fn exit_non_zero(code: Option<i32>, stderr: &str) -> Self {
        let excerpt = stderr.trim();
        let excerpt = if excerpt.is_empty() {
            "Unknown error".to_string()
        } else {
            excerpt.chars().take(STDERR_EXCERPT_CHARS).collect()
        };
        Self::ExitNonZero {
            code,
            stderr: excerpt,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => "signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_line_preview_is_truncated() {
        let line = "x".repeat(500);
        let source = serde_json::from_str::<serde_json::Value>(&line).unwrap_err();
        let EnvelopeError::MalformedLine { preview, .. } = EnvelopeError::malformed(&line, source);
        assert_eq!(preview.chars().count(), LINE_PREVIEW_CHARS);
    }

    #[test]
    fn test_exit_non_zero_keeps_stderr_head() {
        let stderr = format!("boom {}", "y".repeat(1000));
        let err = TurnError::exit_non_zero(Some(2), &stderr);
        match &err {
            TurnError::ExitNonZero { code, stderr } => {
                assert_eq!(*code, Some(2));
                assert!(stderr.starts_with("boom"));
                assert_eq!(stderr.chars().count(), STDERR_EXCERPT_CHARS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("exit code 2"));
    }

    #[test]
    fn test_exit_non_zero_empty_stderr() {
        let err = TurnError::exit_non_zero(None, "  \n");
        assert!(err.to_string().contains("Unknown error"));
        assert!(err.to_string().contains("signal"));
    }

    #[test]
    fn test_activity_not_found_display() {
        let err = ActivityError::NotFound {
            call_id: "toolu_1".into(),
        };
        assert_eq!(err.to_string(), "Tool call toolu_1 not found");
    }
}
