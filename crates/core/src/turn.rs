// crates/core/src/turn.rs
//! Per-turn bookkeeping: the execution log, turn metadata and the response
//! text handed back to the caller once the agent process exits.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::{ExecutionEvent, ResponseText};
use crate::metadata::DEFAULT_CONTEXT_WINDOW;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryKind {
    ToolUse,
    ToolResult,
}

/// One `tool_use` or `tool_result` observed during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LogEntryKind,
    /// Raw tool name as reported by the agent.
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Figures reported for a single turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnMetadata {
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub num_turns: Option<u32>,
    pub tool_count: usize,
    pub session_id: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub context_window: u64,
}

impl Default for TurnMetadata {
    fn default() -> Self {
        Self {
            cost_usd: None,
            duration_ms: None,
            num_turns: None,
            tool_count: 0,
            session_id: None,
            input_tokens: 0,
            output_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

impl TurnMetadata {
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }
}

/// Result of a successful turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub response: String,
    pub execution_log: Vec<ExecutionLogEntry>,
    pub metadata: TurnMetadata,
}

/// Collects what one turn produced while its events stream by.
#[derive(Debug, Default)]
pub struct TurnRecorder {
    log: Vec<ExecutionLogEntry>,
    started: HashMap<String, (String, DateTime<Utc>)>,
    metadata: TurnMetadata,
    response: ResponseText,
}

impl TurnRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: &ExecutionEvent) {
        self.record_at(event, Utc::now());
    }

    pub fn record_at(&mut self, event: &ExecutionEvent, now: DateTime<Utc>) {
        match event {
            ExecutionEvent::Init { session_id } => {
                self.metadata.session_id = session_id.clone();
            }
            ExecutionEvent::ToolStarted {
                call_id,
                tool_name,
                input,
            } => {
                self.started
                    .insert(call_id.clone(), (tool_name.clone(), now));
                self.metadata.tool_count += 1;
                self.log.push(ExecutionLogEntry {
                    id: call_id.clone(),
                    kind: LogEntryKind::ToolUse,
                    tool: tool_name.clone(),
                    input: Some(input.clone()),
                    success: None,
                    duration_ms: None,
                    timestamp: now,
                });
            }
            ExecutionEvent::ToolCompleted {
                call_id, success, ..
            } => {
                let (tool, duration_ms) = match self.started.get(call_id) {
                    Some((tool, at)) => (
                        tool.clone(),
                        Some((now - *at).num_milliseconds().max(0) as u64),
                    ),
                    None => ("Unknown".to_string(), None),
                };
                self.log.push(ExecutionLogEntry {
                    id: call_id.clone(),
                    kind: LogEntryKind::ToolResult,
                    tool,
                    input: None,
                    success: Some(*success),
                    duration_ms,
                    timestamp: now,
                });
            }
            ExecutionEvent::TextChunk { text } => self.response.push_chunk(text),
            ExecutionEvent::Result(result) => {
                self.metadata.cost_usd = result.cost_usd;
                self.metadata.duration_ms = result.duration_ms;
                self.metadata.num_turns = result.num_turns;
                self.metadata.input_tokens = result.usage.input_tokens;
                self.metadata.output_tokens = result.usage.output_tokens;
                self.metadata.cache_creation_tokens = result.usage.cache_creation_tokens;
                self.metadata.cache_read_tokens = result.usage.cache_read_tokens;
                if let Some(window) = result.context_window {
                    self.metadata.context_window = window;
                }
                if let Some(text) = &result.result_text {
                    self.response.supersede(text);
                }
            }
        }
    }

    pub fn has_response(&self) -> bool {
        !self.response.is_empty()
    }

    pub fn finish(self) -> TurnOutcome {
        TurnOutcome {
            response: self.response.text(),
            execution_log: self.log,
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One message of the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
