// crates/core/src/envelope.rs
//! Stream-json envelope parser.
//!
//! The agent CLI, run with `--output-format stream-json`, writes one JSON
//! object per line:
//! ```json
//! {"type": "system", "subtype": "init", "session_id": "..."}
//! {"type": "assistant", "message": {"content": [{"type": "tool_use", ...}]}}
//! {"type": "user", "message": {"content": [{"type": "tool_result", ...}]}}
//! {"type": "result", "total_cost_usd": 0.003, "usage": {...}, "modelUsage": {...}}
//! ```
//! [`parse_line`] decodes one line into typed [`ExecutionEvent`]s. Lines that
//! fail to decode are reported as [`EnvelopeError`] for the caller to log and
//! skip; they never stop the stream.

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EnvelopeError;

/// One typed event decoded from the agent's output stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    /// The agent announced its conversation id.
    Init { session_id: Option<String> },
    /// A tool invocation started.
    ToolStarted {
        call_id: String,
        tool_name: String,
        input: Value,
    },
    /// A tool invocation finished.
    ToolCompleted {
        call_id: String,
        success: bool,
        output: String,
    },
    /// A piece of assistant prose.
    TextChunk { text: String },
    /// Terminal summary of a turn.
    Result(TurnResult),
}

/// Payload of the terminal `result` envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnResult {
    pub cost_usd: Option<f64>,
    pub duration_ms: Option<u64>,
    pub num_turns: Option<u32>,
    /// Final response text; supersedes accumulated text chunks when non-empty.
    pub result_text: Option<String>,
    pub usage: TokenUsage,
    /// First context-window size reported under `modelUsage`, if any.
    pub context_window: Option<u64>,
}

/// Token counts reported for one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl TokenUsage {
    /// Tokens occupying the context window: fresh input plus both cache buckets.
    pub fn context_tokens(&self) -> u64 {
        self.input_tokens + self.cache_creation_tokens + self.cache_read_tokens
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawEnvelope {
    Init {
        #[serde(default)]
        session_id: Option<String>,
    },
    System {
        #[serde(default)]
        subtype: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
    },
    Assistant {
        #[serde(default)]
        message: Option<RawMessage>,
    },
    User {
        #[serde(default)]
        message: Option<RawMessage>,
    },
    Result(RawResult),
    #[serde(other)]
    Other,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<RawContent>,
}

/// `message.content` is a block list on tool traffic and a bare string on
/// plain prompts. The string form carries no events.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawContent {
    Blocks(Vec<RawBlock>),
    Text(IgnoredAny),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawBlock {
    ToolUse {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        input: Option<Value>,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: Option<String>,
        #[serde(default)]
        is_error: Option<bool>,
        #[serde(default)]
        content: Option<Value>,
    },
    Text {
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    total_cost_usd: Option<f64>,
    #[serde(default)]
    duration_ms: Option<u64>,
    #[serde(default)]
    num_turns: Option<u32>,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    usage: Option<RawUsage>,
    #[serde(default, rename = "modelUsage")]
    model_usage: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Decode one stream line into zero or more execution events.
///
/// Blank lines and envelope types the tracker does not care about yield an
/// empty vector. Anything that is not a JSON object with a `type` field is a
/// [`EnvelopeError::MalformedLine`].
pub fn parse_line(line: &str) -> Result<Vec<ExecutionEvent>, EnvelopeError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let envelope: RawEnvelope =
        serde_json::from_str(trimmed).map_err(|e| EnvelopeError::malformed(trimmed, e))?;

    let events = match envelope {
        RawEnvelope::Init { session_id } => vec![ExecutionEvent::Init { session_id }],
        RawEnvelope::System {
            subtype,
            session_id,
        } if subtype.as_deref() == Some("init") => vec![ExecutionEvent::Init { session_id }],
        RawEnvelope::System { .. } | RawEnvelope::Other => Vec::new(),
        RawEnvelope::Assistant { message } | RawEnvelope::User { message } => {
            message.map(message_events).unwrap_or_default()
        }
        RawEnvelope::Result(raw) => vec![ExecutionEvent::Result(turn_result(raw))],
    };

    Ok(events)
}

fn message_events(message: RawMessage) -> Vec<ExecutionEvent> {
    let blocks = match message.content {
        Some(RawContent::Blocks(blocks)) => blocks,
        Some(RawContent::Text(_)) | None => return Vec::new(),
    };

    blocks
        .into_iter()
        .filter_map(|block| match block {
            RawBlock::ToolUse { id, name, input } => Some(ExecutionEvent::ToolStarted {
                call_id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                tool_name: name.unwrap_or_else(|| "Unknown".to_string()),
                input: input.unwrap_or_else(|| Value::Object(Map::new())),
            }),
            RawBlock::ToolResult {
                tool_use_id,
                is_error,
                content,
            } => Some(ExecutionEvent::ToolCompleted {
                call_id: tool_use_id.unwrap_or_default(),
                success: !is_error.unwrap_or(false),
                output: content.as_ref().map(result_text).unwrap_or_default(),
            }),
            RawBlock::Text { text } => text
                .filter(|t| !t.is_empty())
                .map(|text| ExecutionEvent::TextChunk { text }),
            RawBlock::Other => None,
        })
        .collect()
}

/// Output of a `tool_result` block: the first text item of a content list,
/// or the content itself when it is a plain string.
fn result_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .find(|item| item.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|item| item.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}

fn turn_result(raw: RawResult) -> TurnResult {
    let usage = raw.usage.unwrap_or_default();
    let context_window = raw.model_usage.as_ref().and_then(|models| {
        models
            .values()
            .find_map(|model| model.get("contextWindow").and_then(Value::as_u64))
    });

    TurnResult {
        cost_usd: raw.total_cost_usd,
        duration_ms: raw.duration_ms,
        num_turns: raw.num_turns,
        result_text: raw.result,
        usage: TokenUsage {
            input_tokens: usage.input_tokens.unwrap_or(0),
            output_tokens: usage.output_tokens.unwrap_or(0),
            cache_creation_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
            cache_read_tokens: usage.cache_read_input_tokens.unwrap_or(0),
        },
        context_window,
    }
}

// ---------------------------------------------------------------------------
// Response text
// ---------------------------------------------------------------------------

/// Final response text of a turn.
///
/// Text chunks accumulate in arrival order and are newline-joined; a
/// non-empty `result` text replaces everything accumulated so far.
#[derive(Debug, Clone, Default)]
pub struct ResponseText {
    parts: Vec<String>,
}

impl ResponseText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, text: &str) {
        if !text.is_empty() {
            self.parts.push(text.to_string());
        }
    }

    pub fn supersede(&mut self, text: &str) {
        if !text.is_empty() {
            self.parts.clear();
            self.parts.push(text.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn text(&self) -> String {
        self.parts.join("\n")
    }
}
