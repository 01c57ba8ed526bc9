// crates/core/src/summary.rs
//! Human-readable labels for tool invocations.
//!
//! Pure functions turning a raw tool name and its JSON input into the short
//! strings shown on the activity timeline. All truncation counts characters,
//! so multi-byte input is never split mid-codepoint.

use serde_json::Value;

/// Character budget for a completed tool's output summary.
pub const OUTPUT_SUMMARY_CHARS: usize = 500;

/// Placeholder used when there is nothing meaningful to show.
const ELLIPSIS: &str = "...";

/// Display name for a tool.
///
/// - `mcp__<server>__<tool>` becomes `mcp:<server>`
/// - `Task` becomes `Task:<subagent_type>` when the input names one
/// - everything else passes through unchanged
pub fn display_name(tool: &str, input: &Value) -> String {
    if tool.starts_with("mcp__") {
        let server = tool.split("__").nth(1).unwrap_or_default();
        return format!("mcp:{server}");
    }

    if tool == "Task" {
        return match str_field(input, "subagent_type") {
            Some(subagent) if !subagent.is_empty() => format!("Task:{subagent}"),
            _ => "Task".to_string(),
        };
    }

    tool.to_string()
}

/// One-line summary of a tool's input, keyed on the raw tool name.
pub fn input_summary(tool: &str, input: &Value) -> String {
    let Some(fields) = input.as_object().filter(|m| !m.is_empty()) else {
        return ELLIPSIS.to_string();
    };

    match tool {
        "Read" | "Edit" | "Write" => shorten_path(str_field(input, "file_path").unwrap_or_default()),
        "Glob" => str_field(input, "pattern").unwrap_or(ELLIPSIS).to_string(),
        "Grep" => match str_field(input, "pattern") {
            Some(p) if !p.is_empty() => format!("\"{}\"", take_chars(p, 30)),
            _ => ELLIPSIS.to_string(),
        },
        "Bash" => {
            let cmd = str_field(input, "command").unwrap_or_default();
            ellipsize(cmd, 50)
        }
        "Task" => match str_field(input, "description") {
            Some(d) => d.to_string(),
            None => take_chars(str_field(input, "prompt").unwrap_or(ELLIPSIS), 50).to_string(),
        },
        "WebFetch" => shorten_url(str_field(input, "url").unwrap_or_default()),
        "WebSearch" => take_chars(str_field(input, "query").unwrap_or(ELLIPSIS), 40).to_string(),
        "TodoWrite" => "Updating todos".to_string(),
        "AskUserQuestion" => "Asking question".to_string(),
        _ => fields
            .iter()
            .find_map(|(key, value)| {
                let value = value.as_str()?;
                let head = take_chars(value, 30);
                if value.chars().count() < 50 {
                    Some(format!("{key}: {head}"))
                } else {
                    Some(format!("{key}: {head}..."))
                }
            })
            .unwrap_or_else(|| ELLIPSIS.to_string()),
    }
}

/// Keep the last two path segments: `/a/b/c.py` becomes `.../b/c.py`.
pub fn shorten_path(path: &str) -> String {
    if path.is_empty() {
        return ELLIPSIS.to_string();
    }
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() <= 2 {
        return path.to_string();
    }
    format!(".../{}", parts[parts.len() - 2..].join("/"))
}

/// Reduce a URL to its host, or its first 30 characters when it has none.
pub fn shorten_url(url: &str) -> String {
    if url.is_empty() {
        return ELLIPSIS.to_string();
    }
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => host.to_string(),
            None => take_chars(url, 30).to_string(),
        },
        Err(_) => take_chars(url, 30).to_string(),
    }
}

/// Prefix-preserving truncation for output summaries. Appends `...` when
/// anything was cut.
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    ellipsize(output, max_chars)
}

fn ellipsize(s: &str, max_chars: usize) -> String {
    let head = take_chars(s, max_chars);
    if head.len() < s.len() {
        format!("{head}...")
    } else {
        head.to_string()
    }
}

/// Longest prefix of `s` holding at most `n` characters.
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn str_field<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input.get(key).and_then(Value::as_str)
}
