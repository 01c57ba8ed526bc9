// crates/core/src/activity.rs
//! Tool execution ledger.
//!
//! Tracks every tool invocation of a session from start to completion and
//! keeps the derived aggregates (per-tool counts, totals, the active tool and
//! the idle/running status) consistent with the timeline. Full tool outputs
//! live in a separate store so the timeline view stays small.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ActivityError;
use crate::summary::{display_name, input_summary, truncate_output, OUTPUT_SUMMARY_CHARS};

/// Lifecycle of one timeline entry. Entries only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Running,
    Completed,
}

/// Whether any tool of the session is currently in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[default]
    Idle,
    Running,
}

/// One tool invocation on the session timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub id: String,
    /// Display name (see [`display_name`]).
    pub tool: String,
    pub input: Value,
    pub input_summary: String,
    pub output_summary: Option<String>,
    pub duration_ms: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// `None` until the invocation completes.
    pub success: Option<bool>,
    pub status: EntryStatus,
}

/// The tool most recently started and not yet cleared by a completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveTool {
    pub name: String,
    pub input_summary: String,
    pub started_at: DateTime<Utc>,
}

/// Session-wide aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTotals {
    pub calls: u64,
    /// Sum of the durations of all completed invocations.
    pub duration_ms: u64,
    /// When the first tool of the session started.
    pub started_at: Option<DateTime<Utc>>,
}

/// Snapshot of a session's tool activity, served to polling clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionActivity {
    pub status: ActivityStatus,
    pub active_tool: Option<ActiveTool>,
    pub tool_counts: BTreeMap<String, u64>,
    /// Newest first, by insertion order.
    pub timeline: VecDeque<TimelineEntry>,
    pub totals: SessionTotals,
}

impl SessionActivity {
    pub fn running_count(&self) -> usize {
        self.timeline
            .iter()
            .filter(|e| e.status == EntryStatus::Running)
            .count()
    }
}

/// Full detail for one tool call, including its untruncated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDetail {
    pub id: String,
    pub tool: String,
    pub input: Value,
    pub output: Option<String>,
    pub duration_ms: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub success: Option<bool>,
}

/// Append-and-update store of tool invocations plus the full-output store.
#[derive(Debug, Default)]
pub struct ActivityLedger {
    activity: SessionActivity,
    outputs: HashMap<String, String>,
}

impl ActivityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a tool invocation, stamped with the current time.
    pub fn start_execution(&mut self, call_id: &str, tool_name: &str, input: Value) -> bool {
        self.start_execution_at(call_id, tool_name, input, Utc::now())
    }

    /// Record the start of a tool invocation at `now`.
    ///
    /// Returns `false` (and changes nothing) when an entry with this id is
    /// already on the timeline. Unique ids win over `totals.calls` counting
    /// every start call.
    pub fn start_execution_at(
        &mut self,
        call_id: &str,
        tool_name: &str,
        input: Value,
        now: DateTime<Utc>,
    ) -> bool {
        if self.activity.timeline.iter().any(|e| e.id == call_id) {
            tracing::warn!(call_id, tool = tool_name, "duplicate tool start ignored");
            return false;
        }

        let name = display_name(tool_name, &input);
        let summary = input_summary(tool_name, &input);

        self.activity.status = ActivityStatus::Running;
        self.activity.active_tool = Some(ActiveTool {
            name: name.clone(),
            input_summary: summary.clone(),
            started_at: now,
        });
        self.activity.totals.started_at.get_or_insert(now);

        *self.activity.tool_counts.entry(name.clone()).or_insert(0) += 1;
        self.activity.totals.calls += 1;

        tracing::debug!(call_id, tool = %name, summary = %summary, "tool started");

        self.activity.timeline.push_front(TimelineEntry {
            id: call_id.to_string(),
            tool: name,
            input,
            input_summary: summary,
            output_summary: None,
            duration_ms: None,
            started_at: now,
            ended_at: None,
            success: None,
            status: EntryStatus::Running,
        });
        true
    }

    /// Record the completion of a tool invocation, stamped with the current time.
    pub fn complete_execution(&mut self, call_id: &str, success: bool, output: &str) -> bool {
        self.complete_execution_at(call_id, success, output, Utc::now())
    }

    /// Record the completion of a tool invocation at `now`.
    ///
    /// Only the `Running` entry with this id is touched. When there is none
    /// (unknown id, or already completed) nothing changes and `false` is
    /// returned. A matching completion clears `active_tool` even when other
    /// invocations are still running.
    pub fn complete_execution_at(
        &mut self,
        call_id: &str,
        success: bool,
        output: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(entry) = self
            .activity
            .timeline
            .iter_mut()
            .find(|e| e.id == call_id && e.status == EntryStatus::Running)
        else {
            tracing::debug!(call_id, "completion without running entry ignored");
            return false;
        };

        let duration_ms = (now - entry.started_at).num_milliseconds().max(0) as u64;
        entry.ended_at = Some(now);
        entry.duration_ms = Some(duration_ms);
        entry.success = Some(success);
        entry.status = EntryStatus::Completed;
        entry.output_summary =
            (!output.is_empty()).then(|| truncate_output(output, OUTPUT_SUMMARY_CHARS));

        tracing::debug!(call_id, tool = %entry.tool, success, duration_ms, "tool completed");

        self.activity.totals.duration_ms += duration_ms;
        if !output.is_empty() {
            self.outputs.insert(call_id.to_string(), output.to_string());
        }

        self.activity.active_tool = None;
        if self.activity.running_count() == 0 {
            self.activity.status = ActivityStatus::Idle;
        }
        true
    }

    /// Full entry plus untruncated output for one call.
    pub fn drill_down(&self, call_id: &str) -> Result<ToolCallDetail, ActivityError> {
        let entry = self
            .activity
            .timeline
            .iter()
            .find(|e| e.id == call_id)
            .ok_or_else(|| ActivityError::NotFound {
                call_id: call_id.to_string(),
            })?;

        let output = self
            .outputs
            .get(call_id)
            .cloned()
            .or_else(|| entry.output_summary.clone());

        Ok(ToolCallDetail {
            id: entry.id.clone(),
            tool: entry.tool.clone(),
            input: entry.input.clone(),
            output,
            duration_ms: entry.duration_ms,
            started_at: entry.started_at,
            ended_at: entry.ended_at,
            success: entry.success,
        })
    }

    /// Clone of the current activity for readers.
    pub fn snapshot(&self) -> SessionActivity {
        self.activity.clone()
    }

    pub fn activity(&self) -> &SessionActivity {
        &self.activity
    }

    /// Drop every entry and stored output.
    pub fn reset(&mut self) {
        self.activity = SessionActivity::default();
        self.outputs.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
