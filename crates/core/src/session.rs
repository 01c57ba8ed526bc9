// crates/core/src/session.rs
//! Session context shared between the turn reader and request handlers.
//!
//! The reader task applies events under a short write lock, one event at a
//! time; handlers take a read lock and clone a snapshot. No lock is held
//! across an `.await`. Turns are serialized by a separate async mutex.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::activity::{ActivityLedger, SessionActivity, ToolCallDetail};
use crate::envelope::ExecutionEvent;
use crate::error::{ActivityError, ModelError, TurnError};
use crate::metadata::{validate_model, SessionMetadata};
use crate::runner::{EventSink, LaunchConfig, TurnRunner};
use crate::turn::{ChatMessage, Role, TurnOutcome};

/// Lifecycle of the most recent turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TurnState {
    NotStarted = 0,
    Running = 1,
    Succeeded = 2,
    Failed = 3,
}

impl TurnState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Running,
            2 => Self::Succeeded,
            3 => Self::Failed,
            _ => Self::NotStarted,
        }
    }
}

#[derive(Debug, Default)]
struct SessionState {
    ledger: ActivityLedger,
    metadata: SessionMetadata,
    history: Vec<ChatMessage>,
    session_started: bool,
    agent_session_id: Option<String>,
}

/// Read-only view of the session's accounting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub session_started: bool,
    pub message_count: usize,
    pub agent_session_id: Option<String>,
    pub turn_state: TurnState,
    #[serde(flatten)]
    pub metadata: SessionMetadata,
    pub context_percent: f64,
}

/// One conversation with the agent: its activity ledger, cost accounting and
/// message history.
pub struct AgentSession {
    state: RwLock<SessionState>,
    turn_guard: tokio::sync::Mutex<()>,
    turn_state: AtomicU8,
}

impl Default for AgentSession {
    fn default() -> Self {
        Self::new(None)
    }
}

impl AgentSession {
    pub fn new(initial_model: Option<String>) -> Self {
        Self {
            state: RwLock::new(SessionState {
                metadata: SessionMetadata::with_model(initial_model),
                ..SessionState::default()
            }),
            turn_guard: tokio::sync::Mutex::new(()),
            turn_state: AtomicU8::new(TurnState::NotStarted as u8),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned reading session state: {e}");
            e.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| {
            tracing::error!("RwLock poisoned writing session state: {e}");
            e.into_inner()
        })
    }

    /// Apply one stream event to the ledger and the accounting.
    pub fn apply_event(&self, event: &ExecutionEvent) {
        let mut state = self.write();
        match event {
            ExecutionEvent::Init { session_id } => {
                state.agent_session_id = session_id.clone();
            }
            ExecutionEvent::ToolStarted {
                call_id,
                tool_name,
                input,
            } => {
                state.ledger.start_execution(call_id, tool_name, input.clone());
            }
            ExecutionEvent::ToolCompleted {
                call_id,
                success,
                output,
            } => {
                state.ledger.complete_execution(call_id, *success, output);
            }
            ExecutionEvent::TextChunk { .. } => {}
            ExecutionEvent::Result(result) => state.metadata.record_result(result),
        }
    }

    pub fn activity(&self) -> SessionActivity {
        self.read().ledger.snapshot()
    }

    pub fn drill_down(&self, call_id: &str) -> Result<ToolCallDetail, ActivityError> {
        self.read().ledger.drill_down(call_id)
    }

    /// Clear tool activity only. History and accounting are untouched.
    pub fn clear_activity(&self) {
        self.write().ledger.reset();
        tracing::info!("session activity cleared");
    }

    /// Start a fresh conversation. The selected model is kept.
    pub fn reset(&self) {
        let mut state = self.write();
        state.history.clear();
        state.session_started = false;
        state.agent_session_id = None;
        state.metadata.reset();
        state.ledger.reset();
        tracing::info!("session reset");
    }

    pub fn set_model(&self, model: &str) -> Result<(), ModelError> {
        validate_model(model)?;
        self.write().metadata.current_model = Some(model.to_string());
        tracing::info!(model, "model set");
        Ok(())
    }

    pub fn current_model(&self) -> Option<String> {
        self.read().metadata.current_model.clone()
    }

    pub fn metadata(&self) -> SessionMetadata {
        self.read().metadata.clone()
    }

    pub fn info(&self) -> SessionInfo {
        let state = self.read();
        SessionInfo {
            session_started: state.session_started,
            message_count: state.history.len(),
            agent_session_id: state.agent_session_id.clone(),
            turn_state: self.turn_state(),
            context_percent: state.metadata.context_percent(),
            metadata: state.metadata.clone(),
        }
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.read().history.clone()
    }

    pub fn message_count(&self) -> usize {
        self.read().history.len()
    }

    pub fn turn_state(&self) -> TurnState {
        TurnState::from_u8(self.turn_state.load(Ordering::Relaxed))
    }

    fn set_turn_state(&self, state: TurnState) {
        self.turn_state.store(state as u8, Ordering::Relaxed);
    }

    /// Run one turn of the conversation.
    ///
    /// Waits for any turn already in flight. A requested model becomes the
    /// session's model before launch. The turn runs on its own task so
    /// pollers observe each tool as it starts and finishes. That task owns the
    /// turn guard and the history bookkeeping, so dropping the returned future
    /// leaves the turn running to completion and the next turn still waits.
    pub async fn run_turn(
        self: &Arc<Self>,
        runner: &TurnRunner,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<TurnOutcome, TurnError> {
        let session = Arc::clone(self);
        let runner = runner.clone();
        let prompt = prompt.to_string();
        let model = model.map(str::to_string);
        let handle = tokio::spawn(async move { session.drive_turn(&runner, prompt, model).await });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "agent turn task aborted");
                self.set_turn_state(TurnState::Failed);
                Err(TurnError::Aborted(e.to_string()))
            }
        }
    }

    async fn drive_turn(
        &self,
        runner: &TurnRunner,
        prompt: String,
        model: Option<String>,
    ) -> Result<TurnOutcome, TurnError> {
        let _turn = self.turn_guard.lock().await;

        let launch = {
            let mut state = self.write();
            if let Some(model) = model {
                state.metadata.current_model = Some(model);
            }
            state.history.push(ChatMessage::new(Role::User, prompt.as_str()));
            let continue_session = state.session_started;
            state.session_started = true;
            LaunchConfig {
                prompt,
                model: state.metadata.current_model.clone(),
                continue_session,
            }
        };

        self.set_turn_state(TurnState::Running);
        let result = runner.stream_turn(&launch, self).await;

        match &result {
            Ok(outcome) => {
                self.write()
                    .history
                    .push(ChatMessage::new(Role::Assistant, outcome.response.clone()));
                self.set_turn_state(TurnState::Succeeded);
            }
            Err(e) => {
                tracing::error!(error = %e, "agent turn failed");
                self.set_turn_state(TurnState::Failed);
            }
        }
        result
    }
}

impl EventSink for AgentSession {
    fn apply(&self, event: &ExecutionEvent) {
        self.apply_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ActivityStatus, EntryStatus};
    use crate::envelope::parse_line;
    use crate::runner::AgentCommand;
    use pretty_assertions::assert_eq;

    fn feed(session: &AgentSession, lines: &[&str]) {
        for line in lines {
            if let Ok(events) = parse_line(line) {
                for event in &events {
                    session.apply_event(event);
                }
            }
        }
    }

    const START: &str = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/a/b/c.py"}}]}}"#;
    const DONE: &str = r#"{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":[{"type":"text","text":"ok"}]}]}}"#;
    const RESULT: &str = r#"{"type":"result","result":"done","total_cost_usd":0.01,"usage":{"input_tokens":10,"output_tokens":5}}"#;

    #[test]
    fn test_apply_event_updates_ledger_and_metadata() {
        let session = AgentSession::default();
        feed(&session, &[START]);
        assert_eq!(session.activity().status, ActivityStatus::Running);

        feed(&session, &[DONE, RESULT]);
        let activity = session.activity();
        assert_eq!(activity.timeline[0].status, EntryStatus::Completed);
        assert_eq!(session.drill_down("t1").unwrap().output.as_deref(), Some("ok"));
        assert_eq!(session.metadata().total_cost_usd, 0.01);
        assert_eq!(session.metadata().context_tokens, 10);
    }

    #[test]
    fn test_clear_activity_keeps_history_and_metadata() {
        let session = AgentSession::default();
        session.write().history.push(ChatMessage::new(Role::User, "hi"));
        feed(&session, &[START, DONE, RESULT]);

        session.clear_activity();
        assert!(session.activity().timeline.is_empty());
        assert!(session.drill_down("t1").is_err());
        assert_eq!(session.message_count(), 1);
        assert_eq!(session.metadata().total_output_tokens, 5);
    }

    #[test]
    fn test_reset_clears_all_but_model() {
        let session = AgentSession::new(Some("haiku".into()));
        session.write().session_started = true;
        feed(&session, &[START, DONE, RESULT]);

        session.reset();
        let info = session.info();
        assert!(!info.session_started);
        assert_eq!(info.message_count, 0);
        assert_eq!(info.metadata.total_cost_usd, 0.0);
        assert_eq!(info.metadata.current_model.as_deref(), Some("haiku"));
        assert!(session.activity().timeline.is_empty());
    }

    #[test]
    fn test_set_model_validates() {
        let session = AgentSession::default();
        assert!(session.set_model("opus[1m]").is_ok());
        assert_eq!(session.current_model().as_deref(), Some("opus[1m]"));

        assert!(matches!(session.set_model("gpt-4"), Err(ModelError::Invalid(_))));
        assert_eq!(session.current_model().as_deref(), Some("opus[1m]"));
    }

    #[test]
    fn test_info_serializes_flat() {
        let session = AgentSession::default();
        let json = serde_json::to_value(session.info()).unwrap();
        assert_eq!(json["turn_state"], "not_started");
        assert_eq!(json["context_window"], 200_000);
        assert_eq!(json["context_percent"], 0.0);
    }

    #[cfg(unix)]
    fn echo_runner() -> TurnRunner {
        let script = r#"read -r prompt
printf '{"type":"result","result":"%s|%s"}\n' "$prompt" "$*""#;
        TurnRunner::new(AgentCommand::new("sh", ["-c", script, "fake-agent"]))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_turn_records_history_and_continues() {
        let session = Arc::new(AgentSession::default());
        let runner = echo_runner();

        let first = session.run_turn(&runner, "one", None).await.unwrap();
        assert_eq!(first.response, "one|");

        let second = session.run_turn(&runner, "two", Some("sonnet")).await.unwrap();
        assert_eq!(second.response, "two|--model sonnet --continue");

        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[3].content, "two|--model sonnet --continue");
        assert_eq!(session.current_model().as_deref(), Some("sonnet"));
        assert_eq!(session.turn_state(), TurnState::Succeeded);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_turn_keeps_partial_activity() {
        let script = r#"echo '{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Bash","input":{"command":"make"}}]}}'
exit 1"#;
        let runner = TurnRunner::new(AgentCommand::new("sh", ["-c", script, "fake-agent"]));
        let session = Arc::new(AgentSession::default());

        let err = session.run_turn(&runner, "build", None).await.unwrap_err();
        assert!(matches!(err, TurnError::ExitNonZero { .. }));
        assert_eq!(session.turn_state(), TurnState::Failed);
        assert_eq!(session.activity().timeline.len(), 1);
        // Only the user message; no assistant reply for a failed turn.
        assert_eq!(session.message_count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_activity_visible_while_turn_runs() {
        let script = r#"echo '{"type":"assistant","message":{"content":[{"type":"tool_use","id":"slow","name":"Bash","input":{"command":"sleep"}}]}}'
sleep 1
echo '{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"slow","content":"z"}]}}'
echo '{"type":"result","result":"finished"}'"#;
        let runner = TurnRunner::new(AgentCommand::new("sh", ["-c", script, "fake-agent"]));
        let session = Arc::new(AgentSession::default());

        let turn = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run_turn(&runner, "go", None).await })
        };

        let mut saw_running = false;
        for _ in 0..50 {
            let activity = session.activity();
            if activity.status == ActivityStatus::Running && activity.timeline.len() == 1 {
                saw_running = true;
                assert_eq!(session.turn_state(), TurnState::Running);
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(saw_running, "tool start was not observable mid-turn");

        let outcome = turn.await.unwrap().unwrap();
        assert_eq!(outcome.response, "finished");
        assert_eq!(session.activity().status, ActivityStatus::Idle);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_turn_still_blocks_next_turn() {
        let slow = TurnRunner::new(AgentCommand::new(
            "sh",
            ["-c", "sleep 1\necho '{\"type\":\"result\",\"result\":\"slow\"}'", "fake-agent"],
        ));
        let fast = TurnRunner::new(AgentCommand::new(
            "sh",
            ["-c", "echo '{\"type\":\"result\",\"result\":\"fast\"}'", "fake-agent"],
        ));
        let session = Arc::new(AgentSession::default());

        // A client that disconnects mid-turn drops the handler's future.
        let abandoned = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run_turn(&slow, "one", None).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        abandoned.abort();
        assert_eq!(session.turn_state(), TurnState::Running);

        let second = session.run_turn(&fast, "two", None).await.unwrap();
        assert_eq!(second.response, "fast");

        let contents: Vec<String> = session.history().into_iter().map(|m| m.content).collect();
        assert_eq!(contents, ["one", "slow", "two", "fast"]);
        assert_eq!(session.turn_state(), TurnState::Succeeded);
    }
}
