// Stream scenarios fed line by line through the parser into a session.
//
// These drive the same path the turn reader uses: one line, parse, apply,
// then the next line.

use agent_pulse_core::{
    parse_line, AgentSession, EntryStatus, ExecutionEvent, TurnRecorder,
};

fn feed(session: &AgentSession, recorder: &mut TurnRecorder, data: &str) -> usize {
    let mut skipped = 0;
    for line in data.lines() {
        match parse_line(line) {
            Ok(events) => {
                for event in &events {
                    session.apply_event(event);
                    recorder.record(event);
                }
            }
            Err(_) => skipped += 1,
        }
    }
    skipped
}

// ============================================================================
// End-to-end
// ============================================================================

#[test]
fn end_to_end_single_read_tool() {
    let data = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"t1","name":"Read","input":{"file_path":"/a/b/c.py"}}]}}
{"type":"assistant","message":{"content":[{"type":"tool_result","tool_use_id":"t1","content":[{"type":"text","text":"ok"}]}]}}
{"type":"result","result":"done","total_cost_usd":0.01,"usage":{"input_tokens":10,"output_tokens":5}}"#;

    let session = AgentSession::default();
    let mut recorder = TurnRecorder::new();
    assert_eq!(feed(&session, &mut recorder, data), 0);

    let activity = session.activity();
    assert_eq!(activity.timeline.len(), 1);
    let entry = &activity.timeline[0];
    assert_eq!(entry.status, EntryStatus::Completed);
    assert_eq!(entry.tool, "Read");
    assert_eq!(entry.input_summary, ".../b/c.py");
    assert_eq!(entry.success, Some(true));

    let meta = session.metadata();
    assert_eq!(meta.total_cost_usd, 0.01);
    assert_eq!(meta.total_output_tokens, 5);

    assert_eq!(recorder.finish().response, "done");
}

// ============================================================================
// Resilience
// ============================================================================

#[test]
fn malformed_line_between_pairs_is_skipped() {
    let data = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"a","name":"Bash","input":{"command":"ls"}}]}}
{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"a","content":"x"}]}}
this is not valid JSON {{{
{"type":"assistant","message":{"content":[{"type":"tool_use","id":"b","name":"Grep","input":{"pattern":"fn"}}]}}
{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"b","content":"y"}]}}"#;

    let session = AgentSession::default();
    let mut recorder = TurnRecorder::new();
    assert_eq!(feed(&session, &mut recorder, data), 1);

    let activity = session.activity();
    let completed = activity
        .timeline
        .iter()
        .filter(|e| e.status == EntryStatus::Completed)
        .count();
    assert_eq!(completed, 2);
    assert_eq!(activity.totals.calls, 2);
}

#[test]
fn interleaved_tools_complete_in_arrival_order() {
    let data = r#"{"type":"assistant","message":{"content":[{"type":"tool_use","id":"a","name":"Read","input":{"file_path":"x"}},{"type":"tool_use","id":"b","name":"Read","input":{"file_path":"y"}}]}}
{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"b","content":"second"}]}}
{"type":"user","message":{"content":[{"type":"tool_result","tool_use_id":"a","content":"first","is_error":true}]}}"#;

    let session = AgentSession::default();
    let mut recorder = TurnRecorder::new();
    feed(&session, &mut recorder, data);

    let activity = session.activity();
    let ids: Vec<&str> = activity.timeline.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(activity.timeline[1].success, Some(false));
    assert_eq!(activity.tool_counts.get("Read"), Some(&2));
    assert_eq!(session.drill_down("a").unwrap().output.as_deref(), Some("first"));
}

#[test]
fn system_and_unknown_envelopes_produce_no_activity() {
    let data = r#"{"type":"system","subtype":"hook_response","session_id":"s"}
{"type":"stream_event","event":{"delta":"x"}}

{"type":"assistant","message":{"content":"plain string content"}}"#;

    let session = AgentSession::default();
    let mut recorder = TurnRecorder::new();
    assert_eq!(feed(&session, &mut recorder, data), 0);
    assert!(session.activity().timeline.is_empty());

    let outcome = recorder.finish();
    assert!(outcome.response.is_empty());
    assert!(outcome.execution_log.is_empty());
}

#[test]
fn result_context_window_carries_over_when_missing() {
    let data = r#"{"type":"result","result":"a","usage":{"input_tokens":100,"cache_read_input_tokens":900,"output_tokens":1},"modelUsage":{"claude-sonnet":{"contextWindow":1000000}}}
{"type":"result","result":"b","usage":{"input_tokens":50,"output_tokens":2}}"#;

    let session = AgentSession::default();
    let mut recorder = TurnRecorder::new();
    feed(&session, &mut recorder, data);

    let meta = session.metadata();
    assert_eq!(meta.context_window, 1_000_000);
    assert_eq!(meta.context_tokens, 50);
    assert_eq!(meta.total_output_tokens, 3);
}

#[test]
fn parse_line_exposes_typed_events() {
    let events = parse_line(r#"{"type":"init","session_id":"abc"}"#).unwrap();
    assert_eq!(
        events,
        vec![ExecutionEvent::Init {
            session_id: Some("abc".into())
        }]
    );
}
