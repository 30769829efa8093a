//! Deterministic JSON-only surface mirroring every core operation. Human and
//! robot output both originate from the same typed result; this module only
//! ever serialises a concrete payload type, never builds JSON by string
//! interpolation, so the schema emitter and the runtime producer cannot
//! drift apart.

use crate::ack::{AckOutcome, WaitOutcome};
use crate::agent_spec::{registry::Persona, registry::Recipe, FlatAgent};
use crate::delivery::SendOutcome;
use crate::error::{PaneforgeError, Result};
use crate::history::HistoryEntry;
use crate::mail::reservations::FileReservation;
use crate::session::snapshot::SessionSnapshot;
use crate::session::{Pane, Session};
use schemars::schema_for;
use serde::Serialize;
use serde_json::{json, Value};

/// Wrap a successful payload as `{success: true, ...fields}`.
pub fn ok_payload<T: Serialize>(data: &T) -> Value {
    let mut value = serde_json::to_value(data).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut value {
        map.insert("success".to_string(), json!(true));
    } else {
        value = json!({ "success": true, "data": value });
    }
    value
}

/// `(json body, process exit code)` for any typed core result. Robot-mode
/// callers always emit exactly the returned JSON on stdout and use the exit
/// code as the process exit code.
pub fn render<T: Serialize>(result: &Result<T>) -> (Value, i32) {
    match result {
        Ok(data) => (ok_payload(data), 0),
        Err(e) => (e.to_robot_json(), e.exit_code()),
    }
}

/// Timeout/cancellation carry their own boolean markers rather than being
/// full errors; this renders the wait/ack-specific exit codes from §4.5:
/// 0 satisfied, 1 timeout/cancelled, 3 error-state-seen.
pub fn render_wait(outcome: &WaitOutcome) -> (Value, i32) {
    let body = ok_payload(outcome);
    let code = if outcome.error_seen && !outcome.satisfied {
        3
    } else if outcome.timed_out || outcome.cancelled {
        1
    } else {
        0
    };
    (body, code)
}

pub fn render_ack(outcome: &AckOutcome) -> (Value, i32) {
    let body = ok_payload(outcome);
    let code = if outcome.timed_out || outcome.cancelled { 1 } else { 0 };
    (body, code)
}

pub fn session_status_json(session: &Session) -> Value {
    ok_payload(session)
}

pub fn route_json(panes: &[Pane]) -> Value {
    ok_payload(&json!({ "panes": panes }))
}

pub fn send_json(outcome: &SendOutcome) -> Value {
    ok_payload(outcome)
}

pub fn history_json(entries: &[HistoryEntry]) -> Value {
    ok_payload(&json!({ "entries": entries }))
}

pub fn snapshot_json(snapshot: &SessionSnapshot) -> Value {
    ok_payload(snapshot)
}

pub fn flat_agents_json(agents: &[FlatAgent]) -> Value {
    ok_payload(&json!({ "agents": agents }))
}

/// Named schemas advertised via `--robot-schema <name>`. Unknown names are
/// an argument error, not a silent empty schema.
pub fn schema_for_name(name: &str) -> Result<Value> {
    let schema = match name {
        "pane" => serde_json::to_value(schema_for!(Pane)),
        "session" => serde_json::to_value(schema_for!(Session)),
        "session-snapshot" => serde_json::to_value(schema_for!(SessionSnapshot)),
        "flat-agent" => serde_json::to_value(schema_for!(FlatAgent)),
        "persona" => serde_json::to_value(schema_for!(Persona)),
        "recipe" => serde_json::to_value(schema_for!(Recipe)),
        "send-outcome" => serde_json::to_value(schema_for!(SendOutcome)),
        "ack-outcome" => serde_json::to_value(schema_for!(AckOutcome)),
        "wait-outcome" => serde_json::to_value(schema_for!(WaitOutcome)),
        "history-entry" => serde_json::to_value(schema_for!(HistoryEntry)),
        "file-reservation" => serde_json::to_value(schema_for!(FileReservation)),
        other => {
            return Err(PaneforgeError::ArgumentError(format!(
                "unknown schema name {other:?}; try one of: pane, session, session-snapshot, \
                 flat-agent, persona, recipe, send-outcome, ack-outcome, wait-outcome, history-entry, \
                 file-reservation"
            )))
        }
    };
    schema.map_err(PaneforgeError::Serialization)
}

/// `--robot-assign` has only a thin implementation upstream; rather than
/// guess a scheduling heuristic, it returns a stable "unimplemented" error
/// per the design notes' open question.
pub fn robot_assign() -> Result<Value> {
    Err(PaneforgeError::Unimplemented("robot-assign"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_spec::AgentType;

    #[test]
    fn ok_payload_merges_success_flag_into_object() {
        let agent = FlatAgent { agent_type: AgentType::Claude, index: 1, model: "opus".to_string() };
        let payload = ok_payload(&agent);
        assert_eq!(payload["success"], true);
        assert_eq!(payload["index"], 1);
    }

    #[test]
    fn render_maps_argument_error_to_exit_code_two() {
        let result: Result<()> = Err(PaneforgeError::ArgumentError("bad".into()));
        let (body, code) = render(&result);
        assert_eq!(code, 2);
        assert_eq!(body["success"], false);
    }

    #[test]
    fn schema_for_unknown_name_is_argument_error() {
        assert!(schema_for_name("nope").is_err());
    }

    #[test]
    fn schema_for_known_name_produces_object_schema() {
        let schema = schema_for_name("pane").unwrap();
        assert!(schema.get("properties").is_some());
    }

    #[test]
    fn robot_assign_is_stable_unimplemented() {
        let err = robot_assign().unwrap_err();
        assert_eq!(err.exit_code(), 20);
    }
}
