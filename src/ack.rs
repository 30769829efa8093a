//! Acknowledgement and wait engine: polls pane scrollback, classifies agent
//! state with a table-driven heuristic, and surfaces a single timed outcome.
//! Poll-loop shape (hysteresis via a per-pane stable-poll counter, shared
//! cancellation token) is the same pattern as a background monitor task that
//! tracks `last_active` per resource and backs off on repeated failures.

use crate::config::{AckConfig, AckTypeConfig};
use crate::mux::MuxDriver;
use crate::session::Pane;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaneState {
    Idle,
    Generating,
    Complete,
    Error,
    Unknown,
}

struct CompiledPatterns {
    ready: Vec<Regex>,
    error: Vec<Regex>,
    stability_polls: u32,
}

fn compile_patterns(config: &AckConfig, agent_type: crate::agent_spec::AgentType) -> CompiledPatterns {
    let per_type = config.per_type.get(&agent_type).cloned().unwrap_or_else(AckTypeConfig::default);
    let ready = per_type.ready_patterns.iter().filter_map(|p| Regex::new(p).ok()).collect();
    let mut error: Vec<Regex> = per_type.error_patterns.iter().filter_map(|p| Regex::new(p).ok()).collect();
    error.extend(config.error_patterns.iter().filter_map(|p| Regex::new(p).ok()));
    CompiledPatterns { ready, error, stability_polls: per_type.stability_polls.max(1) }
}

struct PaneTracker {
    last_capture: String,
    stable_count: u32,
}

impl PaneTracker {
    fn new() -> Self {
        Self { last_capture: String::new(), stable_count: 0 }
    }

    fn observe(&mut self, capture: &str, patterns: &CompiledPatterns) -> PaneState {
        let grew = capture != self.last_capture;
        if grew {
            self.stable_count = 0;
        } else {
            self.stable_count += 1;
        }
        self.last_capture = capture.to_string();

        if patterns.error.iter().any(|p| p.is_match(capture)) {
            return PaneState::Error;
        }
        if grew {
            return PaneState::Generating;
        }
        if self.stable_count < patterns.stability_polls {
            return PaneState::Unknown;
        }
        if patterns.ready.iter().any(|p| p.is_match(capture)) {
            PaneState::Complete
        } else {
            PaneState::Idle
        }
    }
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct PaneAckResult {
    pub pane: String,
    pub state: PaneState,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct AckOutcome {
    pub results: Vec<PaneAckResult>,
    pub cancelled: bool,
    pub timed_out: bool,
    pub duration_ms: u64,
}

/// Poll `panes` until each has produced observational evidence of
/// acknowledgement, `timeout` elapses, or `cancel` fires.
///
/// Without `msg`, a pane is acknowledged on its first observed transition
/// out of `Generating` into any terminal state. With `msg`, a pane is
/// acknowledged only once its scrollback tail contains `msg` followed by
/// additional bytes (handles shells that echo input back before the agent's
/// real response begins).
pub async fn ack(
    mux: &Arc<dyn MuxDriver>,
    panes: &[Pane],
    msg: Option<&str>,
    timeout: Duration,
    poll_interval: Duration,
    config: &AckConfig,
    cancel: &CancellationToken,
) -> AckOutcome {
    let started = Instant::now();
    let mut trackers: HashMap<String, PaneTracker> = HashMap::new();
    let mut echo_seen_at: HashMap<String, usize> = HashMap::new();
    let mut acknowledged: HashMap<String, bool> = HashMap::new();
    let mut was_generating: HashMap<String, bool> = HashMap::new();
    let mut last_state: HashMap<String, PaneState> = HashMap::new();

    for pane in panes {
        trackers.insert(pane.id.clone(), PaneTracker::new());
        acknowledged.insert(pane.id.clone(), false);
        was_generating.insert(pane.id.clone(), false);
        last_state.insert(pane.id.clone(), PaneState::Unknown);
    }

    let mut cancelled = false;
    let mut timed_out = false;

    loop {
        if started.elapsed() >= timeout {
            timed_out = true;
            break;
        }

        for pane in panes {
            let capture = mux.capture_pane_output(&pane.id, 200).await.unwrap_or_default();
            let patterns = compile_patterns(config, pane.agent_type);
            let tracker = trackers.get_mut(&pane.id).unwrap();
            let state = tracker.observe(&capture, &patterns);

            if let Some(msg) = msg {
                if !acknowledged[&pane.id] {
                    match echo_seen_at.get(&pane.id) {
                        None => {
                            if let Some(pos) = capture.find(msg) {
                                echo_seen_at.insert(pane.id.clone(), pos + msg.len());
                            }
                        }
                        Some(&pos) => {
                            if capture.len() > pos {
                                acknowledged.insert(pane.id.clone(), true);
                            }
                        }
                    }
                }
            } else {
                let prev = was_generating[&pane.id];
                if prev && state != PaneState::Generating {
                    acknowledged.insert(pane.id.clone(), true);
                }
                was_generating.insert(pane.id.clone(), state == PaneState::Generating);
            }
            last_state.insert(pane.id.clone(), state);
        }

        if acknowledged.values().all(|&a| a) {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = cancel.cancelled() => {
                cancelled = true;
            }
        }
        if cancelled {
            break;
        }
    }

    let results = panes
        .iter()
        .map(|pane| PaneAckResult {
            pane: pane.id.clone(),
            state: last_state.get(&pane.id).copied().unwrap_or(PaneState::Unknown),
            acknowledged: acknowledged.get(&pane.id).copied().unwrap_or(false),
        })
        .collect();

    AckOutcome { results, cancelled, timed_out, duration_ms: started.elapsed().as_millis() as u64 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    Idle,
    Complete,
    Generating,
    Healthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    Any,
    All,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct PaneWaitResult {
    pub pane: String,
    pub state: PaneState,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct WaitOutcome {
    pub results: Vec<PaneWaitResult>,
    pub satisfied: bool,
    pub cancelled: bool,
    pub timed_out: bool,
    pub error_seen: bool,
    pub duration_ms: u64,
}

fn condition_met(condition: WaitCondition, state: PaneState) -> bool {
    match condition {
        WaitCondition::Idle => state == PaneState::Idle,
        WaitCondition::Complete => state == PaneState::Complete,
        WaitCondition::Generating => state == PaneState::Generating,
        WaitCondition::Healthy => state != PaneState::Error,
    }
}

/// Poll until `condition` is satisfied for `mode` of `panes`, `timeout`
/// elapses, `cancel` fires, or (with `exit_on_error`) any pane enters
/// `Error` first.
pub async fn wait(
    mux: &Arc<dyn MuxDriver>,
    panes: &[Pane],
    condition: WaitCondition,
    timeout: Duration,
    poll_interval: Duration,
    mode: WaitMode,
    exit_on_error: bool,
    config: &AckConfig,
    cancel: &CancellationToken,
) -> WaitOutcome {
    let started = Instant::now();
    let mut trackers: HashMap<String, PaneTracker> = panes.iter().map(|p| (p.id.clone(), PaneTracker::new())).collect();
    let mut last_state: HashMap<String, PaneState> =
        panes.iter().map(|p| (p.id.clone(), PaneState::Unknown)).collect();

    let mut cancelled = false;
    let mut timed_out = false;
    let mut error_seen = false;

    loop {
        if started.elapsed() >= timeout {
            timed_out = true;
            break;
        }

        for pane in panes {
            let capture = mux.capture_pane_output(&pane.id, 200).await.unwrap_or_default();
            let patterns = compile_patterns(config, pane.agent_type);
            let tracker = trackers.get_mut(&pane.id).unwrap();
            let state = tracker.observe(&capture, &patterns);
            last_state.insert(pane.id.clone(), state);
            if state == PaneState::Error {
                error_seen = true;
            }
        }

        if exit_on_error && error_seen {
            break;
        }

        let satisfied = match mode {
            WaitMode::Any => last_state.values().any(|&s| condition_met(condition, s)),
            WaitMode::All => last_state.values().all(|&s| condition_met(condition, s)),
        };
        if satisfied {
            let results = panes
                .iter()
                .map(|p| PaneWaitResult { pane: p.id.clone(), state: last_state[&p.id] })
                .collect();
            return WaitOutcome {
                results,
                satisfied: true,
                cancelled: false,
                timed_out: false,
                error_seen,
                duration_ms: started.elapsed().as_millis() as u64,
            };
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = cancel.cancelled() => {
                cancelled = true;
            }
        }
        if cancelled {
            break;
        }
    }

    let results = panes.iter().map(|p| PaneWaitResult { pane: p.id.clone(), state: last_state[&p.id] }).collect();
    WaitOutcome { results, satisfied: false, cancelled, timed_out, error_seen, duration_ms: started.elapsed().as_millis() as u64 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_spec::AgentType;
    use crate::error::Result;
    use crate::session::Session;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    struct ScriptedMux {
        // Each pane ID maps to a queue of captures returned on successive polls.
        script: Mutex<HashMap<String, Vec<String>>>,
    }

    #[async_trait]
    impl MuxDriver for ScriptedMux {
        async fn ensure_installed(&self) -> Result<()> {
            Ok(())
        }
        async fn session_exists(&self, _name: &str) -> Result<bool> {
            Ok(true)
        }
        async fn list_sessions(&self) -> Result<Vec<Session>> {
            Ok(vec![])
        }
        async fn get_panes(&self, _session: &str) -> Result<Vec<Pane>> {
            Ok(vec![])
        }
        async fn capture_pane_output(&self, pane_id: &str, _lines: u32) -> Result<String> {
            let mut script = self.script.lock().unwrap();
            let queue = script.entry(pane_id.to_string()).or_default();
            if queue.len() > 1 {
                Ok(queue.remove(0))
            } else {
                Ok(queue.last().cloned().unwrap_or_default())
            }
        }
        async fn paste_keys(&self, _pane_id: &str, _text: &str, _press_enter: bool) -> Result<()> {
            Ok(())
        }
        async fn apply_tiled_layout(&self, _session: &str) -> Result<()> {
            Ok(())
        }
        async fn zoom_pane(&self, _session: &str, _pane_index: u32) -> Result<()> {
            Ok(())
        }
        async fn kill_session(&self, _name: &str) -> Result<()> {
            Ok(())
        }
        async fn attach_or_switch(&self, _name: &str) -> Result<()> {
            Ok(())
        }
        fn in_mux(&self) -> bool {
            false
        }
        async fn get_current_session(&self) -> Result<Option<String>> {
            Ok(None)
        }
        async fn new_session(&self, _s: &str, _t: &str, _c: &Path, _cmd: Option<&str>) -> Result<Pane> {
            unimplemented!()
        }
        async fn split_pane(&self, _s: &str, _t: &str, _c: &Path, _cmd: Option<&str>) -> Result<Pane> {
            unimplemented!()
        }
    }

    fn pane(id: &str, agent_type: AgentType) -> Pane {
        Pane { id: id.to_string(), index: 1, title: String::new(), agent_type, command: String::new(), active: true, tags: vec![] }
    }

    #[tokio::test]
    async fn ack_with_echo_succeeds_once_bytes_follow_the_sent_message() {
        let script = HashMap::from([(
            "%1".to_string(),
            vec!["shell$ ".to_string(), "shell$ ping".to_string(), "shell$ ping\npong".to_string()],
        )]);
        let mux: Arc<dyn MuxDriver> = Arc::new(ScriptedMux { script: Mutex::new(script) });
        let config = AckConfig::default();
        let cancel = CancellationToken::new();
        let outcome = ack(
            &mux,
            &[pane("%1", AgentType::Claude)],
            Some("ping"),
            Duration::from_secs(5),
            Duration::from_millis(1),
            &config,
            &cancel,
        )
        .await;
        assert!(!outcome.cancelled);
        assert!(outcome.results[0].acknowledged);
    }

    #[tokio::test]
    async fn ack_without_message_times_out_if_never_seen() {
        let script = HashMap::from([("%1".to_string(), vec!["shell$ ".to_string()])]);
        let mux: Arc<dyn MuxDriver> = Arc::new(ScriptedMux { script: Mutex::new(script) });
        let config = AckConfig::default();
        let cancel = CancellationToken::new();
        let outcome = ack(
            &mux,
            &[pane("%1", AgentType::Claude)],
            Some("never-appears"),
            Duration::from_millis(20),
            Duration::from_millis(5),
            &config,
            &cancel,
        )
        .await;
        assert!(outcome.timed_out);
        assert!(!outcome.results[0].acknowledged);
    }

    #[tokio::test]
    async fn wait_all_idle_is_satisfied_once_both_panes_stabilise() {
        let script = HashMap::from([
            ("%1".to_string(), vec!["idle-prompt".to_string()]),
            ("%2".to_string(), vec!["idle-prompt".to_string()]),
        ]);
        let mux: Arc<dyn MuxDriver> = Arc::new(ScriptedMux { script: Mutex::new(script) });
        let config = AckConfig::default();
        let cancel = CancellationToken::new();
        let outcome = wait(
            &mux,
            &[pane("%1", AgentType::Claude), pane("%2", AgentType::Claude)],
            WaitCondition::Healthy,
            Duration::from_secs(1),
            Duration::from_millis(1),
            WaitMode::All,
            false,
            &config,
            &cancel,
        )
        .await;
        assert!(outcome.satisfied);
    }

    #[tokio::test]
    async fn wait_exit_on_error_stops_immediately_on_error_marker() {
        let script = HashMap::from([("%1".to_string(), vec!["panic: boom".to_string()])]);
        let mux: Arc<dyn MuxDriver> = Arc::new(ScriptedMux { script: Mutex::new(script) });
        let config = AckConfig::default();
        let cancel = CancellationToken::new();
        let outcome = wait(
            &mux,
            &[pane("%1", AgentType::Claude)],
            WaitCondition::Idle,
            Duration::from_secs(5),
            Duration::from_millis(1),
            WaitMode::All,
            true,
            &config,
            &cancel,
        )
        .await;
        assert!(outcome.error_seen);
        assert!(!outcome.satisfied);
    }
}
