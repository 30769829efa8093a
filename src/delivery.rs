//! Serial per-pane delivery: resolves a target expression, constructs the
//! prompt text, staggers sends, and isolates per-pane failures.

use crate::error::{PaneforgeError, Result};
use crate::mux::MuxDriver;
use crate::routing::{self, TargetExpr};
use crate::session::Pane;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct SendOpts {
    pub prefix: String,
    pub suffix: String,
    pub stagger_delay: Duration,
    pub dry_run: bool,
    /// Positional-args delivery: prefix/suffix are ignored, the caller
    /// already supplied the whole prompt.
    pub skip_first: bool,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SendFailure {
    pub pane: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct SendOutcome {
    pub targets: Vec<String>,
    pub successes: Vec<String>,
    pub failures: Vec<SendFailure>,
    pub prompt_hash: String,
    pub duration_ms: u64,
    pub dry_run: bool,
}

/// `prefix + "\n" + content + "\n" + suffix` when either wrapper is
/// non-empty, else `content` right-trimmed. Ignored entirely when
/// `opts.skip_first` (the caller supplied the whole prompt already).
pub fn build_prompt(content: &str, opts: &SendOpts) -> String {
    if opts.skip_first || (opts.prefix.is_empty() && opts.suffix.is_empty()) {
        return content.trim_end().to_string();
    }
    let mut parts = Vec::new();
    if !opts.prefix.is_empty() {
        parts.push(opts.prefix.clone());
    }
    parts.push(content.to_string());
    if !opts.suffix.is_empty() {
        parts.push(opts.suffix.clone());
    }
    parts.join("\n")
}

fn prompt_hash(prompt: &str) -> String {
    // Not a cryptographic need — just a short stable fingerprint for
    // history/robot payloads, grounded on a DefaultHasher (stdlib, no extra
    // dependency needed for a non-security digest).
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    prompt.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn pane_label(session: &str, pane: &Pane) -> String {
    format!("{session}:{}", pane.index)
}

/// Resolve targets, construct the prompt, and deliver it serially with
/// staggering and per-pane isolation. Validation (empty prompt, zero
/// targets) happens before any MUX call.
pub async fn send(
    mux: &Arc<dyn MuxDriver>,
    session: &str,
    content: &str,
    target: &TargetExpr,
    panes: &[Pane],
    opts: &SendOpts,
) -> Result<SendOutcome> {
    let prompt = build_prompt(content, opts);
    if prompt.is_empty() {
        return Err(PaneforgeError::ArgumentError("prompt is empty after construction".into()));
    }

    let resolved = routing::resolve(target, panes)?;
    let targets: Vec<String> = resolved.iter().map(|p| pane_label(session, p)).collect();

    let started = std::time::Instant::now();
    let mut successes = Vec::new();
    let mut failures = Vec::new();

    if !opts.dry_run {
        for (position, pane) in resolved.iter().enumerate() {
            if position > 0 && !opts.stagger_delay.is_zero() {
                tokio::time::sleep(opts.stagger_delay).await;
            }
            let label = pane_label(session, pane);
            match mux.paste_keys(&pane.id, &prompt, true).await {
                Ok(()) => successes.push(label),
                Err(e) => failures.push(SendFailure { pane: label, error: e.to_string() }),
            }
        }
    }

    Ok(SendOutcome {
        targets,
        successes,
        failures,
        prompt_hash: prompt_hash(&prompt),
        duration_ms: started.elapsed().as_millis() as u64,
        dry_run: opts.dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_spec::AgentType;
    use crate::session::Session;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    struct FakeMux {
        sent: Mutex<Vec<(String, String)>>,
        fail_pane: Option<String>,
    }

    #[async_trait]
    impl MuxDriver for FakeMux {
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
        async fn capture_pane_output(&self, _pane_id: &str, _lines: u32) -> Result<String> {
            Ok(String::new())
        }
        async fn paste_keys(&self, pane_id: &str, text: &str, _press_enter: bool) -> Result<()> {
            if self.fail_pane.as_deref() == Some(pane_id) {
                return Err(PaneforgeError::DriverError("boom".into()));
            }
            self.sent.lock().unwrap().push((pane_id.to_string(), text.to_string()));
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

    fn pane(index: u32, id: &str, agent_type: AgentType) -> Pane {
        Pane { id: id.to_string(), index, title: String::new(), agent_type, command: String::new(), active: false, tags: vec![] }
    }

    fn inventory() -> Vec<Pane> {
        vec![
            pane(0, "%0", AgentType::User),
            pane(1, "%1", AgentType::Claude),
            pane(2, "%2", AgentType::Claude),
            pane(3, "%3", AgentType::Codex),
        ]
    }

    #[tokio::test]
    async fn send_to_claude_panes_writes_two_successes_and_matching_targets() {
        let mux: Arc<dyn MuxDriver> = Arc::new(FakeMux { sent: Mutex::new(vec![]), fail_pane: None });
        let target = TargetExpr { by_type: vec![AgentType::Claude], ..Default::default() };
        let outcome = send(&mux, "myproj", "hello", &target, &inventory(), &SendOpts::default()).await.unwrap();
        assert_eq!(outcome.targets, vec!["myproj:1", "myproj:2"]);
        assert_eq!(outcome.successes, vec!["myproj:1", "myproj:2"]);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn failing_pane_is_isolated_not_fatal() {
        let mux: Arc<dyn MuxDriver> =
            Arc::new(FakeMux { sent: Mutex::new(vec![]), fail_pane: Some("%2".to_string()) });
        let target = TargetExpr { by_type: vec![AgentType::Claude], ..Default::default() };
        let outcome = send(&mux, "myproj", "hello", &target, &inventory(), &SendOpts::default()).await.unwrap();
        assert_eq!(outcome.successes, vec!["myproj:1"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].pane, "myproj:2");
    }

    #[tokio::test]
    async fn dry_run_computes_targets_but_sends_nothing() {
        let mux: Arc<dyn MuxDriver> = Arc::new(FakeMux { sent: Mutex::new(vec![]), fail_pane: None });
        let opts = SendOpts { dry_run: true, ..Default::default() };
        let target = TargetExpr { by_type: vec![AgentType::Claude], ..Default::default() };
        let outcome = send(&mux, "myproj", "hello", &target, &inventory(), &opts).await.unwrap();
        assert_eq!(outcome.targets, vec!["myproj:1", "myproj:2"]);
        assert!(outcome.successes.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn empty_prompt_is_argument_error_before_any_mux_call() {
        let mux: Arc<dyn MuxDriver> = Arc::new(FakeMux { sent: Mutex::new(vec![]), fail_pane: None });
        let target = TargetExpr { by_type: vec![AgentType::Claude], ..Default::default() };
        let err = send(&mux, "myproj", "   ", &target, &inventory(), &SendOpts::default()).await.unwrap_err();
        assert!(matches!(err, PaneforgeError::ArgumentError(_)));
    }

    #[tokio::test]
    async fn zero_resolved_targets_is_not_found() {
        let mux: Arc<dyn MuxDriver> = Arc::new(FakeMux { sent: Mutex::new(vec![]), fail_pane: None });
        let target = TargetExpr { by_type: vec![AgentType::Gemini], ..Default::default() };
        let err = send(&mux, "myproj", "hello", &target, &inventory(), &SendOpts::default()).await.unwrap_err();
        assert!(matches!(err, PaneforgeError::NotFound(_)));
    }

    #[test]
    fn prefix_and_suffix_wrap_content_with_newlines() {
        let opts = SendOpts { prefix: "PRE".into(), suffix: "POST".into(), ..Default::default() };
        assert_eq!(build_prompt("mid", &opts), "PRE\nmid\nPOST");
    }

    #[test]
    fn no_wrappers_right_trims_content() {
        let opts = SendOpts::default();
        assert_eq!(build_prompt("hello  \n", &opts), "hello");
    }
}
