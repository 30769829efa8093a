//! `tmux`-backed `MuxDriver`: shells out to the `tmux` binary via
//! `tokio::process::Command`, no control-socket protocol parsing.

use super::title;
use super::MuxDriver;
use crate::agent_spec::AgentType;
use crate::error::{PaneforgeError, Result};
use crate::session::{Pane, Session};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

pub struct TmuxDriver {
    binary: String,
}

impl Default for TmuxDriver {
    fn default() -> Self {
        Self { binary: "tmux".to_string() }
    }
}

impl TmuxDriver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary)
            .args(args)
            .output()
            .await
            .map_err(|e| PaneforgeError::DriverError(format!("failed to exec tmux: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PaneforgeError::DriverError(format!(
                "tmux {args:?} failed: {stderr}"
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn pane_from_fields(session: &str, id: &str, index: u32, title_str: &str, active: bool) -> Pane {
        let identity = title::decode(title_str);
        let agent_type = identity.as_ref().map(|i| i.agent_type).unwrap_or(AgentType::User);
        let _ = session;
        Pane {
            id: id.to_string(),
            index,
            title: title_str.to_string(),
            agent_type,
            command: String::new(),
            active,
            tags: Vec::new(),
        }
    }
}

const PANE_FORMAT: &str = "#{pane_id}\t#{pane_index}\t#{pane_title}\t#{pane_active}";

#[async_trait]
impl MuxDriver for TmuxDriver {
    async fn ensure_installed(&self) -> Result<()> {
        self.run(&["-V"]).await.map(|_| ())
    }

    async fn session_exists(&self, name: &str) -> Result<bool> {
        let result = Command::new(&self.binary)
            .args(["has-session", "-t", name])
            .output()
            .await
            .map_err(|e| PaneforgeError::DriverError(format!("failed to exec tmux: {e}")))?;
        Ok(result.status.success())
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let raw = match self.run(&["list-sessions", "-F", "#{session_name}"]).await {
            Ok(v) => v,
            Err(_) => return Ok(Vec::new()),
        };
        let mut sessions = Vec::new();
        for name in raw.lines().filter(|l| !l.is_empty()) {
            let panes = self.get_panes(name).await.unwrap_or_default();
            sessions.push(Session {
                name: name.to_string(),
                work_dir: std::path::PathBuf::new(),
                layout: "tiled".to_string(),
                panes,
                agents_summary: Default::default(),
                git: None,
            });
        }
        Ok(sessions)
    }

    async fn get_panes(&self, session: &str) -> Result<Vec<Pane>> {
        let raw = self
            .run(&["list-panes", "-t", session, "-F", PANE_FORMAT])
            .await?;
        let mut panes = Vec::new();
        for line in raw.lines().filter(|l| !l.is_empty()) {
            let mut fields = line.splitn(4, '\t');
            let id = fields.next().unwrap_or_default();
            let index: u32 = fields.next().and_then(|s| s.parse().ok()).unwrap_or(0);
            let title_str = fields.next().unwrap_or_default();
            let active = fields.next().unwrap_or_default() == "1";
            panes.push(Self::pane_from_fields(session, id, index, title_str, active));
        }
        Ok(panes)
    }

    async fn capture_pane_output(&self, pane_id: &str, lines: u32) -> Result<String> {
        let start = format!("-{lines}");
        self.run(&["capture-pane", "-p", "-t", pane_id, "-S", &start]).await
    }

    async fn paste_keys(&self, pane_id: &str, text: &str, press_enter: bool) -> Result<()> {
        self.run(&["send-keys", "-t", pane_id, "-l", text]).await?;
        if press_enter {
            self.run(&["send-keys", "-t", pane_id, "Enter"]).await?;
        }
        Ok(())
    }

    async fn apply_tiled_layout(&self, session: &str) -> Result<()> {
        self.run(&["select-layout", "-t", session, "tiled"]).await.map(|_| ())
    }

    async fn zoom_pane(&self, session: &str, pane_index: u32) -> Result<()> {
        let target = format!("{session}.{pane_index}");
        self.run(&["resize-pane", "-Z", "-t", &target]).await.map(|_| ())
    }

    async fn kill_session(&self, name: &str) -> Result<()> {
        self.run(&["kill-session", "-t", name]).await.map(|_| ())
    }

    async fn attach_or_switch(&self, name: &str) -> Result<()> {
        if self.in_mux() {
            self.run(&["switch-client", "-t", name]).await.map(|_| ())
        } else {
            self.run(&["attach-session", "-t", name]).await.map(|_| ())
        }
    }

    fn in_mux(&self) -> bool {
        std::env::var("TMUX").is_ok()
    }

    async fn get_current_session(&self) -> Result<Option<String>> {
        if !self.in_mux() {
            return Ok(None);
        }
        let name = self.run(&["display-message", "-p", "#{session_name}"]).await?;
        Ok(Some(name.trim().to_string()))
    }

    async fn new_session(
        &self,
        session: &str,
        title: &str,
        cwd: &Path,
        command: Option<&str>,
    ) -> Result<Pane> {
        let cwd_str = cwd.to_string_lossy().to_string();
        let mut args = vec!["new-session", "-d", "-s", session, "-c", cwd_str.as_str()];
        if let Some(cmd) = command {
            args.push(cmd);
        }
        self.run(&args).await?;
        self.run(&["select-pane", "-t", &format!("{session}:0.0"), "-T", title]).await?;
        let panes = self.get_panes(session).await?;
        panes
            .into_iter()
            .next()
            .ok_or_else(|| PaneforgeError::DriverError("tmux created no panes".into()))
    }

    async fn split_pane(
        &self,
        session: &str,
        title: &str,
        cwd: &Path,
        command: Option<&str>,
    ) -> Result<Pane> {
        let cwd_str = cwd.to_string_lossy().to_string();
        let format_flag = "-P";
        let mut args = vec![
            "split-window",
            format_flag,
            "-F",
            "#{pane_id}",
            "-t",
            session,
            "-c",
            cwd_str.as_str(),
        ];
        if let Some(cmd) = command {
            args.push(cmd);
        }
        let new_id = self.run(&args).await?.trim().to_string();
        self.run(&["select-pane", "-t", &new_id, "-T", title]).await?;
        let panes = self.get_panes(session).await?;
        panes
            .into_iter()
            .find(|p| p.id == new_id)
            .ok_or_else(|| PaneforgeError::DriverError(format!("newly split pane {new_id} not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pane_from_fields_decodes_agent_type_from_title() {
        let title_str = title::encode("proj", AgentType::Codex, 2, "gpt-4.1");
        let pane = TmuxDriver::pane_from_fields("proj", "%3", 2, &title_str, true);
        assert_eq!(pane.agent_type, AgentType::Codex);
        assert_eq!(pane.index, 2);
        assert!(pane.active);
    }

    #[test]
    fn pane_from_fields_falls_back_to_user_on_unparseable_title() {
        let pane = TmuxDriver::pane_from_fields("proj", "%0", 0, "some shell", false);
        assert_eq!(pane.agent_type, AgentType::User);
    }
}
