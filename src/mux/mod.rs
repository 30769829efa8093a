//! Thin abstraction over the external terminal multiplexer: sessions,
//! panes, capture, keystroke injection, layout. The core depends only on
//! this trait; `tmux.rs` is the sole implementation.

pub mod title;
pub mod tmux;

use crate::error::Result;
use crate::session::{Pane, Session};
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait MuxDriver: Send + Sync {
    /// Verify the multiplexer binary is installed and usable.
    async fn ensure_installed(&self) -> Result<()>;

    async fn session_exists(&self, name: &str) -> Result<bool>;

    async fn list_sessions(&self) -> Result<Vec<Session>>;

    async fn get_panes(&self, session: &str) -> Result<Vec<Pane>>;

    async fn capture_pane_output(&self, pane_id: &str, lines: u32) -> Result<String>;

    async fn paste_keys(&self, pane_id: &str, text: &str, press_enter: bool) -> Result<()>;

    async fn apply_tiled_layout(&self, session: &str) -> Result<()>;

    async fn zoom_pane(&self, session: &str, pane_index: u32) -> Result<()>;

    async fn kill_session(&self, name: &str) -> Result<()>;

    async fn attach_or_switch(&self, name: &str) -> Result<()>;

    fn in_mux(&self) -> bool;

    async fn get_current_session(&self) -> Result<Option<String>>;

    /// Create a brand-new session with one initial pane, titled `title`,
    /// rooted at `cwd`, optionally running `command`.
    async fn new_session(
        &self,
        session: &str,
        title: &str,
        cwd: &Path,
        command: Option<&str>,
    ) -> Result<Pane>;

    /// Add one more pane to an existing session.
    async fn split_pane(
        &self,
        session: &str,
        title: &str,
        cwd: &Path,
        command: Option<&str>,
    ) -> Result<Pane>;
}
