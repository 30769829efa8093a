//! Snapshot persistence: one JSON file per snapshot under
//! `$XDG_DATA_HOME/paneforge/sessions/`, written atomically via
//! new-file + rename.

use super::{GitContext, Pane, Session};
use crate::error::{PaneforgeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PaneSnapshot {
    pub index: u32,
    pub title: String,
    pub agent_type: crate::agent_spec::AgentType,
    pub active: bool,
    pub model: String,
    pub command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SessionSnapshot {
    pub name: String,
    pub work_dir: PathBuf,
    pub layout: String,
    pub panes: Vec<PaneSnapshot>,
    pub agents_summary: std::collections::HashMap<String, u32>,
    pub git: Option<GitContext>,
}

impl SessionSnapshot {
    pub fn capture(session: &Session) -> Self {
        let panes = session
            .panes
            .iter()
            .map(|pane| {
                let model = crate::mux::title::decode(&pane.title)
                    .map(|identity| identity.model)
                    .unwrap_or_default();
                PaneSnapshot {
                    index: pane.index,
                    title: pane.title.clone(),
                    agent_type: pane.agent_type,
                    active: pane.active,
                    model,
                    command: pane.command.clone(),
                }
            })
            .collect();
        Self {
            name: session.name.clone(),
            work_dir: session.work_dir.clone(),
            layout: session.layout.clone(),
            panes,
            agents_summary: session.agents_summary.clone(),
            git: session.git.clone(),
        }
    }
}

/// Write a snapshot to `<sessions_dir>/<name>.json`, atomically: write to a
/// temp file in the same directory, then rename over the destination. The
/// file handle is closed before the rename.
pub fn save(sessions_dir: &Path, name: &str, snapshot: &SessionSnapshot) -> Result<PathBuf> {
    std::fs::create_dir_all(sessions_dir)?;
    let dest = sessions_dir.join(format!("{name}.json"));
    let json = serde_json::to_string_pretty(snapshot)?;

    let mut tmp = tempfile::NamedTempFile::new_in(sessions_dir)?;
    use std::io::Write;
    tmp.write_all(json.as_bytes())?;
    tmp.flush()?;
    tmp.persist(&dest)
        .map_err(|e| PaneforgeError::Io(e.error))?;
    Ok(dest)
}

pub fn load(sessions_dir: &Path, name: &str) -> Result<SessionSnapshot> {
    let path = sessions_dir.join(format!("{name}.json"));
    let content = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PaneforgeError::NotFound(format!("snapshot {name:?} not found at {}", path.display()))
        } else {
            PaneforgeError::Io(e)
        }
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Re-materialise a saved snapshot as a fresh session under a possibly new
/// name. `launch_agents = false` leaves panes at an inert shell (no agent
/// command substituted). Does not itself talk to the MUX driver — the
/// caller drives pane creation via `crate::session::spawn`-style calls using
/// the returned `FlatAgent`-equivalent plan.
pub fn restore_plan(
    snapshot: &SessionSnapshot,
    launch_agents: bool,
) -> Vec<(crate::agent_spec::AgentType, u32, String, Option<String>)> {
    snapshot
        .panes
        .iter()
        .filter(|pane| pane.agent_type != crate::agent_spec::AgentType::User)
        .map(|pane| {
            let command = if launch_agents { Some(pane.command.clone()) } else { None };
            (pane.agent_type, pane.index, pane.model.clone(), command)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_spec::AgentType;

    fn sample_session() -> Session {
        Session {
            name: "proj".to_string(),
            work_dir: PathBuf::from("/tmp/proj"),
            layout: "tiled".to_string(),
            panes: vec![
                Pane { id: "%0".into(), index: 0, title: "proj__user_1_".into(), agent_type: AgentType::User, command: String::new(), active: true, tags: vec![] },
                Pane { id: "%1".into(), index: 1, title: "proj__cc_1_opus-4".into(), agent_type: AgentType::Claude, command: "claude --model opus-4".into(), active: false, tags: vec![] },
            ],
            agents_summary: [("cc".to_string(), 1)].into_iter().collect(),
            git: None,
        }
    }

    #[test]
    fn save_then_load_round_trips_core_fields() {
        let dir = tempfile::tempdir().unwrap();
        let session = sample_session();
        let snapshot = SessionSnapshot::capture(&session);
        save(dir.path(), "proj", &snapshot).unwrap();
        let loaded = load(dir.path(), "proj").unwrap();
        assert_eq!(loaded.name, session.name);
        assert_eq!(loaded.panes.len(), 2);
        assert_eq!(loaded.panes[1].model, "opus-4");
    }

    #[test]
    fn load_missing_snapshot_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, PaneforgeError::NotFound(_)));
    }

    #[test]
    fn restore_plan_drops_user_pane_and_honours_launch_agents() {
        let session = sample_session();
        let snapshot = SessionSnapshot::capture(&session);
        let plan = restore_plan(&snapshot, false);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].0, AgentType::Claude);
        assert!(plan[0].3.is_none());
    }
}
