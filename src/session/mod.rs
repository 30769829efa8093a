//! Session and pane domain types, plus lifecycle operations: spawn,
//! add-agents, destroy. Save/restore snapshot persistence lives in
//! `snapshot.rs`.

pub mod snapshot;

use crate::agent_spec::{resolve_model, AgentType, FlatAgent};
use crate::config::Config;
use crate::error::{PaneforgeError, Result};
use crate::mux::title;
use crate::mux::MuxDriver;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GitContext {
    pub branch: String,
    pub remote: Option<String>,
    pub commit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Pane {
    pub id: String,
    pub index: u32,
    pub title: String,
    pub agent_type: AgentType,
    pub command: String,
    pub active: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Session {
    pub name: String,
    pub work_dir: PathBuf,
    pub layout: String,
    pub panes: Vec<Pane>,
    pub agents_summary: std::collections::HashMap<String, u32>,
    pub git: Option<GitContext>,
}

/// Session names are MUX addresses; `:` and `.` are reserved by MUX address
/// syntax and must never appear.
pub fn validate_session_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PaneforgeError::ArgumentError("session name must not be empty".into()));
    }
    if name.contains(':') || name.contains('.') {
        return Err(PaneforgeError::ArgumentError(format!(
            "session name {name:?} must not contain ':' or '.'"
        )));
    }
    Ok(())
}

fn agents_summary(panes: &[Pane]) -> std::collections::HashMap<String, u32> {
    let mut summary = std::collections::HashMap::new();
    for pane in panes {
        if pane.agent_type == AgentType::User {
            continue;
        }
        *summary.entry(pane.agent_type.code().to_string()).or_insert(0) += 1;
    }
    summary
}

/// Spawn a new session: validate name, ensure the project dir exists,
/// create the MUX session with an initial User pane (unless disabled), add
/// one pane per `FlatAgent`, then tile the layout.
///
/// On partial failure (some panes created, one fails) this does **not**
/// roll back: it returns the partial session alongside the first error.
/// Idempotent re-spawn is out of scope.
pub async fn spawn(
    mux: &Arc<dyn MuxDriver>,
    config: &Config,
    name: &str,
    agents: &[FlatAgent],
    user_pane: bool,
    project_dir: &Path,
) -> (Session, Option<PaneforgeError>) {
    if let Err(e) = validate_session_name(name) {
        return (
            Session {
                name: name.to_string(),
                work_dir: project_dir.to_path_buf(),
                layout: "tiled".to_string(),
                panes: Vec::new(),
                agents_summary: Default::default(),
                git: None,
            },
            Some(e),
        );
    }

    if let Err(e) = tokio::fs::create_dir_all(project_dir).await {
        return (
            Session {
                name: name.to_string(),
                work_dir: project_dir.to_path_buf(),
                layout: "tiled".to_string(),
                panes: Vec::new(),
                agents_summary: Default::default(),
                git: None,
            },
            Some(PaneforgeError::Io(e)),
        );
    }

    let mut panes = Vec::new();
    let mut first_error = None;

    if user_pane {
        let user_title = title::encode(name, AgentType::User, 1, "");
        match mux.new_session(name, &user_title, project_dir, None).await {
            Ok(pane) => panes.push(pane),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    for (i, agent) in agents.iter().enumerate() {
        let model = resolve_model(agent.agent_type, &agent.model, config);
        let pane_title = title::encode(name, agent.agent_type, agent.index, &model);
        let template = config.agents.get(&agent.agent_type);
        let command = template
            .map(|t| {
                let (program, args) = t.render(&model);
                std::iter::once(program).chain(args).collect::<Vec<_>>().join(" ")
            })
            .unwrap_or_default();

        let result = if panes.is_empty() && i == 0 && !user_pane {
            mux.new_session(name, &pane_title, project_dir, Some(&command)).await
        } else {
            mux.split_pane(name, &pane_title, project_dir, Some(&command)).await
        };

        match result {
            Ok(mut pane) => {
                pane.agent_type = agent.agent_type;
                pane.command = command;
                panes.push(pane);
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    if first_error.is_none() {
        if let Err(e) = mux.apply_tiled_layout(name).await {
            first_error = Some(e);
        }
    }

    let agents_summary = agents_summary(&panes);
    (
        Session {
            name: name.to_string(),
            work_dir: project_dir.to_path_buf(),
            layout: "tiled".to_string(),
            panes,
            agents_summary,
            git: None,
        },
        first_error,
    )
}

/// Append agents to an existing session. Per-type indices continue past the
/// current max, found by scanning existing pane titles.
pub async fn add_agents(
    mux: &Arc<dyn MuxDriver>,
    config: &Config,
    session_name: &str,
    new_agents: &[(AgentType, Option<String>)],
    project_dir: &Path,
) -> (Vec<Pane>, Option<PaneforgeError>) {
    let existing = mux.get_panes(session_name).await.unwrap_or_default();
    let mut next_index: std::collections::HashMap<AgentType, u32> = std::collections::HashMap::new();
    for pane in &existing {
        let entry = next_index.entry(pane.agent_type).or_insert(0);
        *entry = (*entry).max(pane.index);
    }

    let mut created = Vec::new();
    let mut first_error = None;
    for (agent_type, model_token) in new_agents {
        let idx = next_index.entry(*agent_type).or_insert(0);
        *idx += 1;
        let model = resolve_model(*agent_type, model_token.as_deref().unwrap_or(""), config);
        let pane_title = title::encode(session_name, *agent_type, *idx, &model);
        let command = config
            .agents
            .get(agent_type)
            .map(|t| {
                let (program, args) = t.render(&model);
                std::iter::once(program).chain(args).collect::<Vec<_>>().join(" ")
            })
            .unwrap_or_default();

        match mux.split_pane(session_name, &pane_title, project_dir, Some(&command)).await {
            Ok(mut pane) => {
                pane.agent_type = *agent_type;
                pane.command = command;
                created.push(pane);
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    (created, first_error)
}

pub async fn destroy(mux: &Arc<dyn MuxDriver>, session_name: &str) -> Result<()> {
    mux.kill_session(session_name).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_colon_in_name() {
        assert!(validate_session_name("my:proj").is_err());
    }

    #[test]
    fn rejects_dot_in_name() {
        assert!(validate_session_name("my.proj").is_err());
    }

    #[test]
    fn rejects_empty_name() {
        assert!(validate_session_name("").is_err());
    }

    #[test]
    fn accepts_plain_name() {
        assert!(validate_session_name("myproj").is_ok());
    }
}
