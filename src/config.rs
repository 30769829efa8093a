//! Layered configuration: built-in defaults < user file < project file <
//! environment. Loaded once at startup into an immutable snapshot; the rest
//! of the core takes a reference (or a cheap `Arc` clone) rather than
//! threading a mutable global through hidden state.

use crate::agent_spec::AgentType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub projects_base: PathBuf,
    pub agents: HashMap<AgentType, AgentCommandTemplate>,
    pub models: ModelsConfig,
    pub tmux: TmuxConfig,
    pub checkpoints: CheckpointsConfig,
    pub alerts: AlertsConfig,
    pub cass: CassConfig,
    pub mail: MailConfig,
    pub history: HistoryConfig,
    pub logging: LoggingConfig,
    pub ack: AckConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCommandTemplate {
    pub program: String,
    /// May contain the literal placeholder `{model}`.
    pub args: Vec<String>,
}

impl AgentCommandTemplate {
    /// Substitute the resolved model into every `{model}` placeholder.
    pub fn render(&self, model: &str) -> (String, Vec<String>) {
        let args = self
            .args
            .iter()
            .map(|a| a.replace("{model}", model))
            .collect();
        (self.program.clone(), args)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub default: HashMap<AgentType, String>,
    pub aliases: HashMap<AgentType, HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TmuxConfig {
    pub default_panes: u32,
    pub palette_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointsConfig {
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CassConfig {
    pub binary_path: Option<String>,
    pub context: CassContext,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CassContext {
    pub max_sessions: u32,
    pub lookback_days: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub directory: Option<String>,
    pub retention_days: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AckConfig {
    pub per_type: HashMap<AgentType, AckTypeConfig>,
    pub error_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AckTypeConfig {
    pub ready_patterns: Vec<String>,
    pub error_patterns: Vec<String>,
    pub stability_polls: u32,
}

impl Default for Config {
    fn default() -> Self {
        let mut agents = HashMap::new();
        agents.insert(
            AgentType::Claude,
            AgentCommandTemplate {
                program: "claude".to_string(),
                args: vec!["--model".to_string(), "{model}".to_string()],
            },
        );
        agents.insert(
            AgentType::Codex,
            AgentCommandTemplate {
                program: "codex".to_string(),
                args: vec!["--model".to_string(), "{model}".to_string()],
            },
        );
        agents.insert(
            AgentType::Gemini,
            AgentCommandTemplate {
                program: "gemini".to_string(),
                args: vec!["--model".to_string(), "{model}".to_string()],
            },
        );

        let mut default_models = HashMap::new();
        default_models.insert(AgentType::Claude, "claude-sonnet-4-5".to_string());
        default_models.insert(AgentType::Codex, "gpt-5-codex".to_string());
        default_models.insert(AgentType::Gemini, "gemini-2.5-pro".to_string());

        Self {
            projects_base: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("paneforge-projects"),
            agents,
            models: ModelsConfig {
                default: default_models,
                aliases: HashMap::new(),
            },
            tmux: TmuxConfig {
                default_panes: 4,
                palette_key: "C-b".to_string(),
            },
            checkpoints: CheckpointsConfig::default(),
            alerts: AlertsConfig::default(),
            cass: CassConfig::default(),
            mail: MailConfig {
                base_url: "http://127.0.0.1:8765".to_string(),
                timeout_ms: 5000,
            },
            history: HistoryConfig::default(),
            logging: LoggingConfig::default(),
            ack: AckConfig::default(),
        }
    }
}

impl Default for AckConfig {
    fn default() -> Self {
        let mut per_type = HashMap::new();
        per_type.insert(
            AgentType::Claude,
            AckTypeConfig {
                ready_patterns: vec![r"\? for shortcuts".to_string(), r"Human:\s*$".to_string()],
                error_patterns: vec![],
                stability_polls: 2,
            },
        );
        per_type.insert(
            AgentType::Codex,
            AckTypeConfig {
                ready_patterns: vec!["\u{203a}\\s*$".to_string()],
                error_patterns: vec![],
                stability_polls: 2,
            },
        );
        per_type.insert(
            AgentType::Gemini,
            AckTypeConfig {
                ready_patterns: vec!["Type your message".to_string()],
                error_patterns: vec![],
                stability_polls: 2,
            },
        );
        Self {
            per_type,
            error_patterns: vec![
                "error:".to_string(),
                "panic:".to_string(),
                "traceback".to_string(),
                "failed".to_string(),
            ],
        }
    }
}

impl Config {
    /// Two-phase init, phase 2: merge builtin < user < project < env.
    /// `project_root` is optional because the project file may not be
    /// known yet (e.g. when listing personas before a project dir is
    /// picked) — in that case only builtin/user/env are consulted.
    pub fn load(project_root: Option<&Path>) -> Result<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut loaded_from = Vec::new();

        let user_path = crate::paths::user_config_file();
        if user_path.exists() {
            merge_file(&mut config, &user_path)?;
            loaded_from.push(user_path);
        }

        if let Some(root) = project_root {
            let project_path = crate::paths::project_config_file(root);
            if project_path.exists() {
                merge_file(&mut config, &project_path)?;
                loaded_from.push(project_path);
            }
        }

        apply_env_overrides(&mut config);

        Ok((config, loaded_from))
    }
}

fn merge_file(config: &mut Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let overlay: ConfigOverlay = toml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    overlay.apply(config);
    Ok(())
}

/// A config file may set any subset of fields; absent fields fall through
/// to whatever was already in `config` (builtin default or an earlier,
/// lower-precedence file).
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    projects_base: Option<PathBuf>,
    agents: Option<HashMap<AgentType, AgentCommandTemplate>>,
    models: Option<ModelsConfig>,
    tmux: Option<TmuxConfig>,
    checkpoints: Option<CheckpointsConfig>,
    alerts: Option<AlertsConfig>,
    cass: Option<CassConfig>,
    mail: Option<MailConfig>,
    history: Option<HistoryConfig>,
    logging: Option<LoggingConfig>,
    ack: Option<AckConfig>,
}

impl ConfigOverlay {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.projects_base {
            config.projects_base = v;
        }
        if let Some(v) = self.agents {
            config.agents.extend(v);
        }
        if let Some(v) = self.models {
            config.models.default.extend(v.default);
            config.models.aliases.extend(v.aliases);
        }
        if let Some(v) = self.tmux {
            config.tmux = v;
        }
        if let Some(v) = self.checkpoints {
            config.checkpoints = v;
        }
        if let Some(v) = self.alerts {
            config.alerts = v;
        }
        if let Some(v) = self.cass {
            config.cass = v;
        }
        if let Some(v) = self.mail {
            config.mail = v;
        }
        if let Some(v) = self.history {
            config.history = v;
        }
        if let Some(v) = self.logging {
            config.logging = v;
        }
        if let Some(v) = self.ack {
            config.ack.per_type.extend(v.per_type);
            config.ack.error_patterns = v.error_patterns;
        }
    }
}

/// Narrow allow-list of `PANEFORGE_*` environment overrides, per spec.md §6.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(url) = std::env::var("PANEFORGE_MAIL_BASE_URL") {
        if !url.is_empty() {
            config.mail.base_url = url;
        }
    }
    if let Ok(ms) = std::env::var("PANEFORGE_MAIL_TIMEOUT_MS") {
        if let Ok(ms) = ms.parse() {
            config.mail.timeout_ms = ms;
        }
    }
    if let Ok(level) = std::env::var("PANEFORGE_LOG_LEVEL") {
        if !level.is_empty() {
            config.logging.level = Some(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_all_three_agent_types() {
        let config = Config::default();
        assert!(config.agents.contains_key(&AgentType::Claude));
        assert!(config.agents.contains_key(&AgentType::Codex));
        assert!(config.agents.contains_key(&AgentType::Gemini));
    }

    #[test]
    fn command_template_renders_model_placeholder() {
        let tpl = AgentCommandTemplate {
            program: "claude".to_string(),
            args: vec!["--model".to_string(), "{model}".to_string()],
        };
        let (program, args) = tpl.render("opus-4");
        assert_eq!(program, "claude");
        assert_eq!(args, vec!["--model".to_string(), "opus-4".to_string()]);
    }

    #[test]
    fn env_override_applies() {
        std::env::set_var("PANEFORGE_MAIL_BASE_URL", "http://example.test");
        let mut config = Config::default();
        apply_env_overrides(&mut config);
        assert_eq!(config.mail.base_url, "http://example.test");
        std::env::remove_var("PANEFORGE_MAIL_BASE_URL");
    }
}
