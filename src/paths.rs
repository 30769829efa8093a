use std::path::PathBuf;
use std::sync::OnceLock;

static CONFIG_HOME: OnceLock<PathBuf> = OnceLock::new();
static DATA_HOME: OnceLock<PathBuf> = OnceLock::new();

/// `$XDG_CONFIG_HOME/paneforge/` (falls back to `~/.config/paneforge/`).
/// Supports a `$PANEFORGE_HOME` override for the whole tree, matching the
/// single-root override style of the upstream `$XDG_CONFIG_HOME`.
pub fn config_home() -> &'static PathBuf {
    CONFIG_HOME.get_or_init(|| {
        if let Some(root) = paneforge_home_override() {
            return root.join("config");
        }
        if let Ok(val) = std::env::var("XDG_CONFIG_HOME") {
            if !val.is_empty() {
                return PathBuf::from(val).join("paneforge");
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("paneforge")
    })
}

/// `$XDG_DATA_HOME/paneforge/` (falls back to `~/.local/share/paneforge/`).
pub fn data_home() -> &'static PathBuf {
    DATA_HOME.get_or_init(|| {
        if let Some(root) = paneforge_home_override() {
            return root.join("data");
        }
        if let Ok(val) = std::env::var("XDG_DATA_HOME") {
            if !val.is_empty() {
                return PathBuf::from(val).join("paneforge");
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("share")
            .join("paneforge")
    })
}

fn paneforge_home_override() -> Option<PathBuf> {
    let val = std::env::var("PANEFORGE_HOME").ok()?;
    if val.is_empty() {
        return None;
    }
    Some(PathBuf::from(val))
}

/// User config file: `$XDG_CONFIG_HOME/paneforge/config.toml`.
pub fn user_config_file() -> PathBuf {
    config_home().join("config.toml")
}

/// Project config file, relative to a project root: `<root>/.paneforge/config.toml`.
pub fn project_config_file(project_root: &std::path::Path) -> PathBuf {
    project_root.join(".paneforge").join("config.toml")
}

/// User persona/recipe registry overlay: `$XDG_CONFIG_HOME/paneforge/registry.toml`.
pub fn user_registry_file() -> PathBuf {
    config_home().join("registry.toml")
}

/// Project persona/recipe registry overlay, relative to a project root:
/// `<root>/.paneforge/registry.toml`.
pub fn project_registry_file(project_root: &std::path::Path) -> PathBuf {
    project_root.join(".paneforge").join("registry.toml")
}

/// `$XDG_DATA_HOME/paneforge/history.ndjson`.
pub fn history_file() -> PathBuf {
    data_home().join("history.ndjson")
}

/// `$XDG_DATA_HOME/paneforge/events.ndjson`.
pub fn events_file() -> PathBuf {
    data_home().join("events.ndjson")
}

/// `$XDG_DATA_HOME/paneforge/sessions/`.
pub fn sessions_dir() -> PathBuf {
    data_home().join("sessions")
}

/// `$XDG_DATA_HOME/paneforge/logs/`.
pub fn logs_dir() -> PathBuf {
    data_home().join("logs")
}
