use crate::config::Config;
use anyhow::Result;
use std::path::{Path, PathBuf};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

fn ok(label: &str, detail: &str) {
    println!("  {GREEN}[OK]{RESET}   {label}: {detail}");
}

fn fail(label: &str, detail: &str) {
    println!("  {RED}[FAIL]{RESET} {label}: {detail}");
}

fn info(label: &str, detail: &str) {
    println!("  {CYAN}[INFO]{RESET} {label}: {detail}");
}

pub async fn run(config: &Config, config_paths: &[PathBuf]) -> Result<()> {
    println!("pf doctor\n");

    let version = env!("CARGO_PKG_VERSION");
    ok("Version", version);

    if config_paths.is_empty() {
        info("Config", "(built-in defaults only)");
    } else {
        for p in config_paths {
            ok("Config", &p.display().to_string());
        }
    }

    match crate::workspace::resolve_project_dir(None) {
        Ok(ws) => ok("Workspace", &ws.display().to_string()),
        Err(_) => info("Workspace", "none (not inside a project)"),
    }

    check_tmux().await;
    check_agent_mail(config).await;
    check_data_dir();
    check_log_dir();
    check_peripheral_tuning(config);

    println!();
    Ok(())
}

/// `checkpoints`/`alerts`/`cass` are recognised config sections with no
/// behaviour in this core (`pf config` dumps them in full); doctor only
/// surfaces whether they carry any non-default tuning.
fn check_peripheral_tuning(config: &Config) {
    match config.cass.binary_path.as_deref() {
        Some(path) => info("CASS integration", &format!("binary configured at {path} (not invoked by this core)")),
        None => info("CASS integration", "not configured"),
    }
    if let Some(secs) = config.checkpoints.interval_secs {
        info("Checkpoints", &format!("interval_secs = {secs} (tuning only, no behaviour here)"));
    }
    if config.alerts.enabled {
        info("Alerts", "enabled (tuning only, no behaviour here)");
    }
}

async fn check_tmux() {
    match tokio::process::Command::new("tmux").arg("-V").output().await {
        Ok(out) if out.status.success() => {
            let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
            ok("tmux", &version);
        }
        Ok(out) => fail("tmux", &format!("exited with {}", out.status)),
        Err(e) => fail("tmux", &format!("not found on PATH ({e})")),
    }

    if std::env::var("TMUX").is_ok() {
        info("tmux session", "currently inside a tmux session");
    } else {
        info("tmux session", "not currently inside a tmux session");
    }
}

async fn check_agent_mail(config: &Config) {
    let label = "Agent Mail";
    match crate::mail::MailClient::new(&config.mail) {
        Ok(client) => {
            if client.is_available().await {
                ok(label, &format!("{} (reachable)", config.mail.base_url));
            } else {
                info(label, &format!("{} (unreachable — features degrade to unavailable)", config.mail.base_url));
            }
        }
        Err(e) => fail(label, &format!("failed to build HTTP client: {e}")),
    }
}

fn writable_check(label: &str, dir: &Path) {
    match std::fs::create_dir_all(dir) {
        Ok(()) => {
            let probe = dir.join(".doctor-check");
            match std::fs::write(&probe, "") {
                Ok(()) => {
                    let _ = std::fs::remove_file(&probe);
                    ok(label, &dir.display().to_string());
                }
                Err(_) => fail(label, &format!("{} (not writable)", dir.display())),
            }
        }
        Err(e) => fail(label, &format!("{} (cannot create: {e})", dir.display())),
    }
}

fn check_data_dir() {
    writable_check("Data dir", crate::paths::data_home());
}

fn check_log_dir() {
    writable_check("Log dir", &crate::paths::logs_dir());
}
