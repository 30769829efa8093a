//! Append-only NDJSON history log, adapted from the session chat-message
//! store: single `OpenOptions::append` + one `writeln!` per entry, keeping
//! each write atomic at the line level. Generalized here from a per-session
//! messages file to one process-wide log under
//! `$XDG_DATA_HOME/paneforge/history.ndjson`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    Cli,
    Palette,
    Replay,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HistoryEntry {
    /// Sortable, time-prefixed: `{millis_since_epoch:013}-{uuid_v4_suffix:8hex}`.
    pub id: String,
    pub ts: u64,
    pub session: String,
    pub targets: Vec<String>,
    pub prompt: String,
    pub source: HistorySource,
    pub template: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Lexicographically sortable, time-prefixed ID. Two calls in the same
/// millisecond still produce distinct, comparably-ordered IDs (history is a
/// log, not a set — the same prompt sent twice gets two entries).
pub fn new_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
    format!("{millis:013}-{suffix}")
}

pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Append one entry. Single write of bytes ending in `\n`; file is
    /// opened append-only so concurrent writers never interleave partial
    /// lines.
    pub fn append(&self, entry: &HistoryEntry) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(entry)?;
        let mut file = fs::OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn read_all(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(trimmed) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("skipping corrupt history line: {e}"),
            }
        }
        Ok(entries)
    }

    /// All entries, oldest first (insertion order).
    pub fn all(&self) -> anyhow::Result<Vec<HistoryEntry>> {
        self.read_all()
    }

    /// Substring match on prompt text.
    pub fn search(&self, needle: &str) -> anyhow::Result<Vec<HistoryEntry>> {
        Ok(self.read_all()?.into_iter().filter(|e| e.prompt.contains(needle)).collect())
    }

    /// Exact match on the session field.
    pub fn by_session(&self, session: &str) -> anyhow::Result<Vec<HistoryEntry>> {
        Ok(self.read_all()?.into_iter().filter(|e| e.session == session).collect())
    }

    /// Retain only the newest `keep_n` entries by ID ordering, rewriting the
    /// file.
    pub fn prune(&self, keep_n: usize) -> anyhow::Result<usize> {
        let mut entries = self.read_all()?;
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        let removed = entries.len().saturating_sub(keep_n);
        let kept: Vec<_> = entries.into_iter().rev().take(keep_n).rev().collect();
        let mut out = String::new();
        for entry in &kept {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        fs::write(&self.path, out)?;
        Ok(removed)
    }

    /// Copy the file verbatim to `dest`.
    pub fn export(&self, dest: &Path) -> anyhow::Result<()> {
        fs::copy(&self.path, dest)?;
        Ok(())
    }
}
