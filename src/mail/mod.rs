//! HTTP client for the external Agent Mail coordination service. Mirrors
//! the shape of the in-tree memory-server client: a thin `reqwest::Client`
//! wrapper, one method per endpoint, errors surfaced with the server's body
//! text attached.

pub mod reservations;

use crate::config::MailConfig;
use crate::error::{PaneforgeError, Result};
use reservations::FileReservation;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub struct MailClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InboxMessage {
    pub id: String,
    pub from: String,
    pub body: String,
    pub urgent: bool,
    pub read: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ProjectAgent {
    pub name: String,
    pub agent_type: String,
}

/// Canonicalise a working directory into the project key Agent Mail expects.
/// Falls back to the lossy path string if the directory does not (yet)
/// exist on disk.
pub fn project_key(work_dir: &Path) -> String {
    work_dir
        .canonicalize()
        .unwrap_or_else(|_| work_dir.to_path_buf())
        .to_string_lossy()
        .to_string()
}

impl MailClient {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(PaneforgeError::Network)?;
        Ok(Self { base_url: config.base_url.clone(), client })
    }

    /// Lightweight reachability probe. Agent Mail is optional: callers
    /// degrade to a typed "unavailable" result instead of failing when this
    /// returns false.
    pub async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn request_json<T: for<'de> Deserialize<'de>>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = req.send().await.map_err(|e| {
            PaneforgeError::CoordinationUnavailable(format!("agent mail request failed: {e}"))
        })?;
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PaneforgeError::CoordinationUnavailable(text));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PaneforgeError::CoordinationUnavailable(format!("bad response body: {e}")))
    }

    /// Idempotent: calling twice for the same project key is observationally
    /// equivalent to calling once.
    pub async fn ensure_project(&self, project_key: &str) -> Result<()> {
        let url = format!("{}/api/projects", self.base_url);
        #[derive(Serialize)]
        struct Req<'a> {
            project_key: &'a str,
        }
        let response = self
            .client
            .post(&url)
            .json(&Req { project_key })
            .send()
            .await
            .map_err(|e| PaneforgeError::CoordinationUnavailable(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(PaneforgeError::CoordinationUnavailable(response.text().await.unwrap_or_default()))
        }
    }

    pub async fn list_project_agents(&self, project_key: &str) -> Result<Vec<ProjectAgent>> {
        let url = format!("{}/api/projects/{project_key}/agents", self.base_url);
        self.request_json(self.client.get(url)).await
    }

    pub async fn fetch_inbox(
        &self,
        project_key: &str,
        agent_name: &str,
        urgent_only: bool,
        limit: u32,
        include_bodies: bool,
    ) -> Result<Vec<InboxMessage>> {
        let url = format!("{}/api/projects/{project_key}/agents/{agent_name}/inbox", self.base_url);
        self.request_json(self.client.get(url).query(&[
            ("urgent_only", urgent_only.to_string()),
            ("limit", limit.to_string()),
            ("include_bodies", include_bodies.to_string()),
        ]))
        .await
    }

    pub async fn mark_read(&self, project_key: &str, message_id: &str) -> Result<()> {
        let url = format!("{}/api/projects/{project_key}/messages/{message_id}/read", self.base_url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| PaneforgeError::CoordinationUnavailable(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(PaneforgeError::CoordinationUnavailable(response.text().await.unwrap_or_default()))
        }
    }

    pub async fn acknowledge(&self, project_key: &str, message_id: &str) -> Result<()> {
        let url = format!("{}/api/projects/{project_key}/messages/{message_id}/ack", self.base_url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| PaneforgeError::CoordinationUnavailable(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(PaneforgeError::CoordinationUnavailable(response.text().await.unwrap_or_default()))
        }
    }

    pub async fn list_reservations(&self, project_key: &str) -> Result<Vec<FileReservation>> {
        #[derive(Deserialize)]
        struct Raw {
            path_pattern: String,
            agent_name: String,
            exclusive: bool,
            expires_ts: u64,
            reason: String,
        }
        let url = format!("{}/api/projects/{project_key}/reservations", self.base_url);
        let raw: Vec<Raw> = self.request_json(self.client.get(url)).await?;
        Ok(raw
            .into_iter()
            .map(|r| FileReservation {
                path_pattern: r.path_pattern,
                agent_name: r.agent_name,
                exclusive: r.exclusive,
                expires_ts: r.expires_ts,
                reason: r.reason,
            })
            .collect())
    }

    pub async fn release_reservations(&self, project_key: &str, agent_name: &str) -> Result<()> {
        let url = format!("{}/api/projects/{project_key}/agents/{agent_name}/reservations", self.base_url);
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| PaneforgeError::CoordinationUnavailable(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(PaneforgeError::CoordinationUnavailable(response.text().await.unwrap_or_default()))
        }
    }

    /// The Human Overseer identity bypasses per-agent contact policy on the
    /// server side; this client just tags the sender.
    pub async fn send_overseer_message(&self, project_key: &str, to_agent: &str, body: &str) -> Result<()> {
        #[derive(Serialize)]
        struct Req<'a> {
            from: &'a str,
            to: &'a str,
            body: &'a str,
        }
        let url = format!("{}/api/projects/{project_key}/messages", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&Req { from: "Human Overseer", to: to_agent, body })
            .send()
            .await
            .map_err(|e| PaneforgeError::CoordinationUnavailable(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(PaneforgeError::CoordinationUnavailable(response.text().await.unwrap_or_default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_key_falls_back_to_lossy_path_for_nonexistent_dir() {
        let key = project_key(Path::new("/definitely/does/not/exist/paneforge-test"));
        assert!(key.contains("paneforge-test"));
    }

    #[test]
    fn client_builds_with_configured_timeout() {
        let config = MailConfig { base_url: "http://127.0.0.1:8765".to_string(), timeout_ms: 1000 };
        assert!(MailClient::new(&config).is_ok());
    }
}
