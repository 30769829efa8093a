//! In-process read-through cache of file reservations held by the external
//! coordination service. Glob matching is the same `globset`-backed approach
//! used for path-scoped exclusive locks; here the cache never grants or
//! revokes a reservation itself, it only remembers the server's last answer
//! for a session's status read.

use globset::Glob;
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, schemars::JsonSchema)]
pub struct FileReservation {
    pub path_pattern: String,
    pub agent_name: String,
    pub exclusive: bool,
    pub expires_ts: u64,
    pub reason: String,
}

pub struct ReservationCache {
    reservations: Vec<FileReservation>,
    fetched_at: Option<Instant>,
    ttl: Duration,
}

impl ReservationCache {
    pub fn new(ttl: Duration) -> Self {
        Self { reservations: Vec::new(), fetched_at: None, ttl }
    }

    pub fn is_stale(&self) -> bool {
        match self.fetched_at {
            None => true,
            Some(at) => at.elapsed() >= self.ttl,
        }
    }

    pub fn refresh(&mut self, reservations: Vec<FileReservation>) {
        self.reservations = reservations;
        self.fetched_at = Some(Instant::now());
    }

    /// True if any *other* agent holds an exclusive reservation whose glob
    /// matches `path`. A reservation held by `agent` itself never conflicts
    /// with that same agent.
    pub fn conflicts(&self, path: &str, agent: &str) -> bool {
        self.reservations.iter().any(|r| {
            r.exclusive
                && r.agent_name != agent
                && Glob::new(&r.path_pattern)
                    .map(|g| g.compile_matcher().is_match(path))
                    .unwrap_or(false)
        })
    }

    pub fn all(&self) -> &[FileReservation] {
        &self.reservations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation(pattern: &str, agent: &str, exclusive: bool) -> FileReservation {
        FileReservation {
            path_pattern: pattern.to_string(),
            agent_name: agent.to_string(),
            exclusive,
            expires_ts: 0,
            reason: String::new(),
        }
    }

    #[test]
    fn conflict_detected_for_other_agents_exclusive_glob() {
        let mut cache = ReservationCache::new(Duration::from_secs(30));
        cache.refresh(vec![reservation("src/**/*.rs", "agent-a", true)]);
        assert!(cache.conflicts("src/main.rs", "agent-b"));
    }

    #[test]
    fn own_reservation_never_conflicts() {
        let mut cache = ReservationCache::new(Duration::from_secs(30));
        cache.refresh(vec![reservation("src/**/*.rs", "agent-a", true)]);
        assert!(!cache.conflicts("src/main.rs", "agent-a"));
    }

    #[test]
    fn non_exclusive_reservation_never_conflicts() {
        let mut cache = ReservationCache::new(Duration::from_secs(30));
        cache.refresh(vec![reservation("src/**/*.rs", "agent-a", false)]);
        assert!(!cache.conflicts("src/main.rs", "agent-b"));
    }

    #[test]
    fn freshly_constructed_cache_is_stale() {
        let cache = ReservationCache::new(Duration::from_secs(30));
        assert!(cache.is_stale());
    }
}
