//! Single canonical error enum for the core, built with `thiserror`.
//!
//! Design rules (kept from the engine this was adapted from):
//!   - Variants are coarse-grained by domain (I/O, network, argument...).
//!   - `#[from]` wires std/external error conversions automatically.
//!   - Every variant carries a stable `exit_code()` and a robot-mode JSON
//!     rendering, so human and robot output paths can never drift from the
//!     same typed source of truth.

use serde::Serialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum PaneforgeError {
    /// User input rejected before any I/O — bad spec string, bad session
    /// name, bad duration literal.
    #[error("{0}")]
    ArgumentError(String),

    /// Session, pane, persona, or recipe not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The multiplexer failed or returned something we didn't expect.
    #[error("mux driver error: {0}")]
    DriverError(String),

    /// Agent Mail is unreachable or returned a non-2xx/network failure.
    #[error("coordination unavailable: {0}")]
    CoordinationUnavailable(String),

    /// A deadline elapsed before the operation completed.
    #[error("timed out")]
    Timeout,

    /// Fan-out operation where some targets succeeded and some failed.
    #[error("partial failure: {} of {} targets failed", failures.len(), total)]
    PartialFailure {
        total: usize,
        failures: Vec<(String, String)>,
    },

    /// Cancelled via an external cancellation signal.
    #[error("cancelled")]
    Cancelled,

    /// A named robot operation exists in the surface but is intentionally
    /// unimplemented (spec.md Design Notes: thin robot ops return a stable
    /// error rather than a guessed heuristic).
    #[error("not implemented: {0}")]
    Unimplemented(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl PaneforgeError {
    /// Exit code per spec.md §7/§4.5/§4.8: 0 success (never returned from
    /// here), 1 runtime failure, 2 argument error, 3 reserved for
    /// wait-on-error, 20 for the stable "unimplemented" surface.
    pub fn exit_code(&self) -> i32 {
        match self {
            PaneforgeError::ArgumentError(_) | PaneforgeError::Config(_) => 2,
            PaneforgeError::Unimplemented(_) => 20,
            PaneforgeError::Timeout => 1,
            PaneforgeError::Cancelled => 1,
            _ => 1,
        }
    }

    /// Stable machine-readable error code string for robot-mode payloads.
    pub fn error_code(&self) -> &'static str {
        match self {
            PaneforgeError::ArgumentError(_) => "argument_error",
            PaneforgeError::NotFound(_) => "not_found",
            PaneforgeError::DriverError(_) => "driver_error",
            PaneforgeError::CoordinationUnavailable(_) => "coordination_unavailable",
            PaneforgeError::Timeout => "timeout",
            PaneforgeError::PartialFailure { .. } => "partial_failure",
            PaneforgeError::Cancelled => "cancelled",
            PaneforgeError::Unimplemented(_) => "unimplemented",
            PaneforgeError::Io(_) => "io_error",
            PaneforgeError::Serialization(_) => "serialization_error",
            PaneforgeError::Network(_) => "network_error",
            PaneforgeError::Config(_) => "config_error",
        }
    }

    /// `{success: false, error, error_code, details?}` per spec.md §7.
    pub fn to_robot_json(&self) -> serde_json::Value {
        let mut payload = json!({
            "success": false,
            "error": self.to_string(),
            "error_code": self.error_code(),
        });
        if let PaneforgeError::PartialFailure { total, failures } = self {
            payload["details"] = json!({
                "total": total,
                "failures": failures.iter().map(|(pane, err)| json!({"pane": pane, "error": err})).collect::<Vec<_>>(),
            });
        }
        payload
    }
}

/// Errors serialized via `Serialize` (used when embedding inside a larger
/// typed robot payload rather than emitted standalone).
impl Serialize for PaneforgeError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_robot_json().serialize(serializer)
    }
}

pub type Result<T> = std::result::Result<T, PaneforgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argument_error_exit_code_is_two() {
        let err = PaneforgeError::ArgumentError("bad spec".into());
        assert_eq!(err.exit_code(), 2);
        assert_eq!(err.error_code(), "argument_error");
    }

    #[test]
    fn partial_failure_json_has_details() {
        let err = PaneforgeError::PartialFailure {
            total: 2,
            failures: vec![("myproj:2".to_string(), "boom".to_string())],
        };
        let json = err.to_robot_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["details"]["total"], 2);
    }

    #[test]
    fn unimplemented_exit_code_is_stable() {
        let err = PaneforgeError::Unimplemented("robot-assign");
        assert_eq!(err.exit_code(), 20);
    }
}
