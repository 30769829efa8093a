//! Agent spec parsing and flattening: turn user-facing specs (`N`, `N:model`,
//! recipes, personas) into a concrete ordered list of agent slots.

pub mod registry;

use crate::error::{PaneforgeError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Closed set of agent kinds. Every downstream switch on agent identity is a
/// match over this enum rather than a string lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Claude,
    Codex,
    Gemini,
    User,
}

impl AgentType {
    /// The short code embedded in pane titles (`cc|cod|gmi|user`).
    pub fn code(self) -> &'static str {
        match self {
            AgentType::Claude => "cc",
            AgentType::Codex => "cod",
            AgentType::Gemini => "gmi",
            AgentType::User => "user",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "cc" => Some(AgentType::Claude),
            "cod" => Some(AgentType::Codex),
            "gmi" => Some(AgentType::Gemini),
            "user" => Some(AgentType::User),
            _ => None,
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// `[A-Za-z0-9._/@:+-]+`, no whitespace, no shell metacharacters. A security
/// boundary: model strings are later interpolated into command templates and
/// embedded verbatim into pane titles.
fn model_charset() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._/@:+-]+$").unwrap())
}

pub fn is_safe_model_string(s: &str) -> bool {
    !s.is_empty() && model_charset().is_match(s)
}

/// `{type, count, model}` as parsed from one spec token, before flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub agent_type: AgentType,
    pub count: u32,
    pub model: Option<String>,
}

/// `{type, index (1-based per type), model}`, fully resolved and ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct FlatAgent {
    pub agent_type: AgentType,
    pub index: u32,
    pub model: String,
}

/// Parse one `N` or `N:model` token for a known agent type.
///
/// Split on the first `:`; the left side must be a base-10 integer `>= 1`;
/// the right side, if present, must be non-empty after trim and match the
/// safe-charset regex. Any whitespace or shell metacharacter in the model
/// portion is a hard error.
pub fn parse(agent_type: AgentType, token: &str) -> Result<AgentSpec> {
    let (count_str, model_str) = match token.split_once(':') {
        Some((c, m)) => (c, Some(m)),
        None => (token, None),
    };

    let count: i64 = count_str
        .trim()
        .parse()
        .map_err(|_| PaneforgeError::ArgumentError(format!("not an integer: {count_str:?}")))?;
    if count < 1 {
        return Err(PaneforgeError::ArgumentError(format!(
            "count must be >= 1, got {count}"
        )));
    }

    let model = match model_str {
        None => None,
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(PaneforgeError::ArgumentError(
                    "model portion is empty after ':'".to_string(),
                ));
            }
            if trimmed.len() != raw.len() {
                return Err(PaneforgeError::ArgumentError(
                    "model portion must not contain leading/trailing whitespace".to_string(),
                ));
            }
            if !is_safe_model_string(trimmed) {
                return Err(PaneforgeError::ArgumentError(format!(
                    "model {trimmed:?} contains characters outside the allowed charset \
                     [A-Za-z0-9._/@:+-]"
                )));
            }
            Some(trimmed.to_string())
        }
    };

    Ok(AgentSpec {
        agent_type,
        count: count as u32,
        model,
    })
}

/// Canonical string form, `N` or `N:model`; `parse(spec.to_canonical()) ==
/// spec` for every spec produced by `parse`.
impl AgentSpec {
    pub fn to_canonical(&self) -> String {
        match &self.model {
            Some(m) => format!("{}:{}", self.count, m),
            None => self.count.to_string(),
        }
    }
}

/// Flatten an ordered `AgentSpec` list into an ordered `FlatAgent` list.
/// Declaration order across types is preserved; within each type, indices
/// are re-numbered contiguously starting at 1. The model for a slot with no
/// explicit model resolves later, at spawn time, via `resolve_model` — here
/// it is carried through as an empty string placeholder only when callers
/// pre-resolve; `flatten` itself never invents a model.
pub fn flatten(specs: &[AgentSpec]) -> Vec<FlatAgent> {
    let mut next_index = std::collections::HashMap::new();
    let mut out = Vec::new();
    for spec in specs {
        for _ in 0..spec.count {
            let idx = next_index.entry(spec.agent_type).or_insert(0u32);
            *idx += 1;
            out.push(FlatAgent {
                agent_type: spec.agent_type,
                index: *idx,
                model: spec.model.clone().unwrap_or_default(),
            });
        }
    }
    out
}

/// Resolve a (possibly empty/alias) model string to a concrete model.
///
/// Precedence: (1) an explicit, already charset-validated model on the slot
/// wins outright; (2) if the slot's model token is itself an alias known to
/// `config.models.aliases[type]`, substitute the aliased value (reachable
/// when a recipe embeds an alias rather than a literal model); (3) the
/// configured per-type default; (4) a hard-coded fallback baked into
/// `Config::default()` (so resolution never fails even with an empty
/// config file).
pub fn resolve_model(
    agent_type: AgentType,
    model_or_alias: &str,
    config: &crate::config::Config,
) -> String {
    if !model_or_alias.is_empty() {
        if let Some(aliases) = config.models.aliases.get(&agent_type) {
            if let Some(resolved) = aliases.get(model_or_alias) {
                return resolved.clone();
            }
        }
        return model_or_alias.to_string();
    }
    if let Some(default) = config.models.default.get(&agent_type) {
        return default.clone();
    }
    match agent_type {
        AgentType::Claude => "claude-sonnet-4-5".to_string(),
        AgentType::Codex => "gpt-5-codex".to_string(),
        AgentType::Gemini => "gemini-2.5-pro".to_string(),
        AgentType::User => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_count() {
        let spec = parse(AgentType::Claude, "2").unwrap();
        assert_eq!(spec.count, 2);
        assert_eq!(spec.model, None);
    }

    #[test]
    fn parse_count_with_model() {
        let spec = parse(AgentType::Codex, "1:gpt-4.1").unwrap();
        assert_eq!(spec.count, 1);
        assert_eq!(spec.model.as_deref(), Some("gpt-4.1"));
    }

    #[test]
    fn zero_count_rejected() {
        assert!(parse(AgentType::Claude, "0").is_err());
    }

    #[test]
    fn negative_count_rejected() {
        assert!(parse(AgentType::Claude, "-1").is_err());
    }

    #[test]
    fn rejects_shell_metacharacters_in_model() {
        let err = parse(AgentType::Codex, "1:$(touch /tmp/pwn)").unwrap_err();
        assert!(err.to_string().contains("charset") || format!("{err:?}").contains("charset"));
    }

    #[test]
    fn rejects_whitespace_in_model() {
        assert!(parse(AgentType::Claude, "1:model with space").is_err());
    }

    #[test]
    fn canonical_round_trips() {
        for token in ["2", "1:gpt-4.1"] {
            let spec = parse(AgentType::Codex, token).unwrap();
            assert_eq!(spec.to_canonical(), token);
        }
    }

    #[test]
    fn flatten_preserves_declaration_order_and_reindexes_per_type() {
        let specs = vec![
            AgentSpec { agent_type: AgentType::Claude, count: 2, model: None },
            AgentSpec { agent_type: AgentType::Codex, count: 1, model: None },
            AgentSpec { agent_type: AgentType::Claude, count: 1, model: None },
        ];
        let flat = flatten(&specs);
        let summary: Vec<(AgentType, u32)> =
            flat.iter().map(|a| (a.agent_type, a.index)).collect();
        assert_eq!(
            summary,
            vec![
                (AgentType::Claude, 1),
                (AgentType::Claude, 2),
                (AgentType::Codex, 1),
                (AgentType::Claude, 3),
            ]
        );
    }

    #[test]
    fn flatten_scenario_from_spec() {
        let specs = vec![
            parse(AgentType::Claude, "2").unwrap(),
            parse(AgentType::Codex, "1:gpt-4.1").unwrap(),
            parse(AgentType::Gemini, "1").unwrap(),
        ];
        let flat = flatten(&specs);
        assert_eq!(flat.len(), 4);
        assert_eq!(flat[0], FlatAgent { agent_type: AgentType::Claude, index: 1, model: String::new() });
        assert_eq!(flat[1], FlatAgent { agent_type: AgentType::Claude, index: 2, model: String::new() });
        assert_eq!(flat[2], FlatAgent { agent_type: AgentType::Codex, index: 1, model: "gpt-4.1".to_string() });
        assert_eq!(flat[3], FlatAgent { agent_type: AgentType::Gemini, index: 1, model: String::new() });
    }

    #[test]
    fn resolve_model_falls_through_to_default() {
        let config = crate::config::Config::default();
        let resolved = resolve_model(AgentType::Claude, "", &config);
        assert_eq!(resolved, config.models.default[&AgentType::Claude]);
    }

    #[test]
    fn resolve_model_explicit_wins_over_default() {
        let config = crate::config::Config::default();
        let resolved = resolve_model(AgentType::Claude, "opus-4", &config);
        assert_eq!(resolved, "opus-4");
    }
}
