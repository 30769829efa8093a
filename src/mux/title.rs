//! Pane title codec: `{session}__{code}_{index}_{model}`.
//!
//! The multiplexer carries no typed metadata, so the title string is the
//! canonical channel for recovering agent identity — routing and
//! reservation lookups parse it back rather than trusting external state.

use crate::agent_spec::AgentType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaneIdentity {
    pub session: String,
    pub agent_type: AgentType,
    pub index: u32,
    pub model: String,
}

pub fn encode(session: &str, agent_type: AgentType, index: u32, model: &str) -> String {
    format!("{session}__{}_{index}_{model}", agent_type.code())
}

/// Parse a title produced by `encode`. Tolerant of a model containing `_`
/// (the safe charset allows it) by splitting the `code_index_model` segment
/// on `_` only twice, from the left.
pub fn decode(title: &str) -> Option<PaneIdentity> {
    let (session, rest) = title.split_once("__")?;
    let mut parts = rest.splitn(3, '_');
    let code = parts.next()?;
    let index_str = parts.next()?;
    let model = parts.next().unwrap_or("");
    let agent_type = AgentType::from_code(code)?;
    let index: u32 = index_str.parse().ok()?;
    Some(PaneIdentity {
        session: session.to_string(),
        agent_type,
        index,
        model: model.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_spec::is_safe_model_string;

    #[test]
    fn round_trips_plain_model() {
        let title = encode("myproj", AgentType::Claude, 2, "opus-4");
        let decoded = decode(&title).unwrap();
        assert_eq!(decoded.session, "myproj");
        assert_eq!(decoded.agent_type, AgentType::Claude);
        assert_eq!(decoded.index, 2);
        assert_eq!(decoded.model, "opus-4");
    }

    #[test]
    fn round_trips_every_allowed_charset_character() {
        let models = ["a", "A0", "m.od_el", "m/o@d:e+l-1", "gpt-4.1"];
        for model in models {
            assert!(is_safe_model_string(model), "{model} should be a legal model string");
            let title = encode("sess", AgentType::Codex, 1, model);
            let decoded = decode(&title).unwrap();
            assert_eq!(decoded.model, model);
        }
    }

    #[test]
    fn round_trips_empty_model() {
        let title = encode("sess", AgentType::User, 1, "");
        let decoded = decode(&title).unwrap();
        assert_eq!(decoded.model, "");
        assert_eq!(decoded.agent_type, AgentType::User);
    }

    #[test]
    fn decode_rejects_malformed_title() {
        assert!(decode("not-a-pane-title").is_none());
        assert!(decode("sess__unknown_1_model").is_none());
        assert!(decode("sess__cc_notanumber_model").is_none());
    }
}
