//! Translate a target expression plus a pane inventory into an ordered list
//! of concrete panes. No I/O: pure function over data already fetched from
//! the MUX driver.

use crate::agent_spec::AgentType;
use crate::error::{PaneforgeError, Result};
use crate::session::Pane;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TargetExpr {
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub by_type: Vec<AgentType>,
    #[serde(default)]
    pub pane_indices: Vec<String>,
    #[serde(default)]
    pub pane_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub exclude_indices: Vec<u32>,
    #[serde(default)]
    pub include_user: bool,
}

impl TargetExpr {
    fn has_explicit_selector(&self) -> bool {
        !self.pane_indices.is_empty() || !self.pane_ids.is_empty()
    }
}

/// True if `selector` (already known not to win an index match) identifies
/// `pane` by ID: the bare ID with or without a leading `%`, or — for a
/// dotted `w.p` form — any pane whose ID ends with that suffix.
fn id_matches(selector: &str, pane: &Pane) -> bool {
    if selector.contains('.') {
        return pane.id.ends_with(selector);
    }
    selector == pane.id || selector == pane.id.trim_start_matches('%')
}

/// Indices of the panes `selector` identifies in `panes`. Per §4.3, a
/// numeric selector matches `pane.index` first across the *whole*
/// inventory; ID matching only runs for that selector when no pane's index
/// matched at all, so a numeric selector can never match both an index and
/// an unrelated pane's ID in the same resolution.
fn selector_indices(selector: &str, panes: &[Pane]) -> Vec<u32> {
    if let Ok(n) = selector.parse::<u32>() {
        let index_matches: Vec<u32> = panes.iter().filter(|p| p.index == n).map(|p| p.index).collect();
        if !index_matches.is_empty() {
            return index_matches;
        }
        return panes.iter().filter(|p| id_matches(selector, p)).map(|p| p.index).collect();
    }
    panes.iter().filter(|p| id_matches(selector, p)).map(|p| p.index).collect()
}

/// Resolve a target expression against a pane inventory. Returns panes in
/// ascending MUX-index order with no duplicates. Empty result is an error,
/// never a silent no-op.
pub fn resolve(target: &TargetExpr, panes: &[Pane]) -> Result<Vec<Pane>> {
    let mut selected: Vec<&Pane> = panes.iter().collect();

    if target.has_explicit_selector() {
        let mut matched: HashSet<u32> = HashSet::new();
        for sel in target.pane_indices.iter().chain(target.pane_ids.iter()) {
            matched.extend(selector_indices(sel, panes));
        }
        selected.retain(|pane| matched.contains(&pane.index));
    } else {
        if !target.by_type.is_empty() {
            selected.retain(|pane| target.by_type.contains(&pane.agent_type));
        }
        if !target.tags.is_empty() {
            selected.retain(|pane| pane.tags.iter().any(|t| target.tags.contains(t)));
        }
    }

    if !target.include_user {
        selected.retain(|pane| pane.agent_type != AgentType::User);
    }

    let exclude: HashSet<u32> = target.exclude_indices.iter().copied().collect();
    selected.retain(|pane| !exclude.contains(&pane.index));

    let mut result: Vec<Pane> = selected.into_iter().cloned().collect();
    result.sort_by_key(|p| p.index);
    result.dedup_by_key(|p| p.index);

    if result.is_empty() {
        return Err(PaneforgeError::NotFound("no matching panes".to_string()));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pane(index: u32, agent_type: AgentType) -> Pane {
        Pane {
            id: format!("%{index}"),
            index,
            title: String::new(),
            agent_type,
            command: String::new(),
            active: false,
            tags: Vec::new(),
        }
    }

    fn inventory() -> Vec<Pane> {
        vec![
            pane(0, AgentType::User),
            pane(1, AgentType::Claude),
            pane(2, AgentType::Claude),
            pane(3, AgentType::Codex),
        ]
    }

    #[test]
    fn by_type_with_exclusion_drops_pane_two() {
        let target = TargetExpr {
            by_type: vec![AgentType::Claude],
            exclude_indices: vec![2],
            ..Default::default()
        };
        let resolved = resolve(&target, &inventory()).unwrap();
        assert_eq!(resolved.iter().map(|p| p.index).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn all_without_user_returns_one_two_three() {
        let target = TargetExpr { all: true, include_user: false, ..Default::default() };
        let resolved = resolve(&target, &inventory()).unwrap();
        assert_eq!(resolved.iter().map(|p| p.index).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn explicit_pane_index_wins_over_by_type() {
        let target = TargetExpr {
            pane_indices: vec!["3".to_string()],
            by_type: vec![AgentType::Claude],
            ..Default::default()
        };
        let resolved = resolve(&target, &inventory()).unwrap();
        assert_eq!(resolved.iter().map(|p| p.index).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn empty_result_is_not_found_error() {
        let target = TargetExpr {
            by_type: vec![AgentType::Gemini],
            ..Default::default()
        };
        let err = resolve(&target, &inventory()).unwrap_err();
        assert!(matches!(err, PaneforgeError::NotFound(_)));
    }

    #[test]
    fn dotted_pane_id_matches_suffix() {
        let mut panes = inventory();
        panes[1].id = "%session1.1".to_string();
        let target = TargetExpr { pane_ids: vec!["1.1".to_string()], ..Default::default() };
        let resolved = resolve(&target, &panes).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].index, 1);
    }

    #[test]
    fn result_is_ordered_and_deduplicated() {
        let target = TargetExpr {
            pane_indices: vec!["2".to_string(), "1".to_string(), "1".to_string()],
            ..Default::default()
        };
        let resolved = resolve(&target, &inventory()).unwrap();
        assert_eq!(resolved.iter().map(|p| p.index).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn numeric_selector_prefers_index_match_over_another_panes_id() {
        let panes = vec![
            Pane { id: "%10".to_string(), index: 3, title: String::new(), agent_type: AgentType::Claude, command: String::new(), active: false, tags: Vec::new() },
            Pane { id: "%3".to_string(), index: 5, title: String::new(), agent_type: AgentType::Codex, command: String::new(), active: false, tags: Vec::new() },
        ];
        let target = TargetExpr { pane_indices: vec!["3".to_string()], ..Default::default() };
        let resolved = resolve(&target, &panes).unwrap();
        assert_eq!(resolved.iter().map(|p| p.index).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn numeric_selector_falls_back_to_id_when_no_index_matches() {
        let panes = vec![
            pane(1, AgentType::Claude),
            Pane { id: "%3".to_string(), index: 5, title: String::new(), agent_type: AgentType::Codex, command: String::new(), active: false, tags: Vec::new() },
        ];
        let target = TargetExpr { pane_indices: vec!["3".to_string()], ..Default::default() };
        let resolved = resolve(&target, &panes).unwrap();
        assert_eq!(resolved.iter().map(|p| p.index).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn explicit_pane_selector_still_drops_user_pane_without_include_user() {
        let target = TargetExpr { pane_indices: vec!["0".to_string()], ..Default::default() };
        let err = resolve(&target, &inventory()).unwrap_err();
        assert!(matches!(err, PaneforgeError::NotFound(_)));
    }

    #[test]
    fn explicit_pane_selector_keeps_user_pane_with_include_user() {
        let target = TargetExpr { pane_indices: vec!["0".to_string()], include_user: true, ..Default::default() };
        let resolved = resolve(&target, &inventory()).unwrap();
        assert_eq!(resolved.iter().map(|p| p.index).collect::<Vec<_>>(), vec![0]);
    }
}
