//! Workflow state model for tsync.
//!
//! Every state belongs to exactly one group of a fixed taxonomy. Within a
//! group, the `sequence` value defines display order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Fixed state group taxonomy, declared in canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateGroup {
    Backlog,
    Unstarted,
    Started,
    Completed,
    Cancelled,
}

impl StateGroup {
    /// Canonical iteration order for grouped views.
    pub const CANONICAL: [Self; 5] = [
        Self::Backlog,
        Self::Unstarted,
        Self::Started,
        Self::Completed,
        Self::Cancelled,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Unstarted => "unstarted",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::CANONICAL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for StateGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// States keyed by group, as returned by `GET states/`.
pub type StateMap = HashMap<StateGroup, Vec<State>>;

/// A workflow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: String,

    pub name: String,

    /// Hex color, e.g. "#f59e0b"
    #[serde(default)]
    pub color: String,

    pub group: StateGroup,

    /// Project id
    pub project: String,

    /// Order value within the group
    #[serde(default)]
    pub sequence: f64,
}

/// A new state (`POST states/`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateDraft {
    pub name: String,
    pub color: String,
    pub group: StateGroup,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_parse() {
        assert_eq!(StateGroup::parse("Started"), Some(StateGroup::Started));
        assert_eq!(StateGroup::parse("done"), None);
    }

    #[test]
    fn test_state_map_deserialize() {
        let json = serde_json::json!({
            "backlog": [{
                "id": "s1",
                "name": "Backlog",
                "color": "#ccc",
                "group": "backlog",
                "project": "p1",
                "sequence": 1.0
            }],
            "started": []
        });
        let map: StateMap = serde_json::from_value(json).unwrap();
        assert_eq!(map[&StateGroup::Backlog][0].name, "Backlog");
        assert!(map[&StateGroup::Started].is_empty());
        assert!(!map.contains_key(&StateGroup::Completed));
    }
}
