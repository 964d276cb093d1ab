//! State grouping and ordering.
//!
//! Groups are always iterated in canonical order (backlog, unstarted,
//! started, completed, cancelled) regardless of how the input map was
//! built. Within a group states are sorted by `sequence`, ascending; the
//! sort is stable, so equal sequences keep their input order.

use crate::model::{State, StateGroup, StateMap};
use serde::Serialize;

/// Gap between consecutive state sequence values.
pub const SEQUENCE_STEP: f64 = 15_000.0;

/// States grouped in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderedStateGroups {
    groups: Vec<(StateGroup, Vec<State>)>,
}

impl OrderedStateGroups {
    /// Every canonical group with its states (possibly empty).
    pub fn iter(&self) -> impl Iterator<Item = (StateGroup, &[State])> {
        self.groups.iter().map(|(g, s)| (*g, s.as_slice()))
    }

    /// Only the groups that have at least one state.
    pub fn non_empty(&self) -> impl Iterator<Item = (StateGroup, &[State])> {
        self.iter().filter(|(_, s)| !s.is_empty())
    }

    /// States in one group.
    #[must_use]
    pub fn get(&self, group: StateGroup) -> &[State] {
        self.groups
            .iter()
            .find(|(g, _)| *g == group)
            .map(|(_, s)| s.as_slice())
            .unwrap_or_default()
    }

    /// All states, group by group.
    #[must_use]
    pub fn flatten(&self) -> Vec<State> {
        self.groups.iter().flat_map(|(_, s)| s.iter().cloned()).collect()
    }

    /// Total number of states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, s)| s.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First state of the first non-empty group.
    #[must_use]
    pub fn default_state(&self) -> Option<&State> {
        self.groups.iter().find_map(|(_, s)| s.first())
    }

    /// Sequence value for a state appended at the end of `group`.
    #[must_use]
    pub fn next_sequence(&self, group: StateGroup) -> f64 {
        self.get(group).last().map_or(SEQUENCE_STEP, |s| s.sequence + SEQUENCE_STEP)
    }
}

/// Order a group map canonically and sort each group by sequence.
#[must_use]
pub fn order_state_groups(states: &StateMap) -> OrderedStateGroups {
    let groups = StateGroup::CANONICAL
        .into_iter()
        .map(|group| {
            let mut list = states.get(&group).cloned().unwrap_or_default();
            list.sort_by(|a, b| a.sequence.total_cmp(&b.sequence));
            (group, list)
        })
        .collect();
    OrderedStateGroups { groups }
}

/// Flattened state list in canonical group order.
#[must_use]
pub fn states_list(ordered: &OrderedStateGroups) -> Vec<State> {
    ordered.flatten()
}

/// Regroup a flat list by each state's group, keeping relative order.
#[must_use]
pub fn group_states(states: &[State]) -> StateMap {
    let mut map = StateMap::new();
    for state in states {
        map.entry(state.group).or_default().push(state.clone());
    }
    map
}

/// Find a state by id.
#[must_use]
pub fn find_state<'a>(states: &'a [State], id: &str) -> Option<&'a State> {
    states.iter().find(|s| s.id == id)
}
