//! Per-node expansion status.
//!
//! Each `(node, direction)` pair moves `Unknown -> Loading -> {Expandable, Leaf}`.
//! A failed fetch returns the pair to `Unknown` so the user can retry.

use std::collections::HashMap;

use catalog_interfaces::LineageDirection;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpansionState {
    /// Never queried
    Unknown,
    /// A fetch is in flight
    Loading,
    /// Fetched with at least one edge in the queried direction
    Expandable,
    /// Fetched with no edge in the queried direction
    Leaf,
}

impl ExpansionState {
    /// Settled states are never re-queried in the same direction
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExpansionState::Expandable | ExpansionState::Leaf)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpansionTracker {
    states: HashMap<(Uuid, LineageDirection), ExpansionState>,
}

impl ExpansionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, id: Uuid, direction: LineageDirection) -> ExpansionState {
        self.states
            .get(&(id, direction))
            .copied()
            .unwrap_or(ExpansionState::Unknown)
    }

    /// Moves `Unknown` to `Loading`. Any other state is returned as the error.
    pub fn begin(&mut self, id: Uuid, direction: LineageDirection) -> Result<(), ExpansionState> {
        match self.state(id, direction) {
            ExpansionState::Unknown => {
                self.states.insert((id, direction), ExpansionState::Loading);
                debug!(node = %id, %direction, "expansion loading");
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Settles a `Loading` pair according to whether edges came back
    pub fn complete(&mut self, id: Uuid, direction: LineageDirection, has_edges: bool) -> ExpansionState {
        let current = self.state(id, direction);
        if current != ExpansionState::Loading {
            debug!(node = %id, %direction, ?current, "ignoring completion for pair that is not loading");
            return current;
        }
        let settled = if has_edges {
            ExpansionState::Expandable
        } else {
            ExpansionState::Leaf
        };
        self.states.insert((id, direction), settled);
        debug!(node = %id, %direction, ?settled, "expansion settled");
        settled
    }

    /// Returns a `Loading` pair to `Unknown`
    pub fn fail(&mut self, id: Uuid, direction: LineageDirection) {
        if self.state(id, direction) == ExpansionState::Loading {
            self.states.remove(&(id, direction));
        }
    }

    /// Marks a pair as settled without a fetch, used for the root payload
    pub fn settle(&mut self, id: Uuid, direction: LineageDirection, has_edges: bool) {
        let settled = if has_edges {
            ExpansionState::Expandable
        } else {
            ExpansionState::Leaf
        };
        self.states.insert((id, direction), settled);
    }

    /// Nodes with at least one fetch in flight
    pub fn loading_nodes(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .states
            .iter()
            .filter(|(_, state)| **state == ExpansionState::Loading)
            .map(|((id, _), _)| *id)
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }
}
