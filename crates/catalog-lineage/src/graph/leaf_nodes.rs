//! Nodes known to have nothing further in one direction.

use catalog_interfaces::{EntityLineage, LineageDirection};
use serde::Serialize;
use uuid::Uuid;

/// Leaf ids per direction. Append-only and deduplicated for the life of one root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeafNodes {
    up_stream_node: Vec<Uuid>,
    down_stream_node: Vec<Uuid>,
}

impl LeafNodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes with no further upstream edges
    pub fn upstream(&self) -> &[Uuid] {
        &self.up_stream_node
    }

    /// Nodes with no further downstream edges
    pub fn downstream(&self) -> &[Uuid] {
        &self.down_stream_node
    }

    pub fn is_leaf(&self, id: Uuid, direction: LineageDirection) -> bool {
        self.side(direction).contains(&id)
    }

    /// Records `id` as a leaf. Returns false when it was already recorded.
    pub fn record(&mut self, id: Uuid, direction: LineageDirection) -> bool {
        let side = match direction {
            LineageDirection::To => &mut self.down_stream_node,
            LineageDirection::From => &mut self.up_stream_node,
        };
        if side.contains(&id) {
            return false;
        }
        side.push(id);
        true
    }

    /// Records `id` when the fetched subgraph has no edges in `direction`.
    /// Returns whether the node is a leaf on that side.
    pub fn observe(&mut self, id: Uuid, subgraph: &EntityLineage, direction: LineageDirection) -> bool {
        if subgraph.edges(direction).is_empty() {
            self.record(id, direction);
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.up_stream_node.clear();
        self.down_stream_node.clear();
    }

    fn side(&self, direction: LineageDirection) -> &[Uuid] {
        match direction {
            LineageDirection::To => &self.down_stream_node,
            LineageDirection::From => &self.up_stream_node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_interfaces::{EntityReference, EntityType, LineageEdge};
    use serde_json::json;

    #[test]
    fn test_empty_downstream_is_recorded_once() {
        let node = EntityReference::new(Uuid::new_v4(), EntityType::Table);
        let empty = EntityLineage::empty(node.clone());
        let mut leaves = LeafNodes::new();

        for _ in 0..3 {
            assert!(leaves.observe(node.id, &empty, LineageDirection::To));
        }

        assert_eq!(leaves.downstream(), &[node.id]);
        assert!(leaves.upstream().is_empty());
        assert!(leaves.is_leaf(node.id, LineageDirection::To));
        assert!(!leaves.is_leaf(node.id, LineageDirection::From));
    }

    #[test]
    fn test_non_empty_side_is_not_a_leaf() {
        let node = EntityReference::new(Uuid::new_v4(), EntityType::Topic);
        let mut sub = EntityLineage::empty(node.clone());
        sub.upstream_edges.push(LineageEdge::new(Uuid::new_v4(), node.id));

        let mut leaves = LeafNodes::new();
        assert!(!leaves.observe(node.id, &sub, LineageDirection::From));
        // the other side of the same payload is empty
        assert!(leaves.observe(node.id, &sub, LineageDirection::To));
        assert!(leaves.upstream().is_empty());
    }

    #[test]
    fn test_serializes_with_wire_names() {
        let id = Uuid::new_v4();
        let mut leaves = LeafNodes::new();
        leaves.record(id, LineageDirection::From);
        assert_eq!(
            serde_json::to_value(&leaves).unwrap(),
            json!({ "upStreamNode": [id], "downStreamNode": [] })
        );

        leaves.clear();
        assert_eq!(leaves, LeafNodes::default());
    }
}
