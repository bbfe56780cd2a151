//! In-memory lineage graph accumulated while a user explores an entity.
//!
//! The graph starts empty, is seeded by the root entity's lineage and then
//! grows as individual nodes are expanded. Merging is purely additive: a
//! fetched subgraph only describes one node's neighbourhood, so nothing absent
//! from it is ever dropped.

pub mod expansion;
pub mod leaf_nodes;

pub use expansion::{ExpansionState, ExpansionTracker};
pub use leaf_nodes::LeafNodes;

use std::collections::{BTreeSet, HashSet};

use catalog_interfaces::{EdgeKey, EntitiesEdge, EntityLineage, EntityReference, LineageDirection, LineageEdge};
use uuid::Uuid;

/// Counts of what a merge actually added
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub nodes_added: usize,
    pub edges_added: usize,
}

impl MergeOutcome {
    pub fn is_noop(&self) -> bool {
        self.nodes_added == 0 && self.edges_added == 0
    }
}

/// Aggregate lineage view centred on one root entity
#[derive(Debug, Clone, Default)]
pub struct LineageGraph {
    entity: Option<EntityReference>,
    nodes: Vec<EntityReference>,
    upstream_edges: Vec<LineageEdge>,
    downstream_edges: Vec<LineageEdge>,
    node_ids: HashSet<Uuid>,
    edge_keys: HashSet<EdgeKey>,
}

impl LineageGraph {
    /// Graph with no root yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// Seeds a graph from the root entity's lineage, dropping duplicate nodes and edges
    pub fn from_lineage(lineage: EntityLineage) -> Self {
        let mut graph = Self {
            entity: Some(lineage.entity.clone()),
            ..Self::default()
        };
        graph.node_ids.insert(lineage.entity.id);

        for node in lineage.nodes {
            graph.insert_node(node);
        }
        for edge in lineage.upstream_edges {
            graph.insert_edge(edge, LineageDirection::From);
        }
        for edge in lineage.downstream_edges {
            graph.insert_edge(edge, LineageDirection::To);
        }
        graph
    }

    /// Wire form of the graph, `None` while no root is loaded
    pub fn to_entity_lineage(&self) -> Option<EntityLineage> {
        self.entity.as_ref().map(|entity| EntityLineage {
            entity: entity.clone(),
            nodes: self.nodes.clone(),
            upstream_edges: self.upstream_edges.clone(),
            downstream_edges: self.downstream_edges.clone(),
        })
    }

    pub fn entity(&self) -> Option<&EntityReference> {
        self.entity.as_ref()
    }

    pub fn nodes(&self) -> &[EntityReference] {
        &self.nodes
    }

    pub fn upstream_edges(&self) -> &[LineageEdge] {
        &self.upstream_edges
    }

    pub fn downstream_edges(&self) -> &[LineageEdge] {
        &self.downstream_edges
    }

    pub fn edges(&self, direction: LineageDirection) -> &[LineageEdge] {
        match direction {
            LineageDirection::To => &self.downstream_edges,
            LineageDirection::From => &self.upstream_edges,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entity.is_none() && self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.upstream_edges.len() + self.downstream_edges.len()
    }

    /// Whether the id is the root or one of the accumulated nodes
    pub fn contains_node(&self, id: Uuid) -> bool {
        self.node_ids.contains(&id)
    }

    pub fn contains_edge(&self, key: EdgeKey) -> bool {
        self.edge_keys.contains(&key)
    }

    /// Looks up the root or an accumulated node
    pub fn node(&self, id: Uuid) -> Option<&EntityReference> {
        self.entity
            .as_ref()
            .filter(|entity| entity.id == id)
            .or_else(|| self.nodes.iter().find(|node| node.id == id))
    }

    /// Adds a node unless one with the same id is already known
    pub fn insert_node(&mut self, node: EntityReference) -> bool {
        if !self.node_ids.insert(node.id) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    /// Appends an edge to the list of `direction` unless its `(from, to)` pair is already present
    pub fn insert_edge(&mut self, edge: LineageEdge, direction: LineageDirection) -> bool {
        if !self.edge_keys.insert(edge.key()) {
            return false;
        }
        match direction {
            LineageDirection::To => self.downstream_edges.push(edge),
            LineageDirection::From => self.upstream_edges.push(edge),
        }
        true
    }

    /// Removes the edge from whichever list holds it. Nodes are kept.
    pub fn remove_edge(&mut self, key: EdgeKey) -> Option<LineageEdge> {
        if !self.edge_keys.remove(&key) {
            return None;
        }
        for list in [&mut self.upstream_edges, &mut self.downstream_edges] {
            if let Some(pos) = list.iter().position(|edge| edge.key() == key) {
                return Some(list.remove(pos));
            }
        }
        None
    }

    /// Merges a node's freshly fetched neighbourhood.
    ///
    /// Every node of `subgraph` is unioned in by id, and the subgraph's entity
    /// too when the graph does not know it yet. Only the edges of the queried
    /// `direction` are unioned in, keyed by `(from, to)`, in the order the
    /// subgraph lists them.
    ///
    /// Nodes are not filtered by direction. When the fetch also covered the
    /// opposite side, its nodes are unioned in without the edges that reach
    /// them, so the graph may hold nodes no edge touches.
    pub fn merge(&mut self, subgraph: &EntityLineage, direction: LineageDirection) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        if self.insert_node(subgraph.entity.clone()) {
            outcome.nodes_added += 1;
        }
        for node in &subgraph.nodes {
            if self.insert_node(node.clone()) {
                outcome.nodes_added += 1;
            }
        }
        for edge in subgraph.edges(direction) {
            if self.insert_edge(edge.clone(), direction) {
                outcome.edges_added += 1;
            }
        }
        outcome
    }

    /// List a locally created edge belongs to.
    ///
    /// Edges leaving the root or one of its downstream descendants extend the
    /// downstream side, everything else extends the upstream side.
    pub fn direction_for(&self, edge: &EntitiesEdge) -> LineageDirection {
        let from = edge.from_entity.id;
        let is_root = self.entity.as_ref().map(|e| e.id == from).unwrap_or(false);
        let is_descendant = self.downstream_edges.iter().any(|e| e.to_entity == from);
        if is_root || is_descendant {
            LineageDirection::To
        } else {
            LineageDirection::From
        }
    }

    /// Inserts a locally created edge together with any endpoint the graph lacks
    pub fn insert_entities_edge(&mut self, edge: &EntitiesEdge) -> bool {
        let direction = self.direction_for(edge);
        self.insert_node(edge.from_entity.clone());
        self.insert_node(edge.to_entity.clone());
        self.insert_edge(
            LineageEdge {
                from_entity: edge.from_entity.id,
                to_entity: edge.to_entity.id,
                description: edge.description.clone(),
            },
            direction,
        )
    }

    /// Edge keys of one side, ordered for comparison
    pub fn edge_keys(&self, direction: LineageDirection) -> BTreeSet<EdgeKey> {
        self.edges(direction).iter().map(LineageEdge::key).collect()
    }

    /// Same root, nodes and edges regardless of insertion order
    pub fn is_equivalent(&self, other: &LineageGraph) -> bool {
        self.entity.as_ref().map(|e| e.id) == other.entity.as_ref().map(|e| e.id)
            && self.node_ids == other.node_ids
            && self.edge_keys(LineageDirection::From) == other.edge_keys(LineageDirection::From)
            && self.edge_keys(LineageDirection::To) == other.edge_keys(LineageDirection::To)
    }
}
