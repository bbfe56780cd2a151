//! Handler interface consumed by lineage views

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use catalog_interfaces::{
    AddLineage, EdgeData, EntityLineage, EntityReference, LineageDirection, LineageResult,
    OperationPermission,
};

use crate::graph::{ExpansionState, LeafNodes, MergeOutcome};

/// What happened to a fetch once its response arrived
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response was merged into the graph
    Applied(MergeOutcome),
    /// The root changed while the request was in flight; nothing was touched
    Discarded,
    /// No request was sent because the pair was already in this state
    Skipped(ExpansionState),
}

/// Everything a lineage tab needs to render
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageTabData {
    pub entity_lineage: Option<EntityLineage>,
    pub lineage_leaf_nodes: LeafNodes,
    pub is_lineage_loading: bool,
    pub is_node_loading: bool,
    pub loading_nodes: Vec<Uuid>,
    pub permissions: OperationPermission,
}

/// The lineage callbacks of one view, grouped
#[async_trait]
pub trait LineageHandlers: Send + Sync {
    /// Expands `node` in `direction`, merging the fetched neighbourhood
    async fn load_node(&self, node: &EntityReference, direction: LineageDirection) -> LineageResult<LoadOutcome>;

    /// Persists an edge, then inserts it locally
    async fn add_lineage(&self, edge: AddLineage) -> LineageResult<()>;

    /// Deletes an edge, then removes it locally
    async fn remove_lineage(&self, edge: EdgeData) -> LineageResult<()>;

    /// Replaces the graph with a caller-edited one
    async fn entity_lineage_handler(&self, lineage: EntityLineage);
}
