//! Lineage view controller
//!
//! Owns the graph, leaf sets and expansion states of one viewed root entity.
//! Every mutation takes the state lock after the network call returns, checks
//! the view generation and applies the whole change at once, so concurrent
//! expansions may complete in any order without leaving partial state.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use catalog_interfaces::{
    AddLineage, EdgeData, EntityLineage, EntityReference, EntityType, LineageApi, LineageDepth,
    LineageDirection, LineageResult, LineageTarget, Operation, ResourceEntity,
};

use crate::graph::{ExpansionState, ExpansionTracker, LeafNodes, LineageGraph, MergeOutcome};
use crate::services::handlers::{LineageHandlers, LineageTabData, LoadOutcome};
use crate::session::SessionContext;

#[derive(Debug, Default)]
struct ViewState {
    /// Identity of the current graph. Node loads and edits check it.
    generation: u64,
    /// Latest root request. Only its response may replace the graph.
    root_request: u64,
    graph: LineageGraph,
    leaf_nodes: LeafNodes,
    expansion: ExpansionTracker,
    root_loading: bool,
}

impl ViewState {
    /// Starts over for a new root. Responses issued before this call become stale.
    fn restart(&mut self, graph: LineageGraph) -> u64 {
        self.generation += 1;
        self.root_request += 1;
        self.graph = graph;
        self.leaf_nodes.clear();
        self.expansion.clear();
        self.root_loading = false;
        self.generation
    }
}

/// Controller behind a lineage tab
#[derive(Clone)]
pub struct LineageView {
    api: Arc<dyn LineageApi>,
    session: SessionContext,
    depth: LineageDepth,
    state: Arc<RwLock<ViewState>>,
}

impl std::fmt::Debug for LineageView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineageView")
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl LineageView {
    pub fn new(api: Arc<dyn LineageApi>, session: SessionContext) -> Self {
        Self {
            api,
            session,
            depth: LineageDepth::default(),
            state: Arc::new(RwLock::new(ViewState::default())),
        }
    }

    /// Hops requested per fetch
    pub fn with_depth(mut self, depth: LineageDepth) -> Self {
        self.depth = depth;
        self
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Fetches the root's lineage and replaces the graph with it.
    ///
    /// The graph, leaf sets and expansion states are only replaced once the
    /// fetch succeeds; a failed load keeps whatever was shown before. Each
    /// side of the root that was fetched is settled from the payload.
    #[instrument(skip(self), fields(%entity_type, fqn = %fqn))]
    pub async fn load_root(&self, entity_type: EntityType, fqn: &str) -> LineageResult<LoadOutcome> {
        let request = {
            let mut state = self.state.write().await;
            state.root_request += 1;
            state.root_loading = true;
            state.root_request
        };

        let target = LineageTarget::Fqn(fqn.to_string());
        let result = self.api.get_lineage(entity_type, &target, self.depth).await;

        let mut state = self.state.write().await;
        if state.root_request != request {
            debug!(request, current = state.root_request, "discarding stale root lineage");
            return Ok(LoadOutcome::Discarded);
        }

        let lineage = match result {
            Ok(lineage) => lineage,
            Err(error) => {
                state.root_loading = false;
                warn!(%error, "failed to load root lineage");
                return Err(error);
            }
        };

        state.restart(LineageGraph::empty());
        let root = lineage.entity.id;
        for (direction, hops) in [
            (LineageDirection::To, self.depth.downstream),
            (LineageDirection::From, self.depth.upstream),
        ] {
            if hops == 0 {
                continue;
            }
            let has_edges = !lineage.edges(direction).is_empty();
            state.expansion.settle(root, direction, has_edges);
            if !has_edges {
                state.leaf_nodes.record(root, direction);
            }
        }

        state.graph = LineageGraph::from_lineage(lineage);
        let outcome = MergeOutcome {
            nodes_added: state.graph.nodes().len() + 1,
            edges_added: state.graph.edge_count(),
        };
        info!(nodes = outcome.nodes_added, edges = outcome.edges_added, "root lineage loaded");
        Ok(LoadOutcome::Applied(outcome))
    }

    /// Discards the graph because the view moved to another root.
    /// In-flight responses for the previous root will be discarded.
    pub async fn reset(&self, root: Option<EntityReference>) {
        let graph = match root {
            Some(entity) => LineageGraph::from_lineage(EntityLineage::empty(entity)),
            None => LineageGraph::empty(),
        };
        let generation = self.state.write().await.restart(graph);
        debug!(generation, "lineage view reset");
    }

    /// Current aggregate graph
    pub async fn graph(&self) -> LineageGraph {
        self.state.read().await.graph.clone()
    }

    pub async fn leaf_nodes(&self) -> LeafNodes {
        self.state.read().await.leaf_nodes.clone()
    }

    pub async fn expansion_state(&self, id: Uuid, direction: LineageDirection) -> ExpansionState {
        self.state.read().await.expansion.state(id, direction)
    }

    /// Whether an expand affordance should be offered for the node
    pub async fn is_expandable_hint(&self, id: Uuid, direction: LineageDirection) -> bool {
        let state = self.state.read().await;
        !state.leaf_nodes.is_leaf(id, direction) && !state.expansion.state(id, direction).is_terminal()
    }

    pub async fn snapshot(&self) -> LineageTabData {
        let state = self.state.read().await;
        let loading_nodes = state.expansion.loading_nodes();
        let permissions = match state.graph.entity() {
            Some(entity) => self.session.operation_permission(ResourceEntity::from(entity.entity_type)),
            None => Default::default(),
        };
        LineageTabData {
            entity_lineage: state.graph.to_entity_lineage(),
            lineage_leaf_nodes: state.leaf_nodes.clone(),
            is_lineage_loading: state.root_loading,
            is_node_loading: !loading_nodes.is_empty(),
            loading_nodes,
            permissions,
        }
    }

    /// A node fetch always asks for at least one hop on the expanded side
    fn node_depth(&self, direction: LineageDirection) -> LineageDepth {
        let mut depth = self.depth;
        match direction {
            LineageDirection::To => depth.downstream = depth.downstream.max(1),
            LineageDirection::From => depth.upstream = depth.upstream.max(1),
        }
        depth
    }

    fn require_edit_lineage(&self, entity_type: EntityType) -> LineageResult<()> {
        self.session
            .require(ResourceEntity::from(entity_type), Operation::EditLineage)
    }
}

#[async_trait]
impl LineageHandlers for LineageView {
    #[instrument(skip(self, node), fields(node = %node.id, %direction))]
    async fn load_node(&self, node: &EntityReference, direction: LineageDirection) -> LineageResult<LoadOutcome> {
        let generation = {
            let mut state = self.state.write().await;
            if let Err(current) = state.expansion.begin(node.id, direction) {
                debug!(?current, "skipping expansion");
                return Ok(LoadOutcome::Skipped(current));
            }
            state.generation
        };

        let target = LineageTarget::for_reference(node);
        let result = self
            .api
            .get_lineage(node.entity_type, &target, self.node_depth(direction))
            .await;

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!(generation, current = state.generation, "discarding stale node lineage");
            return Ok(LoadOutcome::Discarded);
        }

        match result {
            Ok(subgraph) => {
                if subgraph.entity.id != node.id {
                    warn!(centre = %subgraph.entity.id, "lineage payload is centred on another entity");
                }
                let has_edges = !subgraph.edges(direction).is_empty();
                let outcome = state.graph.merge(&subgraph, direction);
                state.leaf_nodes.observe(node.id, &subgraph, direction);
                state.expansion.complete(node.id, direction, has_edges);
                debug!(
                    nodes_added = outcome.nodes_added,
                    edges_added = outcome.edges_added,
                    "merged node lineage"
                );
                Ok(LoadOutcome::Applied(outcome))
            }
            Err(error) => {
                state.expansion.fail(node.id, direction);
                warn!(%error, "failed to load node lineage");
                Err(error)
            }
        }
    }

    #[instrument(skip(self, edge), fields(from = %edge.edge.from_entity.id, to = %edge.edge.to_entity.id))]
    async fn add_lineage(&self, edge: AddLineage) -> LineageResult<()> {
        edge.validate()?;
        self.require_edit_lineage(edge.edge.from_entity.entity_type)?;

        let generation = self.state.read().await.generation;
        if let Err(error) = self.api.add_lineage(&edge).await {
            warn!(%error, "failed to add lineage edge");
            return Err(error);
        }

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!("root changed while adding edge, not applying locally");
            return Ok(());
        }
        state.graph.insert_entities_edge(&edge.edge);
        Ok(())
    }

    #[instrument(skip(self), fields(from = %edge.from_id, to = %edge.to_id))]
    async fn remove_lineage(&self, edge: EdgeData) -> LineageResult<()> {
        self.require_edit_lineage(edge.from_entity)?;

        let generation = self.state.read().await.generation;
        if let Err(error) = self
            .api
            .delete_lineage_edge(edge.from_entity, edge.from_id, edge.to_entity, edge.to_id)
            .await
        {
            warn!(%error, "failed to remove lineage edge");
            return Err(error);
        }

        let mut state = self.state.write().await;
        if state.generation != generation {
            debug!("root changed while removing edge, not applying locally");
            return Ok(());
        }
        if state.graph.remove_edge(edge.key()).is_none() {
            debug!("removed edge was not part of the local graph");
        }
        Ok(())
    }

    async fn entity_lineage_handler(&self, lineage: EntityLineage) {
        self.state.write().await.graph = LineageGraph::from_lineage(lineage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_interfaces::{Access, LineageEdge, LineageError, PermissionMatrix};
    use mockall::mock;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    use crate::session::CurrentUser;

    mock! {
        pub Api {}

        #[async_trait]
        impl LineageApi for Api {
            async fn get_lineage(&self, entity_type: EntityType, target: &LineageTarget, depth: LineageDepth) -> LineageResult<EntityLineage>;
            async fn add_lineage(&self, edge: &AddLineage) -> LineageResult<()>;
            async fn delete_lineage_edge(&self, from_entity: EntityType, from_id: Uuid, to_entity: EntityType, to_id: Uuid) -> LineageResult<()>;
        }
    }

    fn table(name: &str) -> EntityReference {
        EntityReference::new(Uuid::new_v4(), EntityType::Table).with_fqn(format!("svc.db.public.{}", name))
    }

    fn steward() -> SessionContext {
        let session = SessionContext::new();
        session.login(
            CurrentUser::new("steward"),
            PermissionMatrix::new().with(ResourceEntity::Table, Operation::EditLineage, Access::Allow),
        );
        session
    }

    fn downstream(entity: &EntityReference, children: &[&EntityReference]) -> EntityLineage {
        EntityLineage {
            entity: entity.clone(),
            nodes: children.iter().map(|c| (*c).clone()).collect(),
            upstream_edges: Vec::new(),
            downstream_edges: children.iter().map(|c| LineageEdge::new(entity.id, c.id)).collect(),
        }
    }

    #[tokio::test]
    async fn test_load_root_settles_root_and_records_leaves() {
        let a = table("a");
        let b = table("b");
        let root_payload = downstream(&a, &[&b]);

        let mut api = MockApi::new();
        api.expect_get_lineage()
            .withf(|entity_type, target, _| {
                *entity_type == EntityType::Table && *target == LineageTarget::Fqn("svc.db.public.a".to_string())
            })
            .times(1)
            .returning(move |_, _, _| Ok(root_payload.clone()));

        let view = LineageView::new(Arc::new(api), SessionContext::new());
        let outcome = view.load_root(EntityType::Table, "svc.db.public.a").await.unwrap();

        assert_eq!(outcome, LoadOutcome::Applied(MergeOutcome { nodes_added: 2, edges_added: 1 }));
        assert_eq!(view.expansion_state(a.id, LineageDirection::To).await, ExpansionState::Expandable);
        assert_eq!(view.expansion_state(a.id, LineageDirection::From).await, ExpansionState::Leaf);
        assert_eq!(view.leaf_nodes().await.upstream(), &[a.id]);
        assert!(view.is_expandable_hint(b.id, LineageDirection::To).await);
    }

    #[tokio::test]
    async fn test_load_node_skips_settled_pairs() {
        let a = table("a");
        let b = table("b");
        let leaf = EntityLineage::empty(b.clone());

        let mut api = MockApi::new();
        api.expect_get_lineage()
            .withf(|_, _, depth| depth.downstream >= 1)
            .times(1)
            .returning(move |_, _, _| Ok(leaf.clone()));

        let view = LineageView::new(Arc::new(api), SessionContext::new());
        view.entity_lineage_handler(downstream(&a, &[&b])).await;

        let first = view.load_node(&b, LineageDirection::To).await.unwrap();
        assert_eq!(first, LoadOutcome::Applied(MergeOutcome::default()));

        let second = view.load_node(&b, LineageDirection::To).await.unwrap();
        assert_eq!(second, LoadOutcome::Skipped(ExpansionState::Leaf));
        assert_eq!(view.leaf_nodes().await.downstream(), &[b.id]);
        assert!(!view.is_expandable_hint(b.id, LineageDirection::To).await);
    }

    #[tokio::test]
    async fn test_leaf_and_state_follow_expanded_node_not_payload_centre() {
        let a = table("a");
        let b = table("b");
        let elsewhere = EntityLineage::empty(table("resolved_elsewhere"));

        let mut api = MockApi::new();
        api.expect_get_lineage()
            .times(1)
            .returning(move |_, _, _| Ok(elsewhere.clone()));

        let view = LineageView::new(Arc::new(api), SessionContext::new());
        view.entity_lineage_handler(downstream(&a, &[&b])).await;
        view.load_node(&b, LineageDirection::To).await.unwrap();

        assert_eq!(view.leaf_nodes().await.downstream(), &[b.id]);
        assert_eq!(view.expansion_state(b.id, LineageDirection::To).await, ExpansionState::Leaf);
    }

    #[tokio::test]
    async fn test_failed_fetch_leaves_graph_and_allows_retry() {
        let a = table("a");
        let b = table("b");
        let c = table("c");
        let expanded = downstream(&b, &[&c]);

        let mut api = MockApi::new();
        let mut calls = 0;
        api.expect_get_lineage().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Err(LineageError::Communication("connection reset".into()))
            } else {
                Ok(expanded.clone())
            }
        });

        let view = LineageView::new(Arc::new(api), SessionContext::new());
        view.entity_lineage_handler(downstream(&a, &[&b])).await;
        let before = view.graph().await;

        let err = view.load_node(&b, LineageDirection::To).await.unwrap_err();
        assert!(matches!(err, LineageError::Communication(_)));
        assert!(view.graph().await.is_equivalent(&before));
        assert_eq!(view.expansion_state(b.id, LineageDirection::To).await, ExpansionState::Unknown);
        assert!(view.snapshot().await.loading_nodes.is_empty());

        view.load_node(&b, LineageDirection::To).await.unwrap();
        assert!(view.graph().await.contains_node(c.id));
    }

    #[tokio::test]
    async fn test_add_lineage_requires_edit_permission() {
        let a = table("a");
        let b = table("b");

        let mut api = MockApi::new();
        api.expect_add_lineage().times(0);

        let view = LineageView::new(Arc::new(api), SessionContext::new());
        let err = view.add_lineage(AddLineage::new(a, b)).await.unwrap_err();
        assert!(matches!(err, LineageError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn test_add_then_remove_restores_edges() {
        let a = table("a");
        let b = table("b");
        let c = table("c");

        let mut api = MockApi::new();
        api.expect_add_lineage().times(1).returning(|_| Ok(()));
        api.expect_delete_lineage_edge()
            .with(eq(EntityType::Table), eq(b.id), eq(EntityType::Table), eq(c.id))
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let view = LineageView::new(Arc::new(api), steward());
        view.entity_lineage_handler(downstream(&a, &[&b])).await;
        let before = view.graph().await;

        let add = AddLineage::new(b.clone(), c.clone());
        let removal = EdgeData::from(&add);
        view.add_lineage(add).await.unwrap();

        let added = view.graph().await;
        assert_eq!(added.downstream_edges().last(), Some(&LineageEdge::new(b.id, c.id)));
        assert!(added.contains_node(c.id));

        view.remove_lineage(removal).await.unwrap();
        let after = view.graph().await;
        assert_eq!(after.downstream_edges(), before.downstream_edges());
        assert_eq!(after.upstream_edges(), before.upstream_edges());
    }

    #[tokio::test]
    async fn test_backend_rejection_does_not_touch_graph() {
        let a = table("a");
        let b = table("b");

        let mut api = MockApi::new();
        api.expect_delete_lineage_edge()
            .returning(|_, _, _, _| Err(LineageError::Server { status: 500, message: "boom".into() }));

        let view = LineageView::new(Arc::new(api), steward());
        view.entity_lineage_handler(downstream(&a, &[&b])).await;

        let removal = EdgeData {
            from_entity: EntityType::Table,
            from_id: a.id,
            to_entity: EntityType::Table,
            to_id: b.id,
        };
        assert!(view.remove_lineage(removal).await.is_err());
        assert_eq!(view.graph().await.downstream_edges(), &[LineageEdge::new(a.id, b.id)]);
    }

    #[tokio::test]
    async fn test_snapshot_reports_permissions_of_root() {
        let a = table("a");
        let view = LineageView::new(Arc::new(MockApi::new()), steward());
        assert_eq!(view.snapshot().await.entity_lineage, None);

        view.reset(Some(a.clone())).await;
        let snapshot = view.snapshot().await;
        assert_eq!(snapshot.entity_lineage.map(|l| l.entity.id), Some(a.id));
        assert!(snapshot.permissions.edit_lineage);
        assert!(!snapshot.is_lineage_loading);
    }
}
