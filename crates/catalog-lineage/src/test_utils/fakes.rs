use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use catalog_interfaces::{
    AddLineage, EntityLineage, EntityReference, EntityType, LineageApi, LineageDepth, LineageEdge,
    LineageError, LineageResult, LineageTarget, PermissionApi, ResourcePermission,
};

#[derive(Default)]
struct BackendState {
    entities: HashMap<Uuid, EntityReference>,
    edges: Vec<LineageEdge>,
    delays: HashMap<Uuid, Duration>,
    fetch_failures: HashMap<Uuid, LineageError>,
    mutation_failure: Option<LineageError>,
    fetch_counts: HashMap<Uuid, usize>,
    permissions: Vec<ResourcePermission>,
}

/// In-memory lineage backend for tests
///
/// Serves the neighbourhood of a node up to the requested depth, can delay
/// individual nodes to force out-of-order completion and can fail fetches or
/// mutations on demand.
#[derive(Default)]
pub struct FakeLineageBackend {
    state: Mutex<BackendState>,
}

impl FakeLineageBackend {
    /// Creates an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity
    pub fn add_entity(&self, entity: EntityReference) {
        self.state.lock().entities.insert(entity.id, entity);
    }

    /// Registers both endpoints and the edge between them
    pub fn connect(&self, from: &EntityReference, to: &EntityReference) {
        let mut state = self.state.lock();
        state.entities.entry(from.id).or_insert_with(|| from.clone());
        state.entities.entry(to.id).or_insert_with(|| to.clone());
        let edge = LineageEdge::new(from.id, to.id);
        if !state.edges.iter().any(|e| e.key() == edge.key()) {
            state.edges.push(edge);
        }
    }

    /// Delays every fetch centred on `id`
    pub fn set_delay(&self, id: Uuid, delay: Duration) {
        self.state.lock().delays.insert(id, delay);
    }

    /// Fails every fetch centred on `id` until cleared
    pub fn fail_fetch(&self, id: Uuid, error: LineageError) {
        self.state.lock().fetch_failures.insert(id, error);
    }

    pub fn clear_fetch_failure(&self, id: Uuid) {
        self.state.lock().fetch_failures.remove(&id);
    }

    /// Fails every add and delete until cleared
    pub fn fail_mutations(&self, error: Option<LineageError>) {
        self.state.lock().mutation_failure = error;
    }

    pub fn set_permissions(&self, permissions: Vec<ResourcePermission>) {
        self.state.lock().permissions = permissions;
    }

    /// Number of fetches centred on `id`, failed ones included
    pub fn fetch_count(&self, id: Uuid) -> usize {
        self.state.lock().fetch_counts.get(&id).copied().unwrap_or(0)
    }

    pub fn has_edge(&self, from: Uuid, to: Uuid) -> bool {
        self.state
            .lock()
            .edges
            .iter()
            .any(|e| e.from_entity == from && e.to_entity == to)
    }

    pub fn edges(&self) -> Vec<LineageEdge> {
        self.state.lock().edges.clone()
    }

    fn resolve(state: &BackendState, entity_type: EntityType, target: &LineageTarget) -> Option<Uuid> {
        let found = match target {
            LineageTarget::Id(id) => state.entities.get(id),
            LineageTarget::Fqn(fqn) => state
                .entities
                .values()
                .find(|e| e.fully_qualified_name.as_deref() == Some(fqn.as_str())),
        };
        found.filter(|e| e.entity_type == entity_type).map(|e| e.id)
    }

    /// Breadth-first walk from `root` following edges in one direction
    fn walk(state: &BackendState, root: Uuid, hops: u32, downstream: bool) -> (Vec<LineageEdge>, Vec<Uuid>) {
        let mut edges = Vec::new();
        let mut reached = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut queue = VecDeque::from([(root, 0u32)]);

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= hops {
                continue;
            }
            for edge in &state.edges {
                let (near, far) = if downstream {
                    (edge.from_entity, edge.to_entity)
                } else {
                    (edge.to_entity, edge.from_entity)
                };
                if near != current {
                    continue;
                }
                edges.push(edge.clone());
                if seen.insert(far) {
                    reached.push(far);
                    queue.push_back((far, depth + 1));
                }
            }
        }
        (edges, reached)
    }

    fn subgraph(state: &BackendState, root: Uuid, depth: LineageDepth) -> LineageResult<EntityLineage> {
        let entity = state
            .entities
            .get(&root)
            .cloned()
            .ok_or_else(|| LineageError::NotFound(format!("entity {} not found", root)))?;

        let (upstream_edges, upstream_nodes) = Self::walk(state, root, depth.upstream, false);
        let (downstream_edges, downstream_nodes) = Self::walk(state, root, depth.downstream, true);

        let mut seen = HashSet::new();
        let nodes = upstream_nodes
            .into_iter()
            .chain(downstream_nodes)
            .filter(|id| seen.insert(*id))
            .filter_map(|id| state.entities.get(&id).cloned())
            .collect();

        Ok(EntityLineage {
            entity,
            nodes,
            upstream_edges,
            downstream_edges,
        })
    }
}

impl fmt::Debug for FakeLineageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FakeLineageBackend")
            .field("entities", &state.entities.len())
            .field("edges", &state.edges.len())
            .finish()
    }
}

#[async_trait]
impl LineageApi for FakeLineageBackend {
    async fn get_lineage(
        &self,
        entity_type: EntityType,
        target: &LineageTarget,
        depth: LineageDepth,
    ) -> LineageResult<EntityLineage> {
        let (root, delay, failure) = {
            let mut state = self.state.lock();
            let root = Self::resolve(&state, entity_type, target)
                .ok_or_else(|| LineageError::NotFound(format!("{} {} not found", entity_type, target)))?;
            *state.fetch_counts.entry(root).or_insert(0) += 1;
            (
                root,
                state.delays.get(&root).copied(),
                state.fetch_failures.get(&root).cloned(),
            )
        };

        if let Some(delay) = delay {
            debug!(node = %root, ?delay, "delaying fake lineage response");
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = failure {
            return Err(error);
        }

        let state = self.state.lock();
        Self::subgraph(&state, root, depth)
    }

    async fn add_lineage(&self, edge: &AddLineage) -> LineageResult<()> {
        edge.validate()?;
        if let Some(error) = self.state.lock().mutation_failure.clone() {
            return Err(error);
        }
        self.connect(&edge.edge.from_entity, &edge.edge.to_entity);
        Ok(())
    }

    async fn delete_lineage_edge(
        &self,
        from_entity: EntityType,
        from_id: Uuid,
        to_entity: EntityType,
        to_id: Uuid,
    ) -> LineageResult<()> {
        from_entity.ensure_known()?;
        to_entity.ensure_known()?;

        let mut state = self.state.lock();
        if let Some(error) = state.mutation_failure.clone() {
            return Err(error);
        }
        let before = state.edges.len();
        state.edges.retain(|e| !(e.from_entity == from_id && e.to_entity == to_id));
        if state.edges.len() == before {
            return Err(LineageError::NotFound(format!("edge {} -> {} not found", from_id, to_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl PermissionApi for FakeLineageBackend {
    async fn list_permissions(&self) -> LineageResult<Vec<ResourcePermission>> {
        Ok(self.state.lock().permissions.clone())
    }
}
