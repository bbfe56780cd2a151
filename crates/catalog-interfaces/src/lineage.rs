//! Lineage interfaces for the catalog
//!
//! This module defines the lineage payloads exchanged with the catalog backend
//! and the contract every lineage API client must fulfil.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type for lineage operations
pub type LineageResult<T> = Result<T, LineageError>;

/// Errors that can occur when reading or editing lineage
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LineageError {
    /// Transport level failure (connect, timeout, broken body)
    #[error("Communication error: {0}")]
    Communication(String),

    /// Caller is not allowed to perform the operation (401/403 or local capability check)
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The requested entity or edge does not exist
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Any other 4xx answered by the backend
    #[error("Invalid request ({status}): {message}")]
    InvalidRequest {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// 5xx answered by the backend
    #[error("Server error ({status}): {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Response body could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Rejected locally before any request was sent
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Client configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unexpected internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LineageError {
    /// HTTP status carried by the error, when it came from a backend response
    pub fn status(&self) -> Option<u16> {
        match self {
            LineageError::InvalidRequest { status, .. } | LineageError::Server { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

/// Kind of catalog asset an entity reference points to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    /// Database table
    Table,
    /// Messaging topic
    Topic,
    /// BI dashboard
    Dashboard,
    /// Data pipeline
    Pipeline,
    /// Machine learning model
    #[serde(rename = "mlmodel")]
    MlModel,
    /// Storage container
    Container,
    /// Stored procedure
    StoredProcedure,
    /// Dashboard data model
    DashboardDataModel,
    /// Search index
    SearchIndex,
    /// Kind not known to this client
    #[serde(other)]
    Unknown,
}

impl EntityType {
    /// Path segment used by the backend for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Table => "table",
            EntityType::Topic => "topic",
            EntityType::Dashboard => "dashboard",
            EntityType::Pipeline => "pipeline",
            EntityType::MlModel => "mlmodel",
            EntityType::Container => "container",
            EntityType::StoredProcedure => "storedProcedure",
            EntityType::DashboardDataModel => "dashboardDataModel",
            EntityType::SearchIndex => "searchIndex",
            EntityType::Unknown => "unknown",
        }
    }

    /// Fails for kinds that cannot be addressed on the backend
    pub fn ensure_known(&self) -> LineageResult<()> {
        match self {
            EntityType::Unknown => Err(LineageError::InvalidParameter(
                "entity type is unknown to this client".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to any catalog asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReference {
    /// Unique identifier of the entity
    pub id: Uuid,

    /// Kind of the entity
    #[serde(rename = "type")]
    pub entity_type: EntityType,

    /// Dotted fully qualified name, e.g. `service.db.schema.table`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_name: Option<String>,

    /// Short name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Human friendly name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether the entity is soft deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

impl EntityReference {
    /// Creates a bare reference carrying only id and type
    pub fn new(id: Uuid, entity_type: EntityType) -> Self {
        Self {
            id,
            entity_type,
            fully_qualified_name: None,
            name: None,
            display_name: None,
            description: None,
            deleted: None,
        }
    }

    /// Sets the fully qualified name and derives `name` from its last segment
    pub fn with_fqn(mut self, fqn: impl Into<String>) -> Self {
        let fqn = fqn.into();
        self.name = fqn.rsplit('.').next().map(str::to_string);
        self.fully_qualified_name = Some(fqn);
        self
    }

    /// Label suitable for logs and node captions
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .or_else(|| self.name.clone())
            .or_else(|| self.fully_qualified_name.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Uniqueness key of a directed edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    /// Upstream side
    pub from: Uuid,
    /// Downstream side
    pub to: Uuid,
}

/// Directed edge as carried in a lineage payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEdge {
    /// Id of the upstream entity
    pub from_entity: Uuid,
    /// Id of the downstream entity
    pub to_entity: Uuid,
    /// Optional edge description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LineageEdge {
    /// Creates an edge without description
    pub fn new(from_entity: Uuid, to_entity: Uuid) -> Self {
        Self { from_entity, to_entity, description: None }
    }

    /// Dedup key of this edge
    pub fn key(&self) -> EdgeKey {
        EdgeKey { from: self.from_entity, to: self.to_entity }
    }
}

/// Edge between two fully referenced entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitiesEdge {
    /// Upstream entity
    pub from_entity: EntityReference,
    /// Downstream entity
    pub to_entity: EntityReference,
    /// Optional edge description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `PUT /lineage`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddLineage {
    /// The edge to create
    pub edge: EntitiesEdge,
}

impl AddLineage {
    /// Creates an add request between two entities
    pub fn new(from_entity: EntityReference, to_entity: EntityReference) -> Self {
        Self {
            edge: EntitiesEdge { from_entity, to_entity, description: None },
        }
    }

    /// Rejects self-loops and endpoints of unknown kind
    pub fn validate(&self) -> LineageResult<()> {
        let edge = &self.edge;
        if edge.from_entity.id == edge.to_entity.id {
            return Err(LineageError::InvalidParameter(format!(
                "lineage edge cannot loop on entity {}",
                edge.from_entity.id
            )));
        }
        edge.from_entity.entity_type.ensure_known()?;
        edge.to_entity.entity_type.ensure_known()
    }

    /// Graph form of the edge
    pub fn to_lineage_edge(&self) -> LineageEdge {
        LineageEdge {
            from_entity: self.edge.from_entity.id,
            to_entity: self.edge.to_entity.id,
            description: self.edge.description.clone(),
        }
    }
}

/// Identifies one edge for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    /// Kind of the upstream entity
    pub from_entity: EntityType,
    /// Id of the upstream entity
    pub from_id: Uuid,
    /// Kind of the downstream entity
    pub to_entity: EntityType,
    /// Id of the downstream entity
    pub to_id: Uuid,
}

impl EdgeData {
    /// Dedup key of the addressed edge
    pub fn key(&self) -> EdgeKey {
        EdgeKey { from: self.from_id, to: self.to_id }
    }
}

impl From<&AddLineage> for EdgeData {
    fn from(add: &AddLineage) -> Self {
        Self {
            from_entity: add.edge.from_entity.entity_type,
            from_id: add.edge.from_entity.id,
            to_entity: add.edge.to_entity.entity_type,
            to_id: add.edge.to_entity.id,
        }
    }
}

/// Lineage payload centred on one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityLineage {
    /// Entity the payload is centred on
    pub entity: EntityReference,
    /// Other entities referenced by the edges
    #[serde(default)]
    pub nodes: Vec<EntityReference>,
    /// Edges leading into the entity's ancestry
    #[serde(default)]
    pub upstream_edges: Vec<LineageEdge>,
    /// Edges leading out to the entity's descendants
    #[serde(default)]
    pub downstream_edges: Vec<LineageEdge>,
}

impl EntityLineage {
    /// Lineage with no nodes or edges besides the entity itself
    pub fn empty(entity: EntityReference) -> Self {
        Self {
            entity,
            nodes: Vec::new(),
            upstream_edges: Vec::new(),
            downstream_edges: Vec::new(),
        }
    }

    /// Edges in the given traversal direction
    pub fn edges(&self, direction: LineageDirection) -> &[LineageEdge] {
        match direction {
            LineageDirection::To => &self.downstream_edges,
            LineageDirection::From => &self.upstream_edges,
        }
    }
}

/// Traversal direction of a node expansion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineageDirection {
    /// Expand downstream from the node
    To,
    /// Expand upstream into the node
    From,
}

impl fmt::Display for LineageDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineageDirection::To => f.write_str("to"),
            LineageDirection::From => f.write_str("from"),
        }
    }
}

/// How the entity of a lineage fetch is addressed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineageTarget {
    /// By entity id
    Id(Uuid),
    /// By fully qualified name
    Fqn(String),
}

impl LineageTarget {
    /// Prefers the fully qualified name of a reference, falling back to its id
    pub fn for_reference(entity: &EntityReference) -> Self {
        match &entity.fully_qualified_name {
            Some(fqn) if !fqn.is_empty() => LineageTarget::Fqn(fqn.clone()),
            _ => LineageTarget::Id(entity.id),
        }
    }
}

impl fmt::Display for LineageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineageTarget::Id(id) => write!(f, "{}", id),
            LineageTarget::Fqn(fqn) => f.write_str(fqn),
        }
    }
}

/// Number of hops requested on each side of the entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageDepth {
    /// Upstream hops
    pub upstream: u32,
    /// Downstream hops
    pub downstream: u32,
}

impl Default for LineageDepth {
    fn default() -> Self {
        Self { upstream: 1, downstream: 1 }
    }
}

/// Contract for a lineage backend client
#[async_trait]
pub trait LineageApi: Send + Sync {
    /// Contract: Fetches the lineage subgraph around one entity.
    /// - `entity_type`: Kind of the entity.
    /// - `target`: Id or fully qualified name of the entity.
    /// - `depth`: Hops requested on each side.
    /// - Returns: the `EntityLineage` centred on the entity. `Err(NotFound)` if it does not exist.
    async fn get_lineage(
        &self,
        entity_type: EntityType,
        target: &LineageTarget,
        depth: LineageDepth,
    ) -> LineageResult<EntityLineage>;

    /// Contract: Persists a directed edge. Resolves with no payload. Never retried.
    async fn add_lineage(&self, edge: &AddLineage) -> LineageResult<()>;

    /// Contract: Deletes the directed edge `from_id -> to_id`. Resolves with no payload. Never retried.
    async fn delete_lineage_edge(
        &self,
        from_entity: EntityType,
        from_id: Uuid,
        to_entity: EntityType,
        to_id: Uuid,
    ) -> LineageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_entity_lineage_from_backend_payload() {
        let root = Uuid::new_v4();
        let child = Uuid::new_v4();
        let payload = json!({
            "entity": {
                "id": root,
                "type": "table",
                "fullyQualifiedName": "mysql.shop.public.orders",
                "name": "orders"
            },
            "nodes": [
                { "id": child, "type": "dashboard", "displayName": "Sales" }
            ],
            "upstreamEdges": [],
            "downstreamEdges": [
                { "fromEntity": root, "toEntity": child }
            ]
        });

        let lineage: EntityLineage = serde_json::from_value(payload).unwrap();
        assert_eq!(lineage.entity.entity_type, EntityType::Table);
        assert_eq!(lineage.nodes[0].label(), "Sales");
        assert_eq!(lineage.downstream_edges, vec![LineageEdge::new(root, child)]);
        assert!(lineage.edges(LineageDirection::From).is_empty());
    }

    #[test]
    fn test_missing_edge_lists_default_to_empty() {
        let payload = json!({ "entity": { "id": Uuid::new_v4(), "type": "topic" } });
        let lineage: EntityLineage = serde_json::from_value(payload).unwrap();
        assert!(lineage.nodes.is_empty());
        assert!(lineage.upstream_edges.is_empty());
        assert!(lineage.downstream_edges.is_empty());
    }

    #[test]
    fn test_unrecognised_entity_type() {
        let entity: EntityReference =
            serde_json::from_value(json!({ "id": Uuid::new_v4(), "type": "chart" })).unwrap();
        assert_eq!(entity.entity_type, EntityType::Unknown);
        assert!(entity.entity_type.ensure_known().is_err());
    }

    #[test]
    fn test_ml_model_wire_name() {
        assert_eq!(serde_json::to_value(EntityType::MlModel).unwrap(), json!("mlmodel"));
        assert_eq!(
            serde_json::to_value(EntityType::StoredProcedure).unwrap(),
            json!("storedProcedure")
        );
    }

    #[test]
    fn test_add_lineage_body_shape() {
        let from = EntityReference::new(Uuid::new_v4(), EntityType::Table);
        let to = EntityReference::new(Uuid::new_v4(), EntityType::Dashboard);
        let body = serde_json::to_value(AddLineage::new(from.clone(), to.clone())).unwrap();
        assert_eq!(
            body,
            json!({
                "edge": {
                    "fromEntity": { "id": from.id, "type": "table" },
                    "toEntity": { "id": to.id, "type": "dashboard" }
                }
            })
        );
    }

    #[test]
    fn test_add_lineage_rejects_self_loop() {
        let entity = EntityReference::new(Uuid::new_v4(), EntityType::Table);
        let err = AddLineage::new(entity.clone(), entity).validate().unwrap_err();
        assert!(matches!(err, LineageError::InvalidParameter(_)));
    }

    #[test]
    fn test_target_prefers_fqn() {
        let id = Uuid::new_v4();
        let bare = EntityReference::new(id, EntityType::Table);
        assert_eq!(LineageTarget::for_reference(&bare), LineageTarget::Id(id));

        let named = bare.with_fqn("svc.db.schema.orders");
        assert_eq!(named.name.as_deref(), Some("orders"));
        assert_eq!(
            LineageTarget::for_reference(&named),
            LineageTarget::Fqn("svc.db.schema.orders".to_string())
        );
    }

    #[test]
    fn test_error_display() {
        let error = LineageError::Server { status: 502, message: "bad gateway".into() };
        assert_eq!(format!("{}", error), "Server error (502): bad gateway");
        assert_eq!(error.status(), Some(502));
    }
}
