//! Catalog Interfaces
//!
//! This crate provides the wire and contract types shared between the lineage
//! engine and anything that talks to the catalog REST backend.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Lineage payloads, edge model and the lineage API contract
pub mod lineage;

/// Operation x resource capability matrix
pub mod permissions;

/// Re-export key types for convenient usage
pub use lineage::{
    AddLineage, EdgeData, EdgeKey, EntitiesEdge, EntityLineage, EntityReference, EntityType,
    LineageApi, LineageDepth, LineageDirection, LineageEdge, LineageError, LineageResult,
    LineageTarget,
};
pub use permissions::{
    Access, Operation, OperationPermission, Permission, PermissionApi, PermissionMatrix, ResourceEntity,
    ResourcePermission,
};
