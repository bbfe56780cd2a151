//! Capability matrix for catalog operations
//!
//! Permissions arrive from the backend as per-resource lists of
//! `(operation, access)` pairs. They are folded into a matrix keyed by
//! `(resource, operation)` so checks are plain lookups.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::lineage::{EntityType, LineageResult};

/// Resource kinds permissions are granted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceEntity {
    /// Any resource
    All,
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
    /// Team administration
    Team,
    /// User administration
    User,
    /// Role administration
    Role,
    /// Policy administration
    Policy,
    /// Business glossary
    Glossary,
    /// Data quality test suite
    TestSuite,
    /// Resource not known to this client. Never stored in a matrix.
    #[serde(other)]
    Unknown,
}

impl From<EntityType> for ResourceEntity {
    fn from(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Table => ResourceEntity::Table,
            EntityType::Topic => ResourceEntity::Topic,
            EntityType::Dashboard => ResourceEntity::Dashboard,
            EntityType::Pipeline => ResourceEntity::Pipeline,
            EntityType::MlModel => ResourceEntity::MlModel,
            EntityType::Container => ResourceEntity::Container,
            EntityType::StoredProcedure => ResourceEntity::StoredProcedure,
            EntityType::DashboardDataModel => ResourceEntity::DashboardDataModel,
            EntityType::SearchIndex => ResourceEntity::SearchIndex,
            EntityType::Unknown => ResourceEntity::Unknown,
        }
    }
}

/// Operations that can be granted on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Every operation
    All,
    /// Create new instances
    Create,
    /// Delete instances
    Delete,
    /// Read every field
    ViewAll,
    /// Read basic fields
    ViewBasic,
    /// Edit every field
    EditAll,
    /// Edit the description
    EditDescription,
    /// Change ownership
    EditOwner,
    /// Change tags
    EditTags,
    /// Add or remove lineage edges
    EditLineage,
    /// Change the display name
    EditDisplayName,
    /// Operation not known to this client
    #[serde(other)]
    Unknown,
}

/// Decision recorded for one `(resource, operation)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Access {
    /// Granted
    Allow,
    /// Explicitly refused
    Deny,
    /// Granted subject to a policy condition
    ConditionalAllow,
    /// Refused subject to a policy condition
    ConditionalDeny,
    /// No policy grants it
    NotAllow,
}

impl Access {
    fn is_denial(self) -> bool {
        matches!(self, Access::Deny | Access::ConditionalDeny)
    }

    fn is_grant(self) -> bool {
        matches!(self, Access::Allow | Access::ConditionalAllow)
    }
}

/// One permission entry as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// Operation the entry is about
    pub operation: Operation,
    /// Decision
    pub access: Access,
    /// Rule that produced the decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Policy that holds the rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

/// Permissions of the current user on one resource kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePermission {
    /// Resource kind
    pub resource: ResourceEntity,
    /// Entries for that resource
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Lookup table keyed by `(resource, operation)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionMatrix {
    entries: HashMap<(ResourceEntity, Operation), Access>,
}

impl PermissionMatrix {
    /// Creates an empty matrix that grants nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds backend permission lists into a matrix. A later denial overrides an earlier grant.
    ///
    /// Entries for resources or operations this client does not recognise are
    /// dropped, since distinct unknown names would otherwise share one key.
    pub fn from_resource_permissions(resources: &[ResourcePermission]) -> Self {
        let mut matrix = Self::new();
        for resource in resources {
            for permission in &resource.permissions {
                matrix.set(resource.resource, permission.operation, permission.access);
            }
        }
        matrix
    }

    /// Records a decision. An existing denial is never downgraded.
    /// Unknown resources and operations are ignored.
    pub fn set(&mut self, resource: ResourceEntity, operation: Operation, access: Access) {
        if resource == ResourceEntity::Unknown || operation == Operation::Unknown {
            return;
        }
        let entry = self.entries.entry((resource, operation)).or_insert(access);
        if !entry.is_denial() {
            *entry = access;
        }
    }

    /// Builder form of [`PermissionMatrix::set`]
    pub fn with(mut self, resource: ResourceEntity, operation: Operation, access: Access) -> Self {
        self.set(resource, operation, access);
        self
    }

    /// Raw decision for an exact pair
    pub fn access(&self, resource: ResourceEntity, operation: Operation) -> Option<Access> {
        self.entries.get(&(resource, operation)).copied()
    }

    /// Whether `operation` is granted on `resource`.
    ///
    /// The exact pair is consulted first, then the resource's `All` operation,
    /// then the `all` resource. Any denial among them refuses the operation.
    /// An unknown resource or operation only matches the `All` entries.
    pub fn check(&self, resource: ResourceEntity, operation: Operation) -> bool {
        let candidates = [
            (resource, operation),
            (resource, Operation::All),
            (ResourceEntity::All, operation),
            (ResourceEntity::All, Operation::All),
        ];

        // unknown keys are never stored, so they fall through to the `All` entries
        let found: Vec<Access> = candidates
            .iter()
            .filter_map(|(r, o)| self.access(*r, *o))
            .collect();

        if found.iter().any(|a| a.is_denial()) {
            return false;
        }
        found.first().map(|a| a.is_grant()).unwrap_or(false)
    }

    /// Boolean summary for one resource kind
    pub fn operation_permission(&self, resource: ResourceEntity) -> OperationPermission {
        let edit_all = self.check(resource, Operation::EditAll);
        let edit = |operation| edit_all || self.check(resource, operation);
        OperationPermission {
            create: self.check(resource, Operation::Create),
            delete: self.check(resource, Operation::Delete),
            view_all: self.check(resource, Operation::ViewAll),
            view_basic: self.check(resource, Operation::ViewBasic),
            edit_all,
            edit_description: edit(Operation::EditDescription),
            edit_owner: edit(Operation::EditOwner),
            edit_tags: edit(Operation::EditTags),
            edit_lineage: edit(Operation::EditLineage),
            edit_display_name: edit(Operation::EditDisplayName),
        }
    }
}

/// Per-resource capability summary consumed by views.
///
/// Every `edit_*` flag is also set when `edit_all` is granted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPermission {
    /// May create
    pub create: bool,
    /// May delete
    pub delete: bool,
    /// May read every field
    pub view_all: bool,
    /// May read basic fields
    pub view_basic: bool,
    /// May edit every field
    pub edit_all: bool,
    /// May edit the description
    pub edit_description: bool,
    /// May change ownership
    pub edit_owner: bool,
    /// May change tags
    pub edit_tags: bool,
    /// May add or remove lineage edges
    pub edit_lineage: bool,
    /// May change the display name
    pub edit_display_name: bool,
}

impl OperationPermission {
    /// Summary granting everything, used for administrators
    pub fn full() -> Self {
        Self {
            create: true,
            delete: true,
            view_all: true,
            view_basic: true,
            edit_all: true,
            edit_description: true,
            edit_owner: true,
            edit_tags: true,
            edit_lineage: true,
            edit_display_name: true,
        }
    }
}

/// Contract for loading the current user's permissions
#[async_trait]
pub trait PermissionApi: Send + Sync {
    /// Contract: Lists the logged-in user's permissions on every resource kind.
    async fn list_permissions(&self) -> LineageResult<Vec<ResourcePermission>>;
}
