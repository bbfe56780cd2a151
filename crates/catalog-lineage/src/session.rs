//! Process-wide session context
//!
//! Holds the logged-in user and the permission matrix loaded for them.
//! Components receive a cloned handle and only read from it; login and logout
//! are the only writers.

use std::sync::Arc;

use catalog_interfaces::{
    LineageError, LineageResult, Operation, OperationPermission, PermissionApi, PermissionMatrix,
    ResourceEntity,
};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// Identity of the logged-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub logged_in_at: DateTime<Utc>,
}

impl CurrentUser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            display_name: None,
            email: None,
            is_admin: false,
            logged_in_at: Utc::now(),
        }
    }

    pub fn admin(name: impl Into<String>) -> Self {
        Self { is_admin: true, ..Self::new(name) }
    }
}

#[derive(Debug)]
struct SessionState {
    user: CurrentUser,
    permissions: PermissionMatrix,
}

/// Cloneable handle on the session. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Option<SessionState>>>,
}

static GLOBAL_SESSION: OnceCell<SessionContext> = OnceCell::new();

impl SessionContext {
    /// A fresh, logged-out session
    pub fn new() -> Self {
        Self::default()
    }

    /// The session shared by the whole process
    pub fn global() -> SessionContext {
        GLOBAL_SESSION.get_or_init(SessionContext::new).clone()
    }

    pub fn login(&self, user: CurrentUser, permissions: PermissionMatrix) {
        info!(user = %user.name, "session started");
        *self.inner.write() = Some(SessionState { user, permissions });
    }

    /// Loads the user's permissions from the backend, then logs them in
    pub async fn login_with(&self, user: CurrentUser, api: &dyn PermissionApi) -> LineageResult<()> {
        let resources = api.list_permissions().await?;
        debug!(user = %user.name, resources = resources.len(), "loaded permissions");
        self.login(user, PermissionMatrix::from_resource_permissions(&resources));
        Ok(())
    }

    pub fn logout(&self) {
        if let Some(state) = self.inner.write().take() {
            info!(user = %state.user.name, "session ended");
        }
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.inner.read().as_ref().map(|state| state.user.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.read().is_some()
    }

    /// Whether the logged-in user may perform `operation` on `resource`.
    /// Administrators may do anything; nobody may do anything while logged out.
    pub fn check(&self, resource: ResourceEntity, operation: Operation) -> bool {
        match self.inner.read().as_ref() {
            Some(state) if state.user.is_admin => true,
            Some(state) => state.permissions.check(resource, operation),
            None => false,
        }
    }

    pub fn operation_permission(&self, resource: ResourceEntity) -> OperationPermission {
        match self.inner.read().as_ref() {
            Some(state) if state.user.is_admin => OperationPermission::full(),
            Some(state) => state.permissions.operation_permission(resource),
            None => OperationPermission::default(),
        }
    }

    /// Fails with `AccessDenied` unless the operation is allowed
    pub fn require(&self, resource: ResourceEntity, operation: Operation) -> LineageResult<()> {
        if !self.is_logged_in() {
            return Err(LineageError::AccessDenied("no user is logged in".to_string()));
        }
        if !self.check(resource, operation) {
            return Err(LineageError::AccessDenied(format!(
                "{:?} is not permitted on {:?}",
                operation, resource
            )));
        }
        Ok(())
    }
}
