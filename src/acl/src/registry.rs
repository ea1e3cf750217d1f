//! Role and permission registry
//!
//! The registry owns the canonical [`Role`] and [`Permission`] records. Writes
//! are insert-or-replace; lookups of unknown identifiers yield `None`.

use crate::error::Result;
use crate::types::{Permission, PermissionId, Role, RoleId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry storage backend
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Insert or replace a role
    async fn upsert_role(&self, role: Role) -> Result<()>;

    /// Insert or replace a permission
    async fn upsert_permission(&self, permission: Permission) -> Result<()>;

    /// Get a role by ID
    async fn get_role(&self, id: &str) -> Result<Option<Role>>;

    /// Get a permission by ID
    async fn get_permission(&self, id: &str) -> Result<Option<Permission>>;

    /// List all roles, sorted by ID
    async fn list_roles(&self) -> Result<Vec<Role>>;

    /// List all permissions, sorted by ID
    async fn list_permissions(&self) -> Result<Vec<Permission>>;

    /// Remove every role and permission
    async fn clear(&self) -> Result<()>;
}

/// In-memory registry implementation
pub struct InMemoryRegistry {
    roles: Arc<RwLock<HashMap<RoleId, Role>>>,
    permissions: Arc<RwLock<HashMap<PermissionId, Permission>>>,
}

impl InMemoryRegistry {
    /// Create an empty in-memory registry
    pub fn new() -> Self {
        Self {
            roles: Arc::new(RwLock::new(HashMap::new())),
            permissions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryStore for InMemoryRegistry {
    async fn upsert_role(&self, role: Role) -> Result<()> {
        let mut roles = self.roles.write().await;
        roles.insert(role.id.clone(), role);
        Ok(())
    }

    async fn upsert_permission(&self, permission: Permission) -> Result<()> {
        let mut permissions = self.permissions.write().await;
        permissions.insert(permission.id.clone(), permission);
        Ok(())
    }

    async fn get_role(&self, id: &str) -> Result<Option<Role>> {
        let roles = self.roles.read().await;
        Ok(roles.get(id).cloned())
    }

    async fn get_permission(&self, id: &str) -> Result<Option<Permission>> {
        let permissions = self.permissions.read().await;
        Ok(permissions.get(id).cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let roles = self.roles.read().await;
        let mut all: Vec<Role> = roles.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let permissions = self.permissions.read().await;
        let mut all: Vec<Permission> = permissions.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn clear(&self) -> Result<()> {
        self.roles.write().await.clear();
        self.permissions.write().await.clear();
        Ok(())
    }
}
