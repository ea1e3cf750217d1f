//! Time-bounded role assignments
//!
//! [`AssignmentStore`] is the storage contract; [`AssignmentManager`] layers the
//! validation and activity rules on top of it:
//!
//! - at most one record per (user, role), whether active or expired
//! - the duplicate check runs before the role-existence check
//! - an assignment is active iff it has no expiry or its expiry is after "now"
//! - expired records stay in the store until revoked or explicitly purged

use crate::clock::Clock;
use crate::error::{AclError, Result};
use crate::registry::RegistryStore;
use crate::types::{Assignment, AssignmentOptions, Role, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Assignment storage backend
///
/// Implementations must return a user's assignments in insertion order.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Find the record for an exact (user, role) pair
    async fn find(&self, user_id: &str, role_id: &str) -> Result<Option<Assignment>>;

    /// Append a record; callers enforce uniqueness
    async fn insert(&self, assignment: Assignment) -> Result<()>;

    /// Remove the record for a (user, role) pair, returning it if present
    async fn remove(&self, user_id: &str, role_id: &str) -> Result<Option<Assignment>>;

    /// All records for a user, active or not, in insertion order
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Assignment>>;

    /// Remove every record that is no longer active at `now`
    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<Vec<Assignment>>;

    /// Remove every record
    async fn clear(&self) -> Result<()>;
}

/// In-memory assignment store keyed by user
pub struct InMemoryAssignmentStore {
    assignments: Arc<RwLock<HashMap<UserId, Vec<Assignment>>>>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self {
            assignments: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryAssignmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn find(&self, user_id: &str, role_id: &str) -> Result<Option<Assignment>> {
        let assignments = self.assignments.read().await;
        Ok(assignments
            .get(user_id)
            .and_then(|list| list.iter().find(|a| a.role_id == role_id))
            .cloned())
    }

    async fn insert(&self, assignment: Assignment) -> Result<()> {
        let mut assignments = self.assignments.write().await;
        assignments
            .entry(assignment.user_id.clone())
            .or_default()
            .push(assignment);
        Ok(())
    }

    async fn remove(&self, user_id: &str, role_id: &str) -> Result<Option<Assignment>> {
        let mut assignments = self.assignments.write().await;
        let Some(list) = assignments.get_mut(user_id) else {
            return Ok(None);
        };

        let removed = list
            .iter()
            .position(|a| a.role_id == role_id)
            .map(|idx| list.remove(idx));

        if list.is_empty() {
            assignments.remove(user_id);
        }

        Ok(removed)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Assignment>> {
        let assignments = self.assignments.read().await;
        Ok(assignments.get(user_id).cloned().unwrap_or_default())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<Vec<Assignment>> {
        let mut assignments = self.assignments.write().await;
        let mut removed = Vec::new();

        assignments.retain(|_, list| {
            let (active, expired): (Vec<_>, Vec<_>) =
                list.drain(..).partition(|a| a.is_active(now));
            removed.extend(expired);
            *list = active;
            !list.is_empty()
        });

        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        self.assignments.write().await.clear();
        Ok(())
    }
}

/// A user's active roles at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRoles {
    pub roles: Vec<Role>,

    /// Earliest expiry among the active assignments; the role set is only
    /// guaranteed unchanged before this instant. `None` if nothing expires.
    pub valid_until: Option<DateTime<Utc>>,
}

/// Applies assignment rules over an [`AssignmentStore`] and the role registry
#[derive(Clone)]
pub struct AssignmentManager {
    store: Arc<dyn AssignmentStore>,
    registry: Arc<dyn RegistryStore>,
    clock: Arc<dyn Clock>,
}

impl AssignmentManager {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        registry: Arc<dyn RegistryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
        }
    }

    /// Bind a role to a user
    ///
    /// # Errors
    ///
    /// - [`AclError::DuplicateAssignment`] if the pair already has a record, even an expired one
    /// - [`AclError::RoleNotFound`] if the role is not registered
    pub async fn assign(
        &self,
        user_id: &str,
        role_id: &str,
        options: AssignmentOptions,
    ) -> Result<Assignment> {
        if self.store.find(user_id, role_id).await?.is_some() {
            return Err(AclError::DuplicateAssignment {
                user_id: user_id.to_string(),
                role_id: role_id.to_string(),
            });
        }

        if self.registry.get_role(role_id).await?.is_none() {
            return Err(AclError::RoleNotFound {
                role_id: role_id.to_string(),
            });
        }

        let assignment = Assignment {
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
            assigned_at: self.clock.now(),
            expires_at: options.expires_at,
            reason: options.reason,
            metadata: options.metadata,
        };

        self.store.insert(assignment.clone()).await?;
        Ok(assignment)
    }

    /// Remove a user's assignment of a role, active or expired
    ///
    /// # Errors
    ///
    /// [`AclError::AssignmentNotFound`] if the pair has no record.
    pub async fn revoke(&self, user_id: &str, role_id: &str) -> Result<Assignment> {
        self.store
            .remove(user_id, role_id)
            .await?
            .ok_or_else(|| AclError::AssignmentNotFound {
                user_id: user_id.to_string(),
                role_id: role_id.to_string(),
            })
    }

    /// Roles behind the user's active assignments, in assignment order
    ///
    /// Assignments whose role is no longer registered are skipped. The result
    /// also carries the instant the earliest active assignment lapses.
    pub async fn active_roles_for(&self, user_id: &str) -> Result<ActiveRoles> {
        let now = self.clock.now();
        let assignments = self.store.list_for_user(user_id).await?;

        let active: Vec<&Assignment> = assignments.iter().filter(|a| a.is_active(now)).collect();
        let valid_until = active.iter().filter_map(|a| a.expires_at).min();

        let lookups = active.iter().map(|a| self.registry.get_role(&a.role_id));
        let roles: Vec<Role> = try_join_all(lookups).await?.into_iter().flatten().collect();

        debug!(
            "User {} has {} active role(s) out of {} assignment(s)",
            user_id,
            roles.len(),
            assignments.len()
        );

        Ok(ActiveRoles { roles, valid_until })
    }

    /// All of a user's assignment records
    pub async fn assignments_for(&self, user_id: &str) -> Result<Vec<Assignment>> {
        self.store.list_for_user(user_id).await
    }

    /// Physically remove assignments that have expired
    pub async fn purge_expired(&self) -> Result<Vec<Assignment>> {
        self.store.remove_expired(self.clock.now()).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }
}
