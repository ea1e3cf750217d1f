//! Permission service
//!
//! Composes the registry, assignment manager, evaluator and result cache
//! behind the public operations, and owns cache-key construction.
//!
//! # Architecture
//!
//! ```text
//! check_permission → [Cache] ─hit──────────────────────────────→ decision
//!                       ↓ miss
//!                  AssignmentManager → Registry → Evaluator → [Cache] → decision
//!
//! assign_role / revoke_role → AssignmentManager → evict user namespaces
//! ```
//!
//! # Consistency
//!
//! A single read/write gate serializes mutations against cache-populating
//! reads: every read path holds the read side across compute and cache write,
//! every mutation holds the write side across store change and invalidation.
//! A check can therefore never re-cache state that a concurrent assignment or
//! revocation has just invalidated. The gate is taken once per public call.
//!
//! Cached values are also bounded by the earliest expiry among the user's
//! active assignments, so a lapsed assignment is never served from the cache
//! even while the entry's TTL has time left.

pub mod builder;
pub mod keys;

pub use builder::AclServiceBuilder;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::assignment::{ActiveRoles, AssignmentManager};
use crate::cache::CacheBackend;
use crate::clock::Clock;
use crate::config::AclConfig;
use crate::error::Result;
use crate::evaluator::{dedup_permissions, Evaluator};
use crate::metrics::{MetricsCollector, ServiceMetrics};
use crate::registry::RegistryStore;
use crate::types::{
    Assignment, AssignmentOptions, Permission, PermissionAction, PermissionCheckResult,
    PermissionContext, Role,
};

/// Results the service keeps in its cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedData {
    Decision(PermissionCheckResult),
    Roles(Vec<Role>),
    Permissions(Vec<Permission>),
}

/// A cached result together with the instant it stops describing the user
#[derive(Debug, Clone, PartialEq)]
pub struct CachedValue {
    pub data: CachedData,

    /// Earliest expiry among the user's active assignments when computed
    pub valid_until: Option<DateTime<Utc>>,
}

impl CachedValue {
    /// Still describes the user at `now`; the cache TTL is checked separately
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.map_or(true, |until| now < until)
    }
}

/// Role-based permission service
pub struct AclService {
    config: AclConfig,
    registry: Arc<dyn RegistryStore>,
    assignments: AssignmentManager,
    evaluator: Evaluator,

    /// `None` when caching is disabled
    cache: Option<Arc<dyn CacheBackend<CachedValue>>>,

    metrics: Option<Arc<MetricsCollector>>,
    clock: Arc<dyn Clock>,
    gate: RwLock<()>,
}

impl AclService {
    /// Create a service with in-memory stores and the system clock
    pub async fn new(config: AclConfig) -> Result<Self> {
        AclServiceBuilder::new().config(config).build().await
    }

    pub fn builder() -> AclServiceBuilder {
        AclServiceBuilder::new()
    }

    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Permission checks
    // ------------------------------------------------------------------

    /// Decide whether a user may perform an action
    ///
    /// Cached decisions are returned unchanged, including their original
    /// `evaluated_at`. Denial is an `Ok` result with `granted == false`.
    pub async fn check_permission(
        &self,
        context: &PermissionContext,
    ) -> Result<PermissionCheckResult> {
        let start = Instant::now();
        let result = {
            let _gate = self.gate.read().await;
            self.check_permission_locked(context).await
        };

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(decision) => metrics.record_decision(decision.granted, start.elapsed()),
                Err(_) => metrics.record_error(),
            }
        }

        result
    }

    /// Shorthand for `check_permission(..).granted`
    pub async fn has_permission(&self, context: &PermissionContext) -> Result<bool> {
        Ok(self.check_permission(context).await?.granted)
    }

    /// Whether any of the user's active roles has the given display name
    pub async fn has_role(&self, user_id: &str, role_name: &str) -> Result<bool> {
        let roles = self.get_user_roles(user_id).await?;
        Ok(roles.iter().any(|role| role.name == role_name))
    }

    /// Roles behind the user's active assignments
    pub async fn get_user_roles(&self, user_id: &str) -> Result<Vec<Role>> {
        let _gate = self.gate.read().await;
        Ok(self.user_roles_locked(user_id).await?.roles)
    }

    /// Permissions carried by the user's active roles, de-duplicated
    pub async fn get_user_permissions(&self, user_id: &str) -> Result<Vec<Permission>> {
        let _gate = self.gate.read().await;
        let active = self.user_roles_locked(user_id).await?;
        self.user_permissions_locked(user_id, &active).await
    }

    /// Every assignment record of a user, active or expired
    pub async fn get_user_assignments(&self, user_id: &str) -> Result<Vec<Assignment>> {
        let _gate = self.gate.read().await;
        self.assignments.assignments_for(user_id).await
    }

    // ------------------------------------------------------------------
    // Role assignment
    // ------------------------------------------------------------------

    /// Assign a role to a user, then evict the user's cached entries
    ///
    /// # Errors
    ///
    /// - `DuplicateAssignment` if the pair already has a record
    /// - `RoleNotFound` if the role is not registered
    pub async fn assign_role(
        &self,
        user_id: &str,
        role_id: &str,
        options: AssignmentOptions,
    ) -> Result<()> {
        let _gate = self.gate.write().await;

        let assignment = match self.assignments.assign(user_id, role_id, options).await {
            Ok(assignment) => assignment,
            Err(e) => {
                self.record_error();
                return Err(e);
            }
        };
        self.invalidate_user_locked(user_id).await?;

        info!(
            "Assigned role {} to user {} (expires_at={:?}, reason={:?})",
            role_id, user_id, assignment.expires_at, assignment.reason
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_assignment();
        }

        Ok(())
    }

    /// Revoke a user's role, then evict the user's cached entries
    ///
    /// # Errors
    ///
    /// `AssignmentNotFound` if the pair has no record.
    pub async fn revoke_role(&self, user_id: &str, role_id: &str) -> Result<()> {
        let _gate = self.gate.write().await;

        if let Err(e) = self.assignments.revoke(user_id, role_id).await {
            self.record_error();
            return Err(e);
        }
        self.invalidate_user_locked(user_id).await?;

        info!("Revoked role {} from user {}", role_id, user_id);

        if let Some(metrics) = &self.metrics {
            metrics.record_revocation();
        }

        Ok(())
    }

    /// Physically remove expired assignments, returning how many were removed
    ///
    /// Expired assignments are otherwise kept until revoked; this never runs
    /// on its own.
    pub async fn purge_expired_assignments(&self) -> Result<usize> {
        let _gate = self.gate.write().await;

        let removed = self.assignments.purge_expired().await?;
        let users: BTreeSet<&str> = removed.iter().map(|a| a.user_id.as_str()).collect();
        for user_id in &users {
            self.invalidate_user_locked(user_id).await?;
        }

        info!(
            "Purged {} expired assignment(s) across {} user(s)",
            removed.len(),
            users.len()
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_purge(removed.len());
        }

        Ok(removed.len())
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Insert or replace a role; cached results are discarded
    pub async fn add_role(&self, role: Role) -> Result<()> {
        let _gate = self.gate.write().await;
        self.registry.upsert_role(role).await?;
        self.clear_cache_locked().await
    }

    /// Insert or replace a permission; cached results are discarded
    pub async fn add_permission(&self, permission: Permission) -> Result<()> {
        let _gate = self.gate.write().await;
        self.registry.upsert_permission(permission).await?;
        self.clear_cache_locked().await
    }

    pub async fn get_role(&self, role_id: &str) -> Result<Option<Role>> {
        let _gate = self.gate.read().await;
        self.registry.get_role(role_id).await
    }

    pub async fn get_permission(&self, permission_id: &str) -> Result<Option<Permission>> {
        let _gate = self.gate.read().await;
        self.registry.get_permission(permission_id).await
    }

    /// Register the built-in `read-all`/`admin-all` permissions and `user`/`admin` roles
    pub async fn seed_defaults(&self) -> Result<()> {
        let _gate = self.gate.write().await;

        for permission in default_permissions() {
            self.registry.upsert_permission(permission).await?;
        }
        for role in default_roles() {
            self.registry.upsert_role(role).await?;
        }

        debug!("Seeded default roles and permissions");
        self.clear_cache_locked().await
    }

    // ------------------------------------------------------------------
    // Cache and lifecycle
    // ------------------------------------------------------------------

    /// Evict one user's cached roles, permissions and decisions
    pub async fn clear_user_cache(&self, user_id: &str) -> Result<()> {
        self.invalidate_user_locked(user_id).await
    }

    /// Evict everything; a no-op when caching is disabled
    pub async fn clear_cache(&self) -> Result<()> {
        self.clear_cache_locked().await
    }

    /// Drop every role, permission, assignment, cached result and metric
    pub async fn reset(&self) -> Result<()> {
        let _gate = self.gate.write().await;

        self.registry.clear().await?;
        self.assignments.clear().await?;
        self.clear_cache_locked().await?;
        if let Some(metrics) = &self.metrics {
            metrics.reset();
        }

        info!("AclService reset");
        Ok(())
    }

    /// Metrics snapshot, if metrics are enabled
    pub fn metrics(&self) -> Option<ServiceMetrics> {
        self.metrics.as_ref().map(|metrics| metrics.snapshot())
    }

    /// Metrics in Prometheus text format, if metrics are enabled
    pub fn export_metrics(&self) -> Result<Option<String>> {
        self.metrics
            .as_ref()
            .map(|metrics| metrics.export_prometheus())
            .transpose()
    }

    // Private helpers; callers hold the gate where required

    async fn check_permission_locked(
        &self,
        context: &PermissionContext,
    ) -> Result<PermissionCheckResult> {
        let key = keys::permission(context);

        if let Some(cached) = self.cached(&key).await? {
            if let CachedData::Decision(decision) = cached.data {
                debug!("Cache hit for {}", key);
                self.record_cache(true);
                return Ok(decision);
            }
        }
        if self.cache.is_some() {
            self.record_cache(false);
        }

        let active = self.user_roles_locked(&context.user_id).await?;
        let permissions = self.user_permissions_locked(&context.user_id, &active).await?;
        let decision = self
            .evaluator
            .evaluate(context, &active.roles, &permissions, self.clock.now());

        self.log_decision(context, &decision);
        self.store(&key, CachedData::Decision(decision.clone()), active.valid_until)
            .await?;

        Ok(decision)
    }

    async fn user_roles_locked(&self, user_id: &str) -> Result<ActiveRoles> {
        let key = keys::user_roles(user_id);

        if let Some(CachedValue {
            data: CachedData::Roles(roles),
            valid_until,
        }) = self.cached(&key).await?
        {
            return Ok(ActiveRoles { roles, valid_until });
        }

        let active = self.assignments.active_roles_for(user_id).await?;
        self.store(&key, CachedData::Roles(active.roles.clone()), active.valid_until)
            .await?;

        Ok(active)
    }

    async fn user_permissions_locked(
        &self,
        user_id: &str,
        active: &ActiveRoles,
    ) -> Result<Vec<Permission>> {
        let key = keys::user_role_permissions(user_id);

        if let Some(CachedValue {
            data: CachedData::Permissions(permissions),
            ..
        }) = self.cached(&key).await?
        {
            return Ok(permissions);
        }

        let lookups = active
            .roles
            .iter()
            .flat_map(|role| role.permissions.iter())
            .map(|permission_id| self.registry.get_permission(permission_id));
        let resolved = try_join_all(lookups).await?.into_iter().flatten();
        let permissions = dedup_permissions(resolved);

        self.store(
            &key,
            CachedData::Permissions(permissions.clone()),
            active.valid_until,
        )
        .await?;

        Ok(permissions)
    }

    /// Cached value for `key`, unless absent, past its TTL or no longer current
    async fn cached(&self, key: &str) -> Result<Option<CachedValue>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };

        match cache.get(key).await? {
            Some(value) if value.is_current(self.clock.now()) => Ok(Some(value)),
            Some(_) => {
                debug!("Cached entry {} outlived an assignment expiry", key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn store(
        &self,
        key: &str,
        data: CachedData,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.set(key, CachedValue { data, valid_until }).await?;
        }
        Ok(())
    }

    async fn invalidate_user_locked(&self, user_id: &str) -> Result<()> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };

        let mut evicted = 0;
        for prefix in keys::user_namespaces(user_id) {
            evicted += cache.delete_by_prefix(&prefix).await?;
        }

        debug!("Evicted {} cache entries for user {}", evicted, user_id);
        Ok(())
    }

    async fn clear_cache_locked(&self) -> Result<()> {
        if let Some(cache) = &self.cache {
            cache.clear().await?;
            debug!("Result cache cleared");
        }
        Ok(())
    }

    fn log_decision(&self, context: &PermissionContext, decision: &PermissionCheckResult) {
        let verdict = if decision.granted { "GRANT" } else { "DENY" };
        let resource = context.resource_type.as_deref().unwrap_or("any");

        if self.config.debug_mode {
            info!(
                "Decision: {} user={} action={} resource={} ({})",
                verdict, context.user_id, context.action, resource, decision.reason
            );
        } else {
            debug!(
                "Decision: {} user={} action={} resource={} ({})",
                verdict, context.user_id, context.action, resource, decision.reason
            );
        }
    }

    fn record_cache(&self, hit: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(hit);
        }
    }

    fn record_error(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_error();
        }
    }
}

fn default_permissions() -> Vec<Permission> {
    vec![
        Permission::new("read-all", "Read All", PermissionAction::Read),
        Permission::new("admin-all", "Admin All", PermissionAction::All),
    ]
}

fn default_roles() -> Vec<Role> {
    vec![
        Role::new("admin", "Admin").with_permission("admin-all"),
        Role::new("user", "User").with_permission("read-all"),
    ]
}
