//! Result cache behavior as seen through the service

mod common;

use acl_engine::service::keys;
use acl_engine::{
    AclConfig, AclError, AclService, AssignmentOptions, CacheBackend, CachedValue, Clock,
    ManualClock, Permission, PermissionAction, PermissionContext, ResultCache, Role,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{admin_all, read_all, service_with_clock};
use std::sync::Arc;

/// Cache backend whose every call fails
struct UnavailableCache;

#[async_trait]
impl CacheBackend<CachedValue> for UnavailableCache {
    async fn get(&self, _key: &str) -> acl_engine::Result<Option<CachedValue>> {
        Err(AclError::Cache("connection refused".to_string()))
    }

    async fn set(&self, _key: &str, _value: CachedValue) -> acl_engine::Result<()> {
        Err(AclError::Cache("connection refused".to_string()))
    }

    async fn delete_by_prefix(&self, _prefix: &str) -> acl_engine::Result<usize> {
        Err(AclError::Cache("connection refused".to_string()))
    }

    async fn clear(&self) -> acl_engine::Result<()> {
        Err(AclError::Cache("connection refused".to_string()))
    }
}

/// Service sharing an inspectable in-memory cache
async fn service_with_shared_cache() -> (
    AclService,
    Arc<ResultCache<CachedValue>>,
    Arc<ManualClock>,
) {
    common::init_tracing();

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let cache: Arc<ResultCache<CachedValue>> =
        Arc::new(ResultCache::new(Duration::seconds(30), clock.clone()));

    let service = AclService::builder()
        .config(AclConfig {
            cache_ttl_secs: 30,
            ..Default::default()
        })
        .clock(clock.clone())
        .cache_backend(cache.clone())
        .build()
        .await
        .unwrap();

    service.add_permission(read_all()).await.unwrap();
    service.add_permission(admin_all()).await.unwrap();
    service
        .add_role(Role::new("user", "User").with_permission("read-all"))
        .await
        .unwrap();

    (service, cache, clock)
}

// ============================================================================
// POPULATION AND INVALIDATION
// ============================================================================

#[tokio::test]
async fn test_check_populates_user_namespaces() {
    let (service, cache, _) = service_with_shared_cache().await;
    service
        .assign_role("u1", "user", AssignmentOptions::default())
        .await
        .unwrap();

    let context = PermissionContext::new("u1", PermissionAction::Read);
    service.check_permission(&context).await.unwrap();

    assert!(cache.get(&keys::permission(&context)).is_some());
    assert!(cache.get(&keys::user_roles("u1")).is_some());
    assert!(cache.get(&keys::user_role_permissions("u1")).is_some());
    assert_eq!(cache.len(), 3);
}

#[tokio::test]
async fn test_role_change_evicts_only_that_user() {
    let (service, cache, _) = service_with_shared_cache().await;

    for user in ["u1", "u10", "u2"] {
        service
            .assign_role(user, "user", AssignmentOptions::default())
            .await
            .unwrap();
        service
            .check_permission(&PermissionContext::new(user, PermissionAction::Read))
            .await
            .unwrap();
    }
    assert_eq!(cache.len(), 9);

    service.revoke_role("u1", "user").await.unwrap();

    assert_eq!(cache.len(), 6);
    assert!(cache.get(&keys::user_roles("u1")).is_none());
    assert!(cache.get(&keys::user_roles("u10")).is_some());
    assert!(cache.get(&keys::user_roles("u2")).is_some());
}

#[tokio::test]
async fn test_clear_user_cache_and_clear_cache() {
    let (service, cache, _) = service_with_shared_cache().await;

    for user in ["u1", "u2"] {
        service
            .assign_role(user, "user", AssignmentOptions::default())
            .await
            .unwrap();
        service.get_user_permissions(user).await.unwrap();
    }
    assert_eq!(cache.len(), 4);

    service.clear_user_cache("u1").await.unwrap();
    assert_eq!(cache.len(), 2);

    service.clear_cache().await.unwrap();
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_registry_upsert_clears_cache() {
    let (service, cache, _) = service_with_shared_cache().await;
    service
        .assign_role("u1", "user", AssignmentOptions::default())
        .await
        .unwrap();
    service.get_user_roles("u1").await.unwrap();
    assert!(!cache.is_empty());

    service
        .add_role(Role::new("auditor", "Auditor").with_permission("read-all"))
        .await
        .unwrap();
    assert!(cache.is_empty());
}

// ============================================================================
// TTL
// ============================================================================

#[tokio::test]
async fn test_decision_recomputed_after_ttl() {
    let (service, cache, clock) = service_with_shared_cache().await;
    service
        .assign_role("u1", "user", AssignmentOptions::default())
        .await
        .unwrap();

    let context = PermissionContext::new("u1", PermissionAction::Read);
    let first = service.check_permission(&context).await.unwrap();

    // Still live at exactly the TTL boundary
    clock.advance(Duration::seconds(30));
    let second = service.check_permission(&context).await.unwrap();
    assert_eq!(first.id, second.id);

    clock.advance(Duration::seconds(1));
    let third = service.check_permission(&context).await.unwrap();
    assert_ne!(first.id, third.id);
    assert!(cache.stats().expirations >= 1);
}

#[tokio::test]
async fn test_expiring_assignment_not_served_after_expiry() {
    let (service, _, clock) = service_with_shared_cache().await;
    service
        .add_role(Role::new("admin", "Admin").with_permission("admin-all"))
        .await
        .unwrap();
    service
        .assign_role("u1", "user", AssignmentOptions::default())
        .await
        .unwrap();
    service
        .assign_role(
            "u1",
            "admin",
            AssignmentOptions::expiring_at(clock.now() + Duration::seconds(5)),
        )
        .await
        .unwrap();

    let read = PermissionContext::new("u1", PermissionAction::Read);
    let delete = PermissionContext::new("u1", PermissionAction::Delete);
    assert!(service.has_permission(&delete).await.unwrap());
    let cached_read = service.check_permission(&read).await.unwrap();

    // Before the expiry the cached decisions are still served
    clock.advance(Duration::seconds(4));
    assert_eq!(service.check_permission(&read).await.unwrap().id, cached_read.id);

    // Well inside the 30s TTL, the lapsed admin role stops granting at once
    clock.advance(Duration::seconds(1));
    assert!(!service.has_permission(&delete).await.unwrap());
    let roles: Vec<_> = service
        .get_user_roles("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(roles, vec!["user"]);

    // The recomputed entries no longer carry an expiry bound
    let fresh_read = service.check_permission(&read).await.unwrap();
    assert!(fresh_read.granted);
    assert_ne!(fresh_read.id, cached_read.id);
    clock.advance(Duration::seconds(20));
    assert_eq!(service.check_permission(&read).await.unwrap().id, fresh_read.id);
}

// ============================================================================
// KEY ISOLATION
// ============================================================================

#[tokio::test]
async fn test_separator_in_user_id_does_not_share_decisions() {
    let (service, cache, _) = service_with_shared_cache().await;
    service
        .assign_role("a:read", "user", AssignmentOptions::default())
        .await
        .unwrap();

    let colon_user = PermissionContext::new("a:read", PermissionAction::Read);
    assert!(service.has_permission(&colon_user).await.unwrap());

    // "a" holds no roles; its typed request must not land on a:read's entry
    let plain_user =
        PermissionContext::new("a", PermissionAction::Read).with_resource_type("read:any");
    assert!(!service.has_permission(&plain_user).await.unwrap());

    // Evicting "a" leaves "a:read" cached
    let before = cache.len();
    service.clear_user_cache("a").await.unwrap();
    assert!(cache.get(&keys::permission(&colon_user)).is_some());
    assert_eq!(before - cache.len(), 3);
}

#[tokio::test]
async fn test_resource_named_any_is_not_the_unset_resource() {
    let (service, _, _) = service_with_shared_cache().await;
    service
        .add_permission(
            Permission::new("doc-read", "Read Documents", PermissionAction::Read)
                .with_resource_type("document"),
        )
        .await
        .unwrap();
    service
        .add_role(Role::new("reader", "Reader").with_permission("doc-read"))
        .await
        .unwrap();
    service
        .assign_role("u1", "reader", AssignmentOptions::default())
        .await
        .unwrap();

    let untyped = PermissionContext::new("u1", PermissionAction::Read);
    let named_any = untyped.clone().with_resource_type("any");

    assert!(service.has_permission(&untyped).await.unwrap());
    assert!(!service.has_permission(&named_any).await.unwrap());

    // Same answers in the opposite order
    service.clear_cache().await.unwrap();
    assert!(!service.has_permission(&named_any).await.unwrap());
    assert!(service.has_permission(&untyped).await.unwrap());
}

// ============================================================================
// DISABLED AND FAILING CACHES
// ============================================================================

#[tokio::test]
async fn test_disabled_cache_is_a_no_op() {
    let (service, _) = service_with_clock(false).await;
    service
        .assign_role("u1", "user", AssignmentOptions::default())
        .await
        .unwrap();

    let context = PermissionContext::new("u1", PermissionAction::Read);
    let first = service.check_permission(&context).await.unwrap();
    let second = service.check_permission(&context).await.unwrap();
    assert_ne!(first.id, second.id, "every check is evaluated afresh");

    service.clear_user_cache("u1").await.unwrap();
    service.clear_cache().await.unwrap();

    let metrics = service.metrics().unwrap();
    assert_eq!(metrics.cache_hits, 0);
    assert_eq!(metrics.cache_misses, 0);
}

#[tokio::test]
async fn test_injected_backend_ignored_when_disabled() {
    let service = AclService::builder()
        .config(AclConfig {
            cache_enabled: false,
            ..Default::default()
        })
        .cache_backend(Arc::new(UnavailableCache))
        .with_default_roles()
        .build()
        .await
        .unwrap();

    service
        .assign_role("u1", "user", AssignmentOptions::default())
        .await
        .unwrap();
    assert!(service
        .has_permission(&PermissionContext::new("u1", PermissionAction::Read))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_cache_failure_propagates() {
    let service = AclService::builder()
        .config(AclConfig::default())
        .cache_backend(Arc::new(UnavailableCache))
        .build()
        .await
        .unwrap();

    let err = service
        .check_permission(&PermissionContext::new("u1", PermissionAction::Read))
        .await
        .unwrap_err();
    assert!(matches!(err, AclError::Cache(_)));

    let err = service.add_role(Role::new("user", "User")).await.unwrap_err();
    assert!(matches!(err, AclError::Cache(_)));

    // The upsert itself happened before the cache failure
    assert!(service.get_role("user").await.unwrap().is_some());

    let metrics = service.metrics().unwrap();
    assert_eq!(metrics.error_count, 1);
    assert_eq!(metrics.total_checks, 0);
}
