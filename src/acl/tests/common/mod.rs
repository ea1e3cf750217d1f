//! Shared helpers for integration tests

#![allow(dead_code)]

use acl_engine::{AclConfig, AclService, ManualClock, Permission, PermissionAction, Role};
use chrono::Utc;
use std::sync::Arc;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn read_all() -> Permission {
    Permission::new("read-all", "Read All", PermissionAction::Read)
}

pub fn admin_all() -> Permission {
    Permission::new("admin-all", "Admin All", PermissionAction::All)
}

/// Service with `read-all`/`admin-all` and `user`/`admin` registered explicitly
pub async fn service_with_clock(cache_enabled: bool) -> (AclService, Arc<ManualClock>) {
    init_tracing();

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = AclService::builder()
        .config(AclConfig {
            cache_enabled,
            cache_ttl_secs: 60,
            ..Default::default()
        })
        .clock(clock.clone())
        .build()
        .await
        .expect("service builds");

    service.add_permission(read_all()).await.unwrap();
    service.add_permission(admin_all()).await.unwrap();
    service
        .add_role(Role::new("user", "User").with_permission("read-all"))
        .await
        .unwrap();
    service
        .add_role(Role::new("admin", "Admin").with_permission("admin-all"))
        .await
        .unwrap();

    (service, clock)
}
