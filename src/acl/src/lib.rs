//! # ACL Engine
//!
//! Role-based permission evaluation with time-bounded role assignments and a
//! TTL result cache with per-user invalidation.
//!
//! ## Features
//!
//! - **Role/permission registry** with insert-or-replace semantics
//! - **Time-bounded assignments** with lazy expiry and an opt-in purge
//! - **Prioritized evaluation**: exact match → wildcard match → deny
//! - **Result caching** with prefix-scoped eviction on role changes
//! - **Injected collaborators**: stores, cache backend and clock are traits
//!
//! ## Example
//!
//! ```rust
//! use acl_engine::{AclService, AclConfig, AssignmentOptions, PermissionAction, PermissionContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = AclService::builder()
//!         .config(AclConfig::default())
//!         .with_default_roles()
//!         .build()
//!         .await?;
//!
//!     service.assign_role("alice", "user", AssignmentOptions::default()).await?;
//!
//!     let context = PermissionContext::new("alice", PermissionAction::Read);
//!     if service.has_permission(&context).await? {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod assignment;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod registry;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use assignment::{ActiveRoles, AssignmentManager, AssignmentStore, InMemoryAssignmentStore};
pub use cache::{CacheBackend, CacheStats, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AclConfig;
pub use error::{AclError, ErrorKind, Result};
pub use evaluator::{Evaluator, MatchRule};
pub use metrics::{MetricsCollector, ServiceMetrics};
pub use registry::{InMemoryRegistry, RegistryStore};
pub use service::{AclService, AclServiceBuilder, CachedData, CachedValue};
pub use types::{
    Assignment, AssignmentOptions, MatchKind, Permission, PermissionAction,
    PermissionCheckResult, PermissionContext, PermissionId, Role, RoleId, UserId,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
