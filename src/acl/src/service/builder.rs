//! Service construction

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{AclService, CachedValue};
use crate::assignment::{AssignmentManager, AssignmentStore, InMemoryAssignmentStore};
use crate::cache::{CacheBackend, ResultCache};
use crate::clock::{Clock, SystemClock};
use crate::config::AclConfig;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::metrics::MetricsCollector;
use crate::registry::{InMemoryRegistry, RegistryStore};

/// Builder for [`AclService`]
///
/// Every collaborator defaults to its in-memory implementation; inject a
/// store, cache backend or clock to replace one.
pub struct AclServiceBuilder {
    config: AclConfig,
    registry: Option<Arc<dyn RegistryStore>>,
    assignment_store: Option<Arc<dyn AssignmentStore>>,
    cache: Option<Arc<dyn CacheBackend<CachedValue>>>,
    clock: Option<Arc<dyn Clock>>,
    evaluator: Option<Evaluator>,
    seed_defaults: bool,
}

impl AclServiceBuilder {
    pub fn new() -> Self {
        Self {
            config: AclConfig::default(),
            registry: None,
            assignment_store: None,
            cache: None,
            clock: None,
            evaluator: None,
            seed_defaults: false,
        }
    }

    pub fn config(mut self, config: AclConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: Arc<dyn RegistryStore>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn assignment_store(mut self, store: Arc<dyn AssignmentStore>) -> Self {
        self.assignment_store = Some(store);
        self
    }

    /// Replace the in-memory result cache; ignored when caching is disabled
    pub fn cache_backend(mut self, cache: Arc<dyn CacheBackend<CachedValue>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Register the built-in `admin` and `user` roles on build
    pub fn with_default_roles(mut self) -> Self {
        self.seed_defaults = true;
        self
    }

    pub async fn build(self) -> Result<AclService> {
        let config = self.config;
        config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(InMemoryRegistry::new()));
        let assignment_store = self
            .assignment_store
            .unwrap_or_else(|| Arc::new(InMemoryAssignmentStore::new()));

        let cache = if config.cache_enabled {
            Some(self.cache.unwrap_or_else(|| {
                Arc::new(ResultCache::<CachedValue>::new(
                    config.cache_ttl_chrono(),
                    clock.clone(),
                ))
            }))
        } else {
            None
        };

        let metrics = if config.metrics_enabled {
            Some(Arc::new(MetricsCollector::new()?))
        } else {
            None
        };

        if config.strict_mode {
            warn!("strict_mode is reserved and currently has no effect");
        }

        info!(
            "AclService initialized with cache={}, ttl={}s, metrics={}, debug={}",
            config.cache_enabled, config.cache_ttl_secs, config.metrics_enabled, config.debug_mode
        );

        let service = AclService {
            assignments: AssignmentManager::new(assignment_store, registry.clone(), clock.clone()),
            registry,
            evaluator: self.evaluator.unwrap_or_default(),
            cache,
            metrics,
            clock,
            gate: RwLock::new(()),
            config,
        };

        if self.seed_defaults {
            service.seed_defaults().await?;
        }

        Ok(service)
    }
}

impl Default for AclServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
