//! YAML configuration for the larder object cache.
//!
//! ```yaml
//! store:
//!   type: FeOxDb
//!   path: /var/cache/app
//!   max_memory: 64 MiB
//! purge_on_no_cache: false
//! policies:
//!   profile: { type: CacheThenRefresh, max_age: 60s }
//!   feed: { type: ValidCacheOnly, max_age: 5m }
//!   avatar: { type: Forever }
//!   session: { type: NoCache }
//! default_policy: { type: ValidCacheOnly, max_age: 30s }
//! ```
//!
//! Policies are looked up by the codec's
//! [`type_name`](larder_core::ObjectCodec::type_name).

mod error;
mod store;

pub use error::ConfigError;
pub use store::{FeOxDb, StoreConfig};

use std::sync::Arc;

use indexmap::IndexMap;
use larder::{CacheOrchestrator, OrchestratorConfig};
use larder_core::{CachePolicy, ObjectCodec};
use larder_store::PersistentStore;
use serde::{Deserialize, Serialize};

/// Orchestrator backed by whichever store the configuration selects.
pub type ConfiguredOrchestrator = CacheOrchestrator<Arc<dyn PersistentStore>>;

/// Top-level cache configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Store backing the cache.
    #[serde(default)]
    pub store: StoreConfig,
    /// Delete leftover entries of `NoCache` types after a fetch.
    #[serde(default)]
    pub purge_on_no_cache: bool,
    /// Policies by type name.
    #[serde(default)]
    pub policies: IndexMap<String, CachePolicy>,
    /// Policy of types not listed in `policies`.
    #[serde(default)]
    pub default_policy: Option<CachePolicy>,
}

impl CacheConfig {
    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_saphyr::from_str(yaml)?)
    }

    /// Returns the policy of `type_name`, falling back to the default policy.
    pub fn policy_for(&self, type_name: &str) -> Option<CachePolicy> {
        self.policies
            .get(type_name)
            .copied()
            .or(self.default_policy)
    }

    /// Returns the orchestrator settings.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::new().purge_on_no_cache(self.purge_on_no_cache)
    }

    /// Opens the configured store.
    pub fn into_store(self) -> Result<Arc<dyn PersistentStore>, ConfigError> {
        self.store.into_store()
    }

    /// Opens the store and builds an orchestrator on top of it.
    pub fn build(&self) -> Result<ConfiguredOrchestrator, ConfigError> {
        let store = self.store.clone().into_store()?;
        Ok(CacheOrchestrator::with_config(store, self.orchestrator_config()))
    }

    /// Registers `codec` with the policy configured for its type name.
    pub fn register<C: ObjectCodec>(
        &self,
        orchestrator: &ConfiguredOrchestrator,
        codec: C,
    ) -> Result<(), ConfigError> {
        let policy = self
            .policy_for(codec.type_name())
            .ok_or_else(|| ConfigError::MissingPolicy(codec.type_name().to_string()))?;
        orchestrator.register(codec, policy);
        Ok(())
    }
}
