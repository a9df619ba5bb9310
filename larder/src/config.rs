/// Behaviour switches of a [`CacheOrchestrator`](crate::CacheOrchestrator).
///
/// ```
/// use larder::OrchestratorConfig;
///
/// let config = OrchestratorConfig::new().purge_on_no_cache(true);
/// assert!(config.purges_on_no_cache());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorConfig {
    purge_on_no_cache: bool,
}

impl OrchestratorConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete a leftover entry after a successful fetch of a `NoCache` type.
    ///
    /// Off by default: `NoCache` types leave the store untouched.
    pub fn purge_on_no_cache(mut self, purge: bool) -> Self {
        self.purge_on_no_cache = purge;
        self
    }

    /// Returns whether leftover `NoCache` entries are purged.
    pub fn purges_on_no_cache(&self) -> bool {
        self.purge_on_no_cache
    }
}
