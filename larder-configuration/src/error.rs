use thiserror::Error;

/// Failure loading a configuration or building what it describes.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The YAML document could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_saphyr::Error),

    /// The configured store is not compiled in or failed to open.
    #[error("store not available: {0}")]
    StoreNotAvailable(String),

    /// Neither a policy for the type nor a default policy is configured.
    #[error("no policy configured for type `{0}`")]
    MissingPolicy(String),
}
