use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Deployment file not found: {0}")]
    DeploymentFileNotFound(String),

    #[error("Failed to parse deployment file: {0}")]
    DeploymentParseError(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("No healthy provider available")]
    NoProviderAvailable,

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Malformed event payload: {0}")]
    MalformedEvent(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IndexerError {
    /// Transient errors are retried with backoff and trigger provider failover.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IndexerError::Provider(_)
                | IndexerError::NoProviderAvailable
                | IndexerError::Subscription(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, IndexerError>;
