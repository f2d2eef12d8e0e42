pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::{DeploymentConfig, IndexerConfig, ProviderEndpoint, SyncConfig};
pub use error::{IndexerError, Result};
