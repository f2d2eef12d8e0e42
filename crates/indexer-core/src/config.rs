use crate::error::{IndexerError, Result};
use crate::types::{RateTier, SyncMode};
use alloy_primitives::Address;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Deployment configuration loaded from JSON file
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentConfig {
    #[serde(rename = "registryAddress")]
    pub registry_address: Address,
    #[serde(rename = "startBlock")]
    pub start_block: u64,
}

/// A single remote ledger-read endpoint. Priority 0 is tried first.
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub name: String,
    pub http_url: String,
    pub ws_url: Option<String>,
    pub priority: u32,
    pub enabled: bool,
}

/// Sync-related configuration (retry/backoff and fetch windowing)
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Maximum block span requested in a single getLogs call
    pub max_fetch_blocks: u64,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let retry_attempts = env::var("SYNC_RETRY_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        let retry_delay_ms = env::var("SYNC_RETRY_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);

        let max_fetch_blocks = parse_max_fetch_blocks(env::var("SYNC_MAX_FETCH_BLOCKS").ok());

        Self {
            retry_attempts,
            retry_delay_ms,
            max_fetch_blocks,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Complete indexer configuration
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub chain_id: u64,
    pub registry_address: Address,
    pub start_block: u64,
    /// Prioritized read endpoints; the ProviderManager owns failover between them
    pub providers: Vec<ProviderEndpoint>,
    pub sync_mode: SyncMode,
    pub tier: RateTier,
    pub sync: SyncConfig,
    /// Blocks behind head after which an event is considered final
    pub finality_depth: u64,
    /// Provider health check interval
    pub health_check_interval_secs: u64,
    /// Cool-down before a degraded provider is retried
    pub provider_cooldown_secs: u64,
    /// Pending transactions unconfirmed past this are reported as timed out
    pub pending_tx_timeout_secs: u64,
}

impl IndexerConfig {
    /// Load complete configuration from environment and deployment file
    pub fn load() -> Result<Self> {
        let chain_id = env::var("CHAIN_ID")
            .map_err(|_| IndexerError::MissingEnvVar("CHAIN_ID".to_string()))?
            .parse::<u64>()
            .map_err(|_| IndexerError::Config("CHAIN_ID must be an integer".to_string()))?;

        let deployment = DeploymentConfig::load(chain_id)?;
        let providers = Self::providers_from_env()?;

        let sync_mode = match env::var("SYNC_MODE").as_deref() {
            Ok("push") => SyncMode::Push,
            _ => SyncMode::Poll,
        };

        let tier = match env::var("RATE_TIER").as_deref() {
            Ok("fast") => RateTier::Fast,
            _ => RateTier::Conservative,
        };

        let finality_depth = env::var("FINALITY_DEPTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(12);

        let health_check_interval_secs = env::var("HEALTH_CHECK_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let provider_cooldown_secs = env::var("PROVIDER_COOLDOWN_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let pending_tx_timeout_secs = env::var("PENDING_TX_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(600);

        Ok(Self {
            chain_id,
            registry_address: deployment.registry_address,
            start_block: deployment.start_block,
            providers,
            sync_mode,
            tier,
            sync: SyncConfig::default(),
            finality_depth,
            health_check_interval_secs,
            provider_cooldown_secs,
            pending_tx_timeout_secs,
        })
    }

    /// Parse the prioritized endpoint list from RPC_URLS / WS_URLS.
    /// Position in the comma-separated list defines priority.
    fn providers_from_env() -> Result<Vec<ProviderEndpoint>> {
        let raw = env::var("RPC_URLS")
            .or_else(|_| env::var("RPC_URL"))
            .map_err(|_| IndexerError::MissingEnvVar("RPC_URLS".to_string()))?;

        let ws_urls: Vec<String> = env::var("WS_URLS")
            .or_else(|_| env::var("WS_URL"))
            .map(|v| v.split(',').map(|s| sanitize_url(s).to_string()).collect())
            .unwrap_or_default();

        let providers: Vec<ProviderEndpoint> = raw
            .split(',')
            .map(sanitize_url)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, http_url)| ProviderEndpoint {
                name: format!("rpc-{}", i),
                http_url: http_url.to_string(),
                ws_url: ws_urls.get(i).cloned().filter(|s| !s.is_empty()),
                priority: i as u32,
                enabled: true,
            })
            .collect();

        if providers.is_empty() {
            return Err(IndexerError::Config(
                "RPC_URLS must name at least one endpoint".to_string(),
            ));
        }

        Ok(providers)
    }
}

impl DeploymentConfig {
    /// Load deployment configuration from JSON file
    pub fn load(chain_id: u64) -> Result<Self> {
        let path = Self::deployment_path(chain_id);
        let content = fs::read_to_string(&path)
            .map_err(|_| IndexerError::DeploymentFileNotFound(path.display().to_string()))?;

        serde_json::from_str(&content).map_err(|e| IndexerError::DeploymentParseError(e.to_string()))
    }

    fn deployment_path(chain_id: u64) -> PathBuf {
        PathBuf::from(format!("deployments/{}.json", chain_id))
    }
}

/// Fetch windows must span at least one block; zero would make the
/// window arithmetic meaningless.
fn parse_max_fetch_blocks(raw: Option<String>) -> u64 {
    raw.and_then(|s| s.parse().ok()).unwrap_or(2000).max(1)
}

/// Sanitize URL by removing surrounding quotes and whitespace
fn sanitize_url(url: &str) -> &str {
    let trimmed = url.trim();
    if (trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2)
        || (trimmed.starts_with('\'') && trimmed.ends_with('\'') && trimmed.len() >= 2)
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_quotes_and_whitespace() {
        assert_eq!(sanitize_url("  \"http://a\"  "), "http://a");
        assert_eq!(sanitize_url("'ws://b'"), "ws://b");
        assert_eq!(sanitize_url("http://plain"), "http://plain");
    }

    #[test]
    fn fetch_window_is_never_zero() {
        assert_eq!(parse_max_fetch_blocks(Some("0".to_string())), 1);
        assert_eq!(parse_max_fetch_blocks(Some("500".to_string())), 500);
        assert_eq!(parse_max_fetch_blocks(Some("junk".to_string())), 2000);
        assert_eq!(parse_max_fetch_blocks(None), 2000);
    }

    #[test]
    fn deployment_parses_registry_and_start_block() {
        let json = r#"{"registryAddress": "0x00000000000000000000000000000000000000aa", "startBlock": 1234}"#;
        let config: DeploymentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.start_block, 1234);
        assert_eq!(
            format!("{:?}", config.registry_address),
            "0x00000000000000000000000000000000000000aa"
        );
    }
}
