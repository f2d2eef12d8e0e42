use alloy::network::Ethereum;
use alloy::providers::{Provider, ProviderBuilder};
use indexer_core::{IndexerError, ProviderEndpoint, Result};
use metrics::gauge;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Boxed provider trait for HTTP connections
pub type BoxedProvider = Arc<dyn Provider<Ethereum> + Send + Sync>;

/// A provider selected for use, carrying its name so callers can report
/// the outcome back to the manager.
#[derive(Clone)]
pub struct ActiveProvider {
    pub name: String,
    pub provider: BoxedProvider,
}

#[derive(Debug)]
struct EndpointState {
    healthy: bool,
    consecutive_failures: u32,
    last_failure: Option<Instant>,
    latency_ms: Option<u64>,
}

impl EndpointState {
    fn new() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            last_failure: None,
            latency_ms: None,
        }
    }
}

struct Endpoint {
    config: ProviderEndpoint,
    provider: BoxedProvider,
    state: RwLock<EndpointState>,
}

/// Serializable health view for the status surface
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub priority: u32,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub latency_ms: Option<u64>,
}

/// Owns the prioritized endpoint list and failover between entries.
///
/// Selection always prefers the highest-priority healthy endpoint, so
/// after a degraded primary recovers, traffic moves back to it. A
/// degraded endpoint is retried once its cooldown elapses.
pub struct ProviderManager {
    endpoints: Vec<Endpoint>,
    cooldown: Duration,
}

impl ProviderManager {
    pub fn new(configs: &[ProviderEndpoint], cooldown: Duration) -> Result<Self> {
        let mut endpoints = Vec::with_capacity(configs.len());
        let mut sorted: Vec<ProviderEndpoint> =
            configs.iter().filter(|e| e.enabled).cloned().collect();
        sorted.sort_by_key(|e| e.priority);

        for config in sorted {
            let url: reqwest::Url = config
                .http_url
                .parse()
                .map_err(|e| IndexerError::Provider(format!("Invalid HTTP URL: {}", e)))?;
            let provider = ProviderBuilder::new().connect_http(url);

            endpoints.push(Endpoint {
                config,
                provider: Arc::new(provider),
                state: RwLock::new(EndpointState::new()),
            });
        }

        if endpoints.is_empty() {
            return Err(IndexerError::Config(
                "no enabled provider endpoints".to_string(),
            ));
        }

        Ok(Self { endpoints, cooldown })
    }

    /// Highest-priority endpoint that is healthy or due for a retry probe
    pub fn current(&self) -> Result<ActiveProvider> {
        for endpoint in &self.endpoints {
            let state = endpoint.state.read();
            let usable = state.healthy
                || state
                    .last_failure
                    .map(|at| at.elapsed() >= self.cooldown)
                    .unwrap_or(true);
            if usable {
                return Ok(ActiveProvider {
                    name: endpoint.config.name.clone(),
                    provider: endpoint.provider.clone(),
                });
            }
        }
        Err(IndexerError::NoProviderAvailable)
    }

    pub fn report_success(&self, name: &str) {
        if let Some(endpoint) = self.find(name) {
            let mut state = endpoint.state.write();
            if !state.healthy {
                info!(provider = name, "Provider recovered");
            }
            state.healthy = true;
            state.consecutive_failures = 0;
            gauge!("indexer_provider_healthy", "provider" => endpoint.config.name.clone())
                .set(1.0);
        }
    }

    pub fn report_failure(&self, name: &str) {
        if let Some(endpoint) = self.find(name) {
            let mut state = endpoint.state.write();
            state.consecutive_failures += 1;
            state.last_failure = Some(Instant::now());
            if state.healthy {
                warn!(
                    provider = name,
                    failures = state.consecutive_failures,
                    "Provider marked unhealthy"
                );
            }
            state.healthy = false;
            gauge!("indexer_provider_healthy", "provider" => endpoint.config.name.clone())
                .set(0.0);
        }
    }

    /// WebSocket URL of the best endpoint that has one configured
    pub fn push_url(&self) -> Option<String> {
        self.endpoints
            .iter()
            .find_map(|e| e.config.ws_url.clone())
    }

    pub fn health(&self) -> Vec<ProviderHealth> {
        self.endpoints
            .iter()
            .map(|endpoint| {
                let state = endpoint.state.read();
                ProviderHealth {
                    name: endpoint.config.name.clone(),
                    priority: endpoint.config.priority,
                    healthy: state.healthy,
                    consecutive_failures: state.consecutive_failures,
                    latency_ms: state.latency_ms,
                }
            })
            .collect()
    }

    /// Periodic health probes against every endpoint. Runs until the
    /// shutdown flag is set.
    pub async fn run_health_checks(
        self: Arc<Self>,
        interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                info!("Health check loop stopping");
                return;
            }
            self.probe_all().await;
        }
    }

    async fn probe_all(&self) {
        for endpoint in &self.endpoints {
            let started = Instant::now();
            let result = tokio::time::timeout(
                Duration::from_secs(5),
                endpoint.provider.get_block_number(),
            )
            .await;

            match result {
                Ok(Ok(block)) => {
                    let latency = started.elapsed().as_millis() as u64;
                    {
                        let mut state = endpoint.state.write();
                        state.latency_ms = Some(latency);
                    }
                    self.report_success(&endpoint.config.name);
                    debug!(
                        provider = %endpoint.config.name,
                        block = block,
                        latency_ms = latency,
                        "Health check passed"
                    );
                }
                Ok(Err(e)) => {
                    warn!(provider = %endpoint.config.name, error = %e, "Health check failed");
                    self.report_failure(&endpoint.config.name);
                }
                Err(_) => {
                    warn!(provider = %endpoint.config.name, "Health check timed out");
                    self.report_failure(&endpoint.config.name);
                }
            }
        }
    }

    fn find(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.config.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(name: &str, priority: u32) -> ProviderEndpoint {
        ProviderEndpoint {
            name: name.to_string(),
            http_url: format!("http://localhost:1{}", priority),
            ws_url: None,
            priority,
            enabled: true,
        }
    }

    fn manager(cooldown: Duration) -> ProviderManager {
        ProviderManager::new(
            &[endpoint("secondary", 1), endpoint("primary", 0)],
            cooldown,
        )
        .unwrap()
    }

    #[test]
    fn prefers_highest_priority_endpoint() {
        let manager = manager(Duration::from_secs(60));
        assert_eq!(manager.current().unwrap().name, "primary");
    }

    #[test]
    fn fails_over_after_failure_and_returns_on_recovery() {
        let manager = manager(Duration::from_secs(60));

        manager.report_failure("primary");
        assert_eq!(manager.current().unwrap().name, "secondary");

        manager.report_success("primary");
        assert_eq!(manager.current().unwrap().name, "primary");
    }

    #[test]
    fn retries_degraded_endpoint_after_cooldown() {
        let manager = manager(Duration::from_secs(0));

        manager.report_failure("primary");
        // Cooldown of zero means the primary is immediately due a probe.
        assert_eq!(manager.current().unwrap().name, "primary");
    }

    #[test]
    fn all_endpoints_down_is_an_error() {
        let manager = manager(Duration::from_secs(60));

        manager.report_failure("primary");
        manager.report_failure("secondary");
        assert!(matches!(
            manager.current(),
            Err(IndexerError::NoProviderAvailable)
        ));
    }

    #[test]
    fn health_reports_every_endpoint() {
        let manager = manager(Duration::from_secs(60));
        manager.report_failure("secondary");

        let health = manager.health();
        assert_eq!(health.len(), 2);
        assert!(health.iter().find(|h| h.name == "primary").unwrap().healthy);
        assert!(!health.iter().find(|h| h.name == "secondary").unwrap().healthy);
    }
}
