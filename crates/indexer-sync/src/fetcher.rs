use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, Log};
use chrono::Utc;
use futures::StreamExt;
use indexer_core::types::EventKind;
use indexer_core::{IndexerConfig, IndexerError, Result};
use indexer_db::models::DbRawEvent;
use indexer_db::repositories::{EventStoreRepository, SyncStatusRepository, UpsertOutcome};
use indexer_db::DatabasePool;
use metrics::counter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::provider::{ActiveProvider, ProviderManager};
use crate::throttle::Throttle;

/// Result of one poll pass
#[derive(Debug, Clone, Copy, Default)]
pub struct PollOutcome {
    pub from_block: u64,
    pub to_block: u64,
    pub stored: usize,
}

/// Pulls registry logs off the ledger and lands them in the event store.
///
/// Poll mode advances a block cursor in bounded windows; push mode holds
/// a log subscription open. Either way every stored batch commits before
/// the cursor moves, so a crash re-fetches rather than skips.
pub struct EventFetcher {
    config: IndexerConfig,
    provider: Arc<ProviderManager>,
    db: Arc<DatabasePool>,
    throttle: Throttle,
}

impl EventFetcher {
    pub fn new(
        config: IndexerConfig,
        provider: Arc<ProviderManager>,
        db: Arc<DatabasePool>,
    ) -> Self {
        let throttle = Throttle::new(config.tier);
        Self {
            config,
            provider,
            db,
            throttle,
        }
    }

    /// Current head block, via the active provider
    pub async fn head(&self) -> Result<u64> {
        self.throttle.pace().await;
        let active = self.provider.current()?;
        match active.provider.get_block_number().await {
            Ok(block) => {
                self.provider.report_success(&active.name);
                Ok(block)
            }
            Err(e) => {
                self.provider.report_failure(&active.name);
                Err(IndexerError::Provider(format!("{:?}", e)))
            }
        }
    }

    /// One poll pass: fetch the next block window, store its logs, then
    /// advance the cursor and refresh confirmation depths.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        let head = self.head().await?;

        let last_synced = SyncStatusRepository::last_synced_block(self.db.inner())
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?
            .unwrap_or(self.config.start_block.saturating_sub(1));

        if last_synced >= head {
            self.refresh_confirmations(head).await?;
            return Ok(PollOutcome::default());
        }

        let from = last_synced + 1;
        let to = head.min(from + self.config.sync.max_fetch_blocks - 1);

        let logs = self.fetch_range_with_retry(from, to).await?;
        let stored = self.store_logs(&logs, head).await?;

        // Cursor moves only after the whole window is stored.
        SyncStatusRepository::set_last_synced_block(self.db.inner(), to)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        self.refresh_confirmations(head).await?;

        if stored > 0 {
            info!(from = from, to = to, stored = stored, "Stored new events");
        } else {
            trace!(from = from, to = to, "No new events in window");
        }

        Ok(PollOutcome {
            from_block: from,
            to_block: to,
            stored,
        })
    }

    /// Fetch registry logs for a block range from the active provider
    pub async fn fetch_range(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        self.throttle.pace().await;
        let active = self.provider.current()?;
        let filter = self.registry_filter().from_block(from_block).to_block(to_block);

        self.get_logs(&active, &filter).await
    }

    /// Fetch logs for a caller-built filter via the active provider
    pub async fn get_logs_filtered(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.throttle.pace().await;
        let active = self.provider.current()?;
        self.get_logs(&active, filter).await
    }

    /// Same as fetch_range with bounded retry on transient errors
    pub async fn fetch_range_with_retry(&self, from_block: u64, to_block: u64) -> Result<Vec<Log>> {
        let max_attempts = self.config.sync.retry_attempts;
        let mut delay = Duration::from_millis(self.config.sync.retry_delay_ms);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.fetch_range(from_block, to_block).await {
                Ok(logs) => {
                    if attempts > 1 {
                        info!(from = from_block, to = to_block, attempts = attempts, "Fetch succeeded after retry");
                    }
                    return Ok(logs);
                }
                Err(e) if e.is_transient() && attempts < max_attempts => {
                    warn!(
                        from = from_block,
                        to = to_block,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying with backoff"
                    );
                    tokio::time::sleep(delay).await;
                    delay = crate::throttle::next_backoff(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Store a batch of logs. Duplicate keys are counted but not errors.
    pub async fn store_logs(&self, logs: &[Log], head: u64) -> Result<usize> {
        let mut stored = 0usize;

        for log in logs {
            let Some(event) = self.raw_event_from_log(log, head) else {
                continue;
            };

            let outcome = EventStoreRepository::upsert(self.db.inner(), &event)
                .await
                .map_err(|e| IndexerError::Storage(e.to_string()))?;

            match outcome {
                UpsertOutcome::Inserted => {
                    counter!("indexer_events_stored").increment(1);
                    stored += 1;
                }
                UpsertOutcome::Duplicate => {
                    counter!("indexer_events_duplicate").increment(1);
                    trace!(
                        tx_hash = %event.tx_hash,
                        log_index = event.log_index,
                        "Duplicate event, confirmation tracking refreshed"
                    );
                }
            }
        }

        Ok(stored)
    }

    /// Hold a push subscription open and land logs as they arrive.
    /// Returns an error on disconnect; the engine falls back to polling.
    pub async fn run_push(&self, shutdown: Arc<AtomicBool>) -> Result<()> {
        let ws_url = self
            .provider
            .push_url()
            .ok_or_else(|| IndexerError::Subscription("no WS_URLS configured".to_string()))?;

        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(ws_url.clone()))
            .await
            .map_err(|e| IndexerError::Subscription(format!("{:?}", e)))?;

        let filter = self.registry_filter();
        let subscription = provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| IndexerError::Subscription(format!("{:?}", e)))?;

        info!(url = %ws_url, "Push subscription established");
        let mut stream = subscription.into_stream();

        while let Some(log) = stream.next().await {
            if shutdown.load(Ordering::Relaxed) {
                info!("Push subscription stopping");
                return Ok(());
            }
            // Depth starts at zero; the poll-side refresh catches it up.
            self.store_logs(std::slice::from_ref(&log), log.block_number.unwrap_or(0))
                .await?;

            if let Some(block) = log.block_number {
                let last_synced = SyncStatusRepository::last_synced_block(self.db.inner())
                    .await
                    .map_err(|e| IndexerError::Storage(e.to_string()))?
                    .unwrap_or(self.config.start_block.saturating_sub(1));

                if let Some(next) = Self::push_cursor_advance(last_synced, block) {
                    SyncStatusRepository::set_last_synced_block(self.db.inner(), next)
                        .await
                        .map_err(|e| IndexerError::Storage(e.to_string()))?;
                }
            }
        }

        Err(IndexerError::Subscription(
            "push stream ended".to_string(),
        ))
    }

    async fn refresh_confirmations(&self, head: u64) -> Result<()> {
        EventStoreRepository::refresh_confirmations(
            self.db.inner(),
            self.config.chain_id as i64,
            head as i64,
            self.config.finality_depth as i64,
        )
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        SyncStatusRepository::set_finalized_block(
            self.db.inner(),
            head.saturating_sub(self.config.finality_depth),
        )
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn registry_filter(&self) -> Filter {
        Filter::new()
            .address(self.config.registry_address)
            .event_signature(EventKind::all_signature_hashes())
    }

    /// Push-mode cursor rule: advance only onto the next contiguous block.
    /// A pushed log past a gap is still stored, but the cursor stays put so
    /// the next poll catch-up re-requests everything from last_synced + 1.
    fn push_cursor_advance(last_synced: u64, block: u64) -> Option<u64> {
        (block == last_synced + 1).then_some(block)
    }

    async fn get_logs(&self, active: &ActiveProvider, filter: &Filter) -> Result<Vec<Log>> {
        match active.provider.get_logs(filter).await {
            Ok(logs) => {
                self.provider.report_success(&active.name);
                debug!(provider = %active.name, count = logs.len(), "Fetched logs");
                Ok(logs)
            }
            Err(e) => {
                self.provider.report_failure(&active.name);
                Err(IndexerError::Provider(format!("{:?}", e)))
            }
        }
    }

    /// Map an rpc log onto the raw_events row shape. Logs without a
    /// recognized topic0 or a transaction hash are dropped with a warning.
    fn raw_event_from_log(&self, log: &Log, head: u64) -> Option<DbRawEvent> {
        let topic0 = log.topics().first().copied()?;
        let Some(kind) = EventKind::from_topic0(&topic0) else {
            warn!(topic0 = ?topic0, "Log with unknown signature, dropping");
            return None;
        };
        let Some(tx_hash) = log.transaction_hash else {
            warn!(event = %kind, "Log without transaction hash, dropping");
            return None;
        };

        let block_number = log.block_number.unwrap_or(0) as i64;
        let depth = (head as i64 - block_number).max(0);

        Some(DbRawEvent {
            chain_id: self.config.chain_id as i64,
            tx_hash: format!("{:?}", tx_hash),
            log_index: log.log_index.unwrap_or(0) as i64,
            event_name: kind.as_str().to_string(),
            contract_address: format!("{:?}", log.inner.address),
            block_number,
            block_hash: log.block_hash.map(|h| format!("{:?}", h)),
            topics: sqlx::types::Json(
                log.topics().iter().map(|t| format!("{:?}", t)).collect(),
            ),
            data: format!("0x{}", hex::encode(&log.inner.data.data)),
            is_finalized: depth >= self.config.finality_depth as i64,
            confirmation_depth: depth,
            processed: false,
            processed_at: None,
            projection_applied: false,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256, U256};
    use alloy_sol_types::SolEvent;
    use indexer_core::events::OrganizationRegistered;
    use indexer_core::types::{RateTier, SyncMode};
    use indexer_core::{ProviderEndpoint, SyncConfig};

    fn test_config() -> IndexerConfig {
        IndexerConfig {
            chain_id: 11155111,
            registry_address: Address::repeat_byte(0x42),
            start_block: 100,
            providers: vec![ProviderEndpoint {
                name: "rpc-0".to_string(),
                http_url: "http://localhost:8545".to_string(),
                ws_url: None,
                priority: 0,
                enabled: true,
            }],
            sync_mode: SyncMode::Poll,
            tier: RateTier::Fast,
            sync: SyncConfig {
                retry_attempts: 3,
                retry_delay_ms: 10,
                max_fetch_blocks: 2000,
            },
            finality_depth: 12,
            health_check_interval_secs: 30,
            provider_cooldown_secs: 60,
            pending_tx_timeout_secs: 600,
        }
    }

    fn fetcher() -> EventFetcher {
        let config = test_config();
        let provider = Arc::new(
            ProviderManager::new(&config.providers, Duration::from_secs(60)).unwrap(),
        );
        // The pool is never used by the conversion tests.
        let db = Arc::new(DatabasePool::lazy("postgres://localhost/unused").unwrap());
        EventFetcher::new(config, provider, db)
    }

    fn registered_log(block: u64, log_index: u64) -> Log {
        let event = OrganizationRegistered {
            orgId: U256::from(7u64),
            admin: Address::repeat_byte(0xab),
            name: "Example University".to_string(),
        };
        let inner = alloy::primitives::Log {
            address: Address::repeat_byte(0x42),
            data: event.encode_log_data(),
        };
        Log {
            inner,
            block_hash: Some(B256::repeat_byte(0xbb)),
            block_number: Some(block),
            block_timestamp: None,
            transaction_hash: Some(B256::repeat_byte(0x11)),
            transaction_index: Some(0),
            log_index: Some(log_index),
            removed: false,
        }
    }

    #[tokio::test]
    async fn converts_log_to_raw_event_row() {
        let fetcher = fetcher();
        let raw = fetcher
            .raw_event_from_log(&registered_log(150, 3), 160)
            .unwrap();

        assert_eq!(raw.chain_id, 11155111);
        assert_eq!(raw.event_name, "OrganizationRegistered");
        assert_eq!(raw.block_number, 150);
        assert_eq!(raw.log_index, 3);
        assert_eq!(raw.confirmation_depth, 10);
        assert!(!raw.is_finalized);
        assert!(raw.data.starts_with("0x"));
        assert_eq!(raw.topics.0.len(), 3);
    }

    #[tokio::test]
    async fn deep_enough_log_is_finalized_on_ingest() {
        let fetcher = fetcher();
        let raw = fetcher
            .raw_event_from_log(&registered_log(100, 0), 160)
            .unwrap();

        assert_eq!(raw.confirmation_depth, 60);
        assert!(raw.is_finalized);
    }

    #[tokio::test]
    async fn unknown_signature_is_dropped() {
        let fetcher = fetcher();
        let mut log = registered_log(150, 0);
        log.inner.data = alloy::primitives::LogData::new_unchecked(
            vec![B256::repeat_byte(0x99)],
            Default::default(),
        );

        assert!(fetcher.raw_event_from_log(&log, 160).is_none());
    }

    #[tokio::test]
    async fn missing_transaction_hash_is_dropped() {
        let fetcher = fetcher();
        let mut log = registered_log(150, 0);
        log.transaction_hash = None;

        assert!(fetcher.raw_event_from_log(&log, 160).is_none());
    }

    #[test]
    fn push_cursor_never_jumps_over_unfetched_blocks() {
        // A pushed log past a gap must not advance the cursor, otherwise
        // the fallback poll would start after the missed window.
        assert_eq!(EventFetcher::push_cursor_advance(100, 150), None);
        assert_eq!(EventFetcher::push_cursor_advance(100, 101), Some(101));
        // Re-delivery of an already-synced block leaves the cursor alone.
        assert_eq!(EventFetcher::push_cursor_advance(100, 100), None);
        assert_eq!(EventFetcher::push_cursor_advance(100, 90), None);
    }

    #[tokio::test]
    async fn registry_filter_covers_every_event_kind() {
        let fetcher = fetcher();
        let filter = fetcher.registry_filter();
        for kind in EventKind::ALL {
            assert!(filter.topics[0].matches(&kind.signature_hash()));
        }
    }
}
