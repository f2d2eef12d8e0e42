use alloy::primitives::U256;
use alloy::rpc::types::Filter;
use dashmap::DashMap;
use indexer_core::types::EventKind;
use indexer_core::{IndexerConfig, IndexerError, Result};
use indexer_db::repositories::SyncStatusRepository;
use indexer_db::DatabasePool;
use indexer_processor::Projector;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::fetcher::EventFetcher;

/// Which slice of an organization's events a scoped sync covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrgScope {
    #[default]
    All,
    Roles,
    Credentials,
}

impl OrgScope {
    fn as_str(&self) -> &'static str {
        match self {
            OrgScope::All => "all",
            OrgScope::Roles => "roles",
            OrgScope::Credentials => "credentials",
        }
    }
}

/// What a reconciliation pass covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    /// Everything from the deployment block to head
    Full,
    /// Events touching one organization
    Organization { org_id: i64, scope: OrgScope },
}

impl SyncTarget {
    fn key(&self) -> String {
        match self {
            SyncTarget::Full => "full".to_string(),
            SyncTarget::Organization { org_id, scope } => {
                format!("org-{}-{}", org_id, scope.as_str())
            }
        }
    }
}

/// Outcome of a reconciliation pass. Per-window failures are reported,
/// never swallowed; the pass keeps going past them.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub target: String,
    pub from_block: u64,
    pub to_block: u64,
    pub events_stored: usize,
    pub events_applied: usize,
    pub errors: Vec<String>,
}

/// Coalesces concurrent passes per key: the first caller runs the work,
/// later callers subscribe and receive the same result.
struct SingleFlight<T> {
    in_flight: DashMap<String, broadcast::Sender<T>>,
}

impl<T: Clone> SingleFlight<T> {
    fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    async fn run<F>(&self, key: String, work: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let receiver = match self.in_flight.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                info!(target = %key, "Joining in-flight sync");
                Some(entry.get().subscribe())
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let (tx, _) = broadcast::channel(1);
                entry.insert(tx);
                None
            }
        };

        if let Some(mut rx) = receiver {
            return rx
                .recv()
                .await
                .map_err(|_| IndexerError::Sync("in-flight sync dropped".to_string()));
        }

        let result = work.await;
        if let Some((_, tx)) = self.in_flight.remove(&key) {
            let _ = tx.send(result.clone());
        }
        Ok(result)
    }
}

/// Runs operator-triggered reconciliation against ledger history.
///
/// Concurrent requests for the same target share one pass: the first
/// caller runs it, later callers wait on the same result.
pub struct SyncOrchestrator {
    config: IndexerConfig,
    db: Arc<DatabasePool>,
    fetcher: Arc<EventFetcher>,
    projector: Projector,
    single_flight: SingleFlight<SyncResult>,
}

impl SyncOrchestrator {
    pub fn new(config: IndexerConfig, db: Arc<DatabasePool>, fetcher: Arc<EventFetcher>) -> Self {
        let projector = Projector::new(db.clone());
        Self {
            config,
            db,
            fetcher,
            projector,
            single_flight: SingleFlight::new(),
        }
    }

    /// Run (or join) a reconciliation pass for the target
    pub async fn sync(&self, target: SyncTarget) -> Result<SyncResult> {
        self.single_flight
            .run(target.key(), self.execute(target))
            .await
    }

    async fn execute(&self, target: SyncTarget) -> SyncResult {
        let key = target.key();
        let from = self.config.start_block;
        let mut result = SyncResult {
            target: key.clone(),
            from_block: from,
            to_block: from,
            events_stored: 0,
            events_applied: 0,
            errors: Vec::new(),
        };

        let head = match self.fetcher.head().await {
            Ok(head) => head,
            Err(e) => {
                result.errors.push(format!("head: {}", e));
                return result;
            }
        };
        result.to_block = head;

        info!(target = %key, from = from, to = head, "Reconciliation sync starting");

        let window = self.config.sync.max_fetch_blocks;
        let mut current = from;
        while current <= head {
            let window_end = head.min(current + window - 1);
            match self.fetch_window(target, current, window_end).await {
                Ok(stored) => result.events_stored += stored,
                Err(e) => {
                    warn!(from = current, to = window_end, error = %e, "Sync window failed");
                    result
                        .errors
                        .push(format!("blocks {}..={}: {}", current, window_end, e));
                }
            }
            current = window_end + 1;
        }

        // Drain whatever the pass ingested through the projector.
        loop {
            match self.projector.apply_next(500).await {
                Ok(outcome) => {
                    result.events_applied += outcome.applied;
                    if outcome.applied == 0 {
                        break;
                    }
                }
                Err(e) => {
                    result.errors.push(format!("projection: {}", e));
                    break;
                }
            }
        }

        if target == SyncTarget::Full {
            if let Err(e) = SyncStatusRepository::mark_full_sync(self.db.inner()).await {
                result.errors.push(format!("mark_full_sync: {}", e));
            }
        }

        info!(
            target = %key,
            stored = result.events_stored,
            applied = result.events_applied,
            errors = result.errors.len(),
            "Reconciliation sync complete"
        );
        result
    }

    async fn fetch_window(&self, target: SyncTarget, from: u64, to: u64) -> Result<usize> {
        let mut stored = 0usize;
        for filter in self.filters_for(target) {
            let filter = filter.from_block(from).to_block(to);
            let logs = self.fetch_with_retry(&filter).await?;
            stored += self.fetcher.store_logs(&logs, to).await?;
        }
        Ok(stored)
    }

    async fn fetch_with_retry(&self, filter: &Filter) -> Result<Vec<alloy::rpc::types::Log>> {
        let max_attempts = self.config.sync.retry_attempts;
        let mut delay = std::time::Duration::from_millis(self.config.sync.retry_delay_ms);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.fetcher.get_logs_filtered(filter).await {
                Ok(logs) => return Ok(logs),
                Err(e) if e.is_transient() && attempts < max_attempts => {
                    tokio::time::sleep(delay).await;
                    delay = crate::throttle::next_backoff(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Log filters covering the target. Full uses the single registry
    /// filter; an organization target narrows by the indexed orgId, which
    /// sits in topic1 for registry events and topic2 for issuance and
    /// request events.
    fn filters_for(&self, target: SyncTarget) -> Vec<Filter> {
        match target {
            SyncTarget::Full => vec![self.fetcher.registry_filter()],
            SyncTarget::Organization { org_id, scope } => {
                let org_topic = U256::from(org_id as u64);
                let topic1_kinds: Vec<_> = match scope {
                    OrgScope::All => vec![
                        EventKind::OrganizationRegistered.signature_hash(),
                        EventKind::RoleGranted.signature_hash(),
                        EventKind::RoleRevoked.signature_hash(),
                    ],
                    OrgScope::Roles => vec![
                        EventKind::RoleGranted.signature_hash(),
                        EventKind::RoleRevoked.signature_hash(),
                    ],
                    OrgScope::Credentials => vec![],
                };
                let topic2_kinds: Vec<_> = match scope {
                    OrgScope::All => vec![
                        EventKind::CredentialIssued.signature_hash(),
                        EventKind::CredentialRevoked.signature_hash(),
                        EventKind::RequestCreated.signature_hash(),
                    ],
                    OrgScope::Roles => vec![],
                    OrgScope::Credentials => vec![
                        EventKind::CredentialIssued.signature_hash(),
                        EventKind::CredentialRevoked.signature_hash(),
                    ],
                };

                let mut filters = Vec::new();
                if !topic1_kinds.is_empty() {
                    filters.push(
                        Filter::new()
                            .address(self.config.registry_address)
                            .event_signature(topic1_kinds)
                            .topic1(org_topic),
                    );
                }
                if !topic2_kinds.is_empty() {
                    filters.push(
                        Filter::new()
                            .address(self.config.registry_address)
                            .event_signature(topic2_kinds)
                            .topic2(org_topic),
                    );
                }
                filters
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_passes_for_one_target_share_a_single_run() {
        let flight = Arc::new(SingleFlight::<u32>::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let leader = {
            let flight = flight.clone();
            let runs = runs.clone();
            tokio::spawn(async move {
                flight
                    .run("full".to_string(), async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        42u32
                    })
                    .await
            })
        };

        // Let the leader claim the key before the follower arrives.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let follower = {
            let flight = flight.clone();
            let runs = runs.clone();
            tokio::spawn(async move {
                flight
                    .run("full".to_string(), async {
                        runs.fetch_add(1, Ordering::SeqCst);
                        7u32
                    })
                    .await
            })
        };

        assert_eq!(leader.await.unwrap().unwrap(), 42);
        assert_eq!(follower.await.unwrap().unwrap(), 42);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn finished_pass_releases_the_key_for_a_fresh_run() {
        let flight = SingleFlight::<u32>::new();
        let first = flight.run("full".to_string(), async { 1u32 }).await.unwrap();
        let second = flight.run("full".to_string(), async { 2u32 }).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn target_keys_are_distinct_per_organization_and_scope() {
        assert_eq!(SyncTarget::Full.key(), "full");

        let org7 = SyncTarget::Organization {
            org_id: 7,
            scope: OrgScope::All,
        };
        let org8 = SyncTarget::Organization {
            org_id: 8,
            scope: OrgScope::All,
        };
        let org7_roles = SyncTarget::Organization {
            org_id: 7,
            scope: OrgScope::Roles,
        };
        assert_eq!(org7.key(), "org-7-all");
        assert_ne!(org7.key(), org8.key());
        assert_ne!(org7.key(), org7_roles.key());
    }
}
