use chrono::{DateTime, Duration, Utc};
use indexer_core::{IndexerError, Result};
use indexer_db::models::DbPendingTransaction;
use indexer_db::repositories::{EventStoreRepository, PendingTransactionRepository};
use indexer_db::DatabasePool;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Derived state of a tracked transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Pending,
    Confirmed,
    Timeout,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PendingStatus::Pending => "pending",
            PendingStatus::Confirmed => "confirmed",
            PendingStatus::Timeout => "timeout",
        }
    }
}

/// Status view joined against the event store
#[derive(Debug, Clone, Serialize)]
pub struct TrackedTransaction {
    pub tx_hash: String,
    pub action: String,
    pub status: PendingStatus,
    pub registered_at: DateTime<Utc>,
    pub org_id: Option<i64>,
}

/// Tracks client-submitted transactions until their events land.
///
/// Confirmation is derived from the event store, not from receipts: a
/// transaction counts as confirmed once any of its logs has been
/// projected. Registrations older than the timeout with nothing stored
/// are reported as timed out.
pub struct PendingTracker {
    db: Arc<DatabasePool>,
    timeout: Duration,
}

impl PendingTracker {
    pub fn new(db: Arc<DatabasePool>, timeout_secs: u64) -> Self {
        Self {
            db,
            timeout: Duration::seconds(timeout_secs as i64),
        }
    }

    /// Idempotent registration; resubmitting the same hash is harmless
    pub async fn register(
        &self,
        tx_hash: &str,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<i64>,
        org_id: Option<i64>,
        initiator: Option<&str>,
    ) -> Result<DbPendingTransaction> {
        let tx_hash = normalize_tx_hash(tx_hash);
        let row = PendingTransactionRepository::register(
            self.db.inner(),
            &tx_hash,
            action,
            entity_type,
            entity_id,
            org_id,
            initiator,
        )
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        info!(tx_hash = %tx_hash, action = action, "Pending transaction registered");
        Ok(row)
    }

    /// Current status of a tracked transaction, or None if never registered
    pub async fn status(&self, tx_hash: &str) -> Result<Option<TrackedTransaction>> {
        let tx_hash = normalize_tx_hash(tx_hash);
        let Some(record) = PendingTransactionRepository::get(self.db.inner(), &tx_hash)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?
        else {
            return Ok(None);
        };

        let confirmed = EventStoreRepository::any_projection_applied(self.db.inner(), &tx_hash)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let status = derive_status(record.created_at, Utc::now(), confirmed, self.timeout);

        // Terminal states are written back so later reads are cheap.
        if status != PendingStatus::Pending && record.status != status.as_str() {
            PendingTransactionRepository::set_status(self.db.inner(), &tx_hash, status.as_str())
                .await
                .map_err(|e| IndexerError::Storage(e.to_string()))?;
        }

        Ok(Some(TrackedTransaction {
            tx_hash: record.tx_hash,
            action: record.action,
            status,
            registered_at: record.created_at,
            org_id: record.org_id,
        }))
    }
}

/// Stored event hashes are the lowercase hex rendering of B256. Folding
/// case at the tracker boundary lets a checksummed or uppercase client
/// hash still join against them.
fn normalize_tx_hash(tx_hash: &str) -> String {
    tx_hash.to_ascii_lowercase()
}

/// Pure status derivation: confirmation wins over age
fn derive_status(
    registered_at: DateTime<Utc>,
    now: DateTime<Utc>,
    confirmed: bool,
    timeout: Duration,
) -> PendingStatus {
    if confirmed {
        PendingStatus::Confirmed
    } else if now - registered_at >= timeout {
        PendingStatus::Timeout
    } else {
        PendingStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_unconfirmed_is_pending() {
        let now = Utc::now();
        let status = derive_status(now, now, false, Duration::seconds(600));
        assert_eq!(status, PendingStatus::Pending);
    }

    #[test]
    fn projected_event_confirms() {
        let now = Utc::now();
        let status = derive_status(now, now, true, Duration::seconds(600));
        assert_eq!(status, PendingStatus::Confirmed);
    }

    #[test]
    fn stale_unconfirmed_times_out() {
        let now = Utc::now();
        let registered = now - Duration::seconds(601);
        let status = derive_status(registered, now, false, Duration::seconds(600));
        assert_eq!(status, PendingStatus::Timeout);
    }

    #[test]
    fn checksummed_hash_folds_to_stored_form() {
        let stored = format!("0x{}", "ab".repeat(32));
        let checksummed = format!("0x{}", "aB".repeat(32));
        assert_eq!(normalize_tx_hash(&checksummed), stored);
        assert_eq!(normalize_tx_hash(&stored), stored);
    }

    #[test]
    fn late_confirmation_beats_timeout() {
        let now = Utc::now();
        let registered = now - Duration::seconds(3600);
        let status = derive_status(registered, now, true, Duration::seconds(600));
        assert_eq!(status, PendingStatus::Confirmed);
    }
}
