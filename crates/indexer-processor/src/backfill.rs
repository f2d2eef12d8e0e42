use indexer_core::types::EventKind;
use indexer_core::{IndexerError, Result};
use indexer_db::repositories::{CredentialRepository, EventStoreRepository, OrganizationRepository};
use indexer_db::DatabasePool;
use std::sync::Arc;
use tracing::{info, warn};

use crate::decoder::{decode_raw_event, RegistryEvent};
use crate::handlers::storage;
use crate::projector::Projector;

/// Outcome of an operator-triggered backfill run
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub applied: usize,
    pub synthesized: usize,
    pub errors: Vec<String>,
}

/// Operator-triggered repair paths.
///
/// `reprocess` drains the unprocessed backlog through the projector.
/// `reconcile` finds ledger-confirmed issuances with no derived
/// credential row and synthesizes the row from the stored payload.
pub struct Backfill {
    db: Arc<DatabasePool>,
    projector: Projector,
}

impl Backfill {
    pub fn new(db: Arc<DatabasePool>) -> Self {
        let projector = Projector::new(db.clone());
        Self { db, projector }
    }

    /// Run the projector over the current unprocessed backlog
    pub async fn reprocess(&self, batch_size: i64) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();

        loop {
            let outcome = self.projector.apply_next(batch_size).await?;
            report.scanned += outcome.applied + outcome.failed.len();
            report.applied += outcome.applied;
            for key in &outcome.failed {
                report.errors.push(format!(
                    "{}:{} projection failed",
                    key.tx_hash, key.log_index
                ));
            }
            // Failed events stay unprocessed; stop once a pass applies
            // nothing new or we would spin on the same failures.
            if outcome.applied == 0 {
                break;
            }
        }

        info!(
            applied = report.applied,
            errors = report.errors.len(),
            "Reprocess backfill complete"
        );
        Ok(report)
    }

    /// Scan finalized CredentialIssued events and synthesize any derived
    /// row that is missing. Marks the originating event processed.
    pub async fn reconcile(&self) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();

        let events = EventStoreRepository::finalized_by_name(
            self.db.inner(),
            EventKind::CredentialIssued.as_str(),
        )
        .await
        .map_err(storage)?;

        for raw in &events {
            report.scanned += 1;

            let decoded = match decode_raw_event(raw) {
                Ok(decoded) => decoded,
                Err(e) => {
                    report
                        .errors
                        .push(format!("{}:{} {}", raw.tx_hash, raw.log_index, e));
                    continue;
                }
            };

            let RegistryEvent::CredentialIssued {
                token_id,
                org_id,
                owner,
                schema_hash,
            } = decoded
            else {
                continue;
            };

            let exists = CredentialRepository::exists(self.db.inner(), token_id)
                .await
                .map_err(storage)?;
            if exists {
                continue;
            }

            warn!(
                token_id = token_id,
                org_id = org_id,
                tx_hash = %raw.tx_hash,
                "Finalized issuance with no derived credential, synthesizing"
            );

            match self
                .synthesize_credential(raw, token_id, org_id, &owner, &schema_hash)
                .await
            {
                Ok(()) => report.synthesized += 1,
                Err(e) => report
                    .errors
                    .push(format!("{}:{} {}", raw.tx_hash, raw.log_index, e)),
            }
        }

        info!(
            scanned = report.scanned,
            synthesized = report.synthesized,
            errors = report.errors.len(),
            "Reconciliation backfill complete"
        );
        Ok(report)
    }

    async fn synthesize_credential(
        &self,
        raw: &indexer_db::models::DbRawEvent,
        token_id: i64,
        org_id: i64,
        owner: &str,
        schema_hash: &str,
    ) -> Result<()> {
        let mut tx = self
            .db
            .inner()
            .begin()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        OrganizationRepository::ensure_placeholder(&mut tx, org_id)
            .await
            .map_err(storage)?;
        CredentialRepository::insert_issued(
            &mut tx,
            token_id,
            org_id,
            owner,
            Some(schema_hash),
            raw.block_number,
        )
        .await
        .map_err(storage)?;
        EventStoreRepository::mark_processed(&mut tx, &raw.key(), true)
            .await
            .map_err(storage)?;

        tx.commit()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        Ok(())
    }
}
