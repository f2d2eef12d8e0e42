use indexer_core::{IndexerError, Result};
use indexer_db::models::{DbRawEvent, EventKey};
use indexer_db::repositories::EventStoreRepository;
use indexer_db::DatabasePool;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::decoder::{decode_raw_event, RegistryEvent};
use crate::handlers::{CredentialHandler, OrganizationHandler, RequestHandler, RoleHandler};

/// Result of one projection pass
#[derive(Debug, Clone, Default)]
pub struct ProjectionOutcome {
    pub applied: usize,
    pub failed: Vec<EventKey>,
}

/// Events apply strictly in (block_number, log_index) order: a
/// RequestApproved must never run before the RequestCreated it
/// references.
fn delivery_order(events: &mut [DbRawEvent]) {
    events.sort_by_key(|e| (e.block_number, e.log_index));
}

/// Applies stored raw events to the derived tables, exactly once.
///
/// Each event runs in its own transaction together with its processed
/// flag, so a partial failure can never leave an event marked done with
/// no effect (or the reverse).
pub struct Projector {
    db: Arc<DatabasePool>,
}

impl Projector {
    pub fn new(db: Arc<DatabasePool>) -> Self {
        Self { db }
    }

    /// Project the next `batch_size` unprocessed events in
    /// (block_number, log_index) order. A failing event is left
    /// unprocessed and reported; it does not block the rest of the batch.
    pub async fn apply_next(&self, batch_size: i64) -> Result<ProjectionOutcome> {
        let mut events = EventStoreRepository::unprocessed(self.db.inner(), batch_size)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        delivery_order(&mut events);

        let mut outcome = ProjectionOutcome::default();

        for raw in &events {
            let decoded = match decode_raw_event(raw) {
                Ok(decoded) => decoded,
                Err(e) => {
                    // Left unprocessed for manual inspection; does not
                    // block the pipeline.
                    warn!(
                        tx_hash = %raw.tx_hash,
                        log_index = raw.log_index,
                        error = %e,
                        "Malformed event payload, skipping"
                    );
                    counter!("indexer_events_malformed").increment(1);
                    outcome.failed.push(raw.key());
                    continue;
                }
            };

            match self.apply_one(raw, decoded).await {
                Ok(()) => {
                    counter!("indexer_events_applied").increment(1);
                    outcome.applied += 1;
                }
                Err(e) => {
                    warn!(
                        tx_hash = %raw.tx_hash,
                        log_index = raw.log_index,
                        event = %raw.event_name,
                        error = %e,
                        "Projection failed, event left for retry"
                    );
                    counter!("indexer_events_failed").increment(1);
                    outcome.failed.push(raw.key());
                }
            }
        }

        debug!(
            applied = outcome.applied,
            failed = outcome.failed.len(),
            "Projection pass complete"
        );

        Ok(outcome)
    }

    /// Apply a single event and flip its processed flags in one transaction
    async fn apply_one(&self, raw: &DbRawEvent, event: RegistryEvent) -> Result<()> {
        let mut tx = self
            .db
            .inner()
            .begin()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let block = raw.block_number;
        match event {
            RegistryEvent::OrganizationRegistered { org_id, admin, name } => {
                OrganizationHandler::handle_registered(&mut tx, org_id, &name, &admin).await?;
            }
            RegistryEvent::RoleGranted { org_id, holder, role } => {
                RoleHandler::handle_granted(&mut tx, org_id, &holder, role, block).await?;
            }
            RegistryEvent::RoleRevoked { org_id, holder, role } => {
                RoleHandler::handle_revoked(&mut tx, org_id, &holder, role, block).await?;
            }
            RegistryEvent::CredentialIssued {
                token_id,
                org_id,
                owner,
                schema_hash,
            } => {
                CredentialHandler::handle_issued(
                    &mut tx,
                    token_id,
                    org_id,
                    &owner,
                    &schema_hash,
                    block,
                )
                .await?;
            }
            RegistryEvent::CredentialRevoked {
                token_id,
                org_id,
                reason,
            } => {
                CredentialHandler::handle_revoked(&mut tx, token_id, org_id, &reason, block)
                    .await?;
            }
            RegistryEvent::RequestCreated {
                request_id,
                org_id,
                action,
                required_approvals,
                initiator,
            } => {
                RequestHandler::handle_created(
                    &mut tx,
                    request_id,
                    org_id,
                    action,
                    required_approvals,
                    &initiator,
                    block,
                )
                .await?;
            }
            RegistryEvent::RequestApproved {
                request_id,
                approver,
            } => {
                RequestHandler::handle_approved(&mut tx, request_id, &approver, block).await?;
            }
            RegistryEvent::RequestExecuted { request_id } => {
                RequestHandler::handle_executed(&mut tx, request_id).await?;
            }
            RegistryEvent::RequestRejected {
                request_id,
                rejecter,
                ..
            } => {
                RequestHandler::handle_rejected(&mut tx, request_id, &rejecter).await?;
            }
        }

        EventStoreRepository::mark_processed(&mut tx, &raw.key(), true)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw(event_name: &str, block: i64, log_index: i64) -> DbRawEvent {
        DbRawEvent {
            chain_id: 1,
            tx_hash: format!("0x{:064x}", block * 100 + log_index),
            log_index,
            event_name: event_name.to_string(),
            contract_address: "0x0000000000000000000000000000000000000001".to_string(),
            block_number: block,
            block_hash: None,
            topics: sqlx::types::Json(Vec::new()),
            data: "0x".to_string(),
            is_finalized: false,
            confirmation_depth: 0,
            processed: false,
            processed_at: None,
            projection_applied: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn approval_never_applies_before_its_creation() {
        let mut batch = vec![
            raw("RequestApproved", 120, 3),
            raw("RequestExecuted", 121, 0),
            raw("RequestCreated", 120, 1),
            raw("RequestApproved", 120, 2),
        ];

        delivery_order(&mut batch);

        let names: Vec<&str> = batch.iter().map(|e| e.event_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "RequestCreated",
                "RequestApproved",
                "RequestApproved",
                "RequestExecuted",
            ]
        );
    }

    #[test]
    fn later_block_sorts_after_higher_log_index_in_earlier_block() {
        let mut batch = vec![raw("RoleGranted", 51, 0), raw("OrganizationRegistered", 50, 7)];
        delivery_order(&mut batch);
        assert_eq!(batch[0].event_name, "OrganizationRegistered");
        assert_eq!(batch[1].event_name, "RoleGranted");
    }
}
