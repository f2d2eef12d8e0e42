use crate::models::{DbRawEvent, EventKey};
use crate::Result;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

/// Result of an event-store upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Duplicate,
}

/// Filters for the event browsing surface. Results are newest-first.
#[derive(Debug, Clone, Default)]
pub struct EventBrowseFilter {
    pub from_block: Option<i64>,
    pub to_block: Option<i64>,
    pub event_name: Option<String>,
    pub tx_hash: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub struct EventStoreRepository;

impl EventStoreRepository {
    /// Idempotent ingestion keyed by (chain_id, tx_hash, log_index).
    /// Re-ingesting the same key leaves the immutable fields alone and only
    /// refreshes confirmation tracking; confirmation_depth never decreases.
    pub async fn upsert(pool: &PgPool, event: &DbRawEvent) -> Result<UpsertOutcome> {
        let inserted: bool = sqlx::query_scalar(
            r#"
            INSERT INTO raw_events (chain_id, tx_hash, log_index, event_name, contract_address,
                                    block_number, block_hash, topics, data,
                                    is_finalized, confirmation_depth)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (chain_id, tx_hash, log_index) DO UPDATE SET
                block_hash = COALESCE(EXCLUDED.block_hash, raw_events.block_hash),
                confirmation_depth = GREATEST(raw_events.confirmation_depth, EXCLUDED.confirmation_depth),
                is_finalized = raw_events.is_finalized OR EXCLUDED.is_finalized
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(event.chain_id)
        .bind(&event.tx_hash)
        .bind(event.log_index)
        .bind(&event.event_name)
        .bind(&event.contract_address)
        .bind(event.block_number)
        .bind(&event.block_hash)
        .bind(&event.topics)
        .bind(&event.data)
        .bind(event.is_finalized)
        .bind(event.confirmation_depth)
        .fetch_one(pool)
        .await?;

        if inserted {
            Ok(UpsertOutcome::Inserted)
        } else {
            Ok(UpsertOutcome::Duplicate)
        }
    }

    /// Unapplied events in delivery order. The (block_number, log_index)
    /// ordering is load-bearing: later events may reference state written
    /// by earlier ones.
    pub async fn unprocessed(pool: &PgPool, limit: i64) -> Result<Vec<DbRawEvent>> {
        let rows = sqlx::query_as::<_, DbRawEvent>(
            r#"
            SELECT * FROM raw_events
            WHERE NOT processed
            ORDER BY block_number ASC, log_index ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Flip the processing flags. Only ever called inside the projection
    /// transaction so the flags and the derived writes commit together.
    pub async fn mark_processed(
        conn: &mut PgConnection,
        key: &EventKey,
        success: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE raw_events
            SET processed = TRUE, processed_at = NOW(), projection_applied = $4
            WHERE chain_id = $1 AND tx_hash = $2 AND log_index = $3
            "#,
        )
        .bind(key.chain_id)
        .bind(&key.tx_hash)
        .bind(key.log_index)
        .bind(success)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Recompute confirmation depths against the current head. Finalized
    /// rows are left untouched, which freezes their depth at the threshold.
    pub async fn refresh_confirmations(
        pool: &PgPool,
        chain_id: i64,
        head: i64,
        finality_depth: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE raw_events
            SET confirmation_depth = GREATEST(confirmation_depth, $2 - block_number),
                is_finalized = ($2 - block_number) >= $3
            WHERE chain_id = $1 AND NOT is_finalized
            "#,
        )
        .bind(chain_id)
        .bind(head)
        .bind(finality_depth)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Paginated, filterable browse over raw events, newest-first
    pub async fn browse(pool: &PgPool, filter: &EventBrowseFilter) -> Result<Vec<DbRawEvent>> {
        let mut builder = Self::browse_query(filter);
        let rows = builder
            .build_query_as::<DbRawEvent>()
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    fn browse_query(filter: &EventBrowseFilter) -> QueryBuilder<'_, Postgres> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM raw_events WHERE TRUE");

        if let Some(from) = filter.from_block {
            builder.push(" AND block_number >= ").push_bind(from);
        }
        if let Some(to) = filter.to_block {
            builder.push(" AND block_number <= ").push_bind(to);
        }
        if let Some(name) = &filter.event_name {
            builder.push(" AND event_name = ").push_bind(name);
        }
        if let Some(tx) = &filter.tx_hash {
            builder.push(" AND tx_hash = ").push_bind(tx);
        }

        builder
            .push(" ORDER BY block_number DESC, log_index DESC LIMIT ")
            .push_bind(filter.limit.clamp(1, 500))
            .push(" OFFSET ")
            .push_bind(filter.offset.max(0));
        builder
    }

    /// True if any log of the transaction has been projected. Drives the
    /// pending-transaction confirmation join.
    pub async fn any_projection_applied(pool: &PgPool, tx_hash: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM raw_events WHERE tx_hash = $1 AND projection_applied)",
        )
        .bind(tx_hash)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// Finalized events of one kind, oldest-first. Used by the
    /// reconciliation backfill to find missed terminal states.
    pub async fn finalized_by_name(pool: &PgPool, event_name: &str) -> Result<Vec<DbRawEvent>> {
        let rows = sqlx::query_as::<_, DbRawEvent>(
            r#"
            SELECT * FROM raw_events
            WHERE event_name = $1 AND is_finalized
            ORDER BY block_number ASC, log_index ASC
            "#,
        )
        .bind(event_name)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_unprocessed(pool: &PgPool) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM raw_events WHERE NOT processed")
                .fetch_one(pool)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browse_query_includes_only_set_filters() {
        let filter = EventBrowseFilter {
            from_block: Some(100),
            event_name: Some("CredentialIssued".to_string()),
            limit: 50,
            ..Default::default()
        };
        let sql = EventStoreRepository::browse_query(&filter).into_sql();

        assert!(sql.contains("block_number >= $1"));
        assert!(sql.contains("event_name = $2"));
        assert!(!sql.contains("block_number <="));
        assert!(!sql.contains("tx_hash ="));
        assert!(sql.contains("ORDER BY block_number DESC, log_index DESC"));
    }

    #[test]
    fn browse_query_clamps_pagination() {
        let filter = EventBrowseFilter {
            limit: 100_000,
            offset: -5,
            ..Default::default()
        };
        let mut builder = EventStoreRepository::browse_query(&filter);
        let sql = builder.sql().to_string();

        // Limit and offset are bound parameters, never inlined.
        assert!(sql.ends_with("LIMIT $1 OFFSET $2"));
    }
}
