use crate::models::DbPendingTransaction;
use crate::Result;
use sqlx::PgPool;

pub struct PendingTransactionRepository;

impl PendingTransactionRepository {
    /// Idempotent registration keyed by tx_hash; duplicate submission
    /// only bumps updated_at.
    pub async fn register(
        pool: &PgPool,
        tx_hash: &str,
        action: &str,
        entity_type: Option<&str>,
        entity_id: Option<i64>,
        org_id: Option<i64>,
        initiator: Option<&str>,
    ) -> Result<DbPendingTransaction> {
        let row = sqlx::query_as::<_, DbPendingTransaction>(
            r#"
            INSERT INTO pending_transactions (tx_hash, action, entity_type, entity_id, org_id, initiator)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (tx_hash) DO UPDATE SET updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(tx_hash)
        .bind(action)
        .bind(entity_type)
        .bind(entity_id)
        .bind(org_id)
        .bind(initiator)
        .fetch_one(pool)
        .await?;
        Ok(row)
    }

    pub async fn get(pool: &PgPool, tx_hash: &str) -> Result<Option<DbPendingTransaction>> {
        let row = sqlx::query_as::<_, DbPendingTransaction>(
            "SELECT * FROM pending_transactions WHERE tx_hash = $1",
        )
        .bind(tx_hash)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn set_status(pool: &PgPool, tx_hash: &str, status: &str) -> Result<()> {
        sqlx::query(
            "UPDATE pending_transactions SET status = $2, updated_at = NOW() WHERE tx_hash = $1",
        )
        .bind(tx_hash)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(())
    }
}
