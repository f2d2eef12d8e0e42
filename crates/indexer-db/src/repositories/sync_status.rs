use crate::models::DbSyncStatus;
use crate::Result;
use sqlx::PgPool;

pub struct SyncStatusRepository;

impl SyncStatusRepository {
    pub async fn get(pool: &PgPool) -> Result<Option<DbSyncStatus>> {
        let row = sqlx::query_as::<_, DbSyncStatus>(
            "SELECT * FROM sync_status WHERE id = 'main'",
        )
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn last_synced_block(pool: &PgPool) -> Result<Option<u64>> {
        let result: Option<(i64,)> =
            sqlx::query_as("SELECT last_synced_block FROM sync_status WHERE id = 'main'")
                .fetch_optional(pool)
                .await?;

        match result {
            Some((block,)) if block > 0 => Ok(Some(block as u64)),
            _ => Ok(None),
        }
    }

    pub async fn set_last_synced_block(pool: &PgPool, block: u64) -> Result<()> {
        sqlx::query(
            "UPDATE sync_status SET last_synced_block = $1, updated_at = NOW() WHERE id = 'main'",
        )
        .bind(block as i64)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_finalized_block(pool: &PgPool, block: u64) -> Result<()> {
        sqlx::query(
            "UPDATE sync_status SET finalized_block = $1, updated_at = NOW() WHERE id = 'main'",
        )
        .bind(block as i64)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn set_sync_mode(pool: &PgPool, mode: &str) -> Result<()> {
        sqlx::query("UPDATE sync_status SET sync_mode = $1, updated_at = NOW() WHERE id = 'main'")
            .bind(mode)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn set_last_error(pool: &PgPool, error: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE sync_status SET last_error = $1, updated_at = NOW() WHERE id = 'main'")
            .bind(error)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_full_sync(pool: &PgPool) -> Result<()> {
        sqlx::query(
            "UPDATE sync_status SET last_full_sync_at = NOW(), updated_at = NOW() WHERE id = 'main'",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}
