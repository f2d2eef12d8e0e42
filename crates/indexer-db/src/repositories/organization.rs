use crate::models::DbOrganization;
use crate::Result;
use sqlx::{PgConnection, PgPool};

pub struct OrganizationRepository;

impl OrganizationRepository {
    /// Upsert from an OrganizationRegistered event. Enriches an existing
    /// placeholder row in place instead of creating a duplicate.
    pub async fn upsert_registered(
        conn: &mut PgConnection,
        org_id: i64,
        name: &str,
        admin_address: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO organizations (org_id, name, admin_address, on_chain_verified)
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (org_id) DO UPDATE SET
                name = EXCLUDED.name,
                admin_address = EXCLUDED.admin_address,
                on_chain_verified = TRUE,
                last_synced_at = NOW()
            "#,
        )
        .bind(org_id)
        .bind(name)
        .bind(admin_address)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Minimal placeholder so events referencing an organization we have
    /// not yet seen are never dropped. A later registration event or full
    /// sync enriches the row.
    pub async fn ensure_placeholder(conn: &mut PgConnection, org_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO organizations (org_id, on_chain_verified) VALUES ($1, FALSE) ON CONFLICT (org_id) DO NOTHING",
        )
        .bind(org_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get(pool: &PgPool, org_id: i64) -> Result<Option<DbOrganization>> {
        let row = sqlx::query_as::<_, DbOrganization>(
            "SELECT * FROM organizations WHERE org_id = $1",
        )
        .bind(org_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn count(pool: &PgPool) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM organizations")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }
}
