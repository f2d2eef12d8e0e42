use crate::models::DbRoleGrant;
use crate::Result;
use sqlx::{PgConnection, PgPool};

pub struct RoleGrantRepository;

impl RoleGrantRepository {
    /// Upsert a grant keyed by (org_id, holder, role). Re-granting a
    /// revoked role reactivates the same row.
    pub async fn upsert_granted(
        conn: &mut PgConnection,
        org_id: i64,
        holder_address: &str,
        role: &str,
        block: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_grants (org_id, holder_address, role, active, granted_at_block)
            VALUES ($1, $2, $3, TRUE, $4)
            ON CONFLICT (org_id, holder_address, role) DO UPDATE SET
                active = TRUE,
                granted_at_block = EXCLUDED.granted_at_block,
                revoked_at_block = NULL,
                last_synced_at = NOW()
            "#,
        )
        .bind(org_id)
        .bind(holder_address)
        .bind(role)
        .bind(block)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Deactivate a grant. A revocation arriving before the grant was seen
    /// still lands as an inactive row rather than being dropped.
    pub async fn mark_revoked(
        conn: &mut PgConnection,
        org_id: i64,
        holder_address: &str,
        role: &str,
        block: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO role_grants (org_id, holder_address, role, active, granted_at_block, revoked_at_block)
            VALUES ($1, $2, $3, FALSE, 0, $4)
            ON CONFLICT (org_id, holder_address, role) DO UPDATE SET
                active = FALSE,
                revoked_at_block = EXCLUDED.revoked_at_block,
                last_synced_at = NOW()
            "#,
        )
        .bind(org_id)
        .bind(holder_address)
        .bind(role)
        .bind(block)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn for_organization(pool: &PgPool, org_id: i64) -> Result<Vec<DbRoleGrant>> {
        let rows = sqlx::query_as::<_, DbRoleGrant>(
            "SELECT * FROM role_grants WHERE org_id = $1 ORDER BY holder_address, role",
        )
        .bind(org_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
