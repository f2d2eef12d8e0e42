use crate::models::DbCredential;
use crate::Result;
use sqlx::{PgConnection, PgPool};

pub struct CredentialRepository;

// The conflict arm only fires for an unverified stub (a revocation seen
// before its issuance). It fills in the issuance fields and leaves the
// revocation fields alone, so the row stays revoked.
const INSERT_ISSUED_SQL: &str = r#"
    INSERT INTO credentials (token_id, org_id, owner_address, schema_hash, issued_at_block)
    VALUES ($1, $2, $3, $4, $5)
    ON CONFLICT (token_id) DO UPDATE SET
        org_id = EXCLUDED.org_id,
        owner_address = EXCLUDED.owner_address,
        schema_hash = EXCLUDED.schema_hash,
        issued_at_block = EXCLUDED.issued_at_block,
        on_chain_verified = TRUE,
        last_synced_at = NOW()
    WHERE credentials.on_chain_verified = FALSE
"#;

impl CredentialRepository {
    /// Upsert keyed by token_id. Double delivery of the same issuance is
    /// a no-op; an issuance landing after a revoked-first stub enriches it.
    pub async fn insert_issued(
        conn: &mut PgConnection,
        token_id: i64,
        org_id: i64,
        owner_address: &str,
        schema_hash: Option<&str>,
        block: i64,
    ) -> Result<()> {
        sqlx::query(INSERT_ISSUED_SQL)
            .bind(token_id)
            .bind(org_id)
            .bind(owner_address)
            .bind(schema_hash)
            .bind(block)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Record a revocation. A revocation seen before its issuance lands as
    /// a minimal revoked row so the event is never dropped.
    pub async fn mark_revoked(
        conn: &mut PgConnection,
        token_id: i64,
        org_id: i64,
        reason: Option<&str>,
        block: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO credentials (token_id, org_id, owner_address, revoked,
                                     revocation_reason, issued_at_block, revoked_at_block,
                                     on_chain_verified)
            VALUES ($1, $2, '', TRUE, $3, 0, $4, FALSE)
            ON CONFLICT (token_id) DO UPDATE SET
                revoked = TRUE,
                revocation_reason = EXCLUDED.revocation_reason,
                revoked_at_block = EXCLUDED.revoked_at_block,
                last_synced_at = NOW()
            "#,
        )
        .bind(token_id)
        .bind(org_id)
        .bind(reason)
        .bind(block)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get(pool: &PgPool, token_id: i64) -> Result<Option<DbCredential>> {
        let row = sqlx::query_as::<_, DbCredential>(
            "SELECT * FROM credentials WHERE token_id = $1",
        )
        .bind(token_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn exists(pool: &PgPool, token_id: i64) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM credentials WHERE token_id = $1)")
                .bind(token_id)
                .fetch_one(pool)
                .await?;
        Ok(exists)
    }

    pub async fn for_organization(pool: &PgPool, org_id: i64) -> Result<Vec<DbCredential>> {
        let rows = sqlx::query_as::<_, DbCredential>(
            "SELECT * FROM credentials WHERE org_id = $1 ORDER BY token_id",
        )
        .bind(org_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuance_upsert_enriches_only_unverified_stubs() {
        assert!(INSERT_ISSUED_SQL.contains("ON CONFLICT (token_id) DO UPDATE"));
        assert!(INSERT_ISSUED_SQL.contains("WHERE credentials.on_chain_verified = FALSE"));
        // A revoked-first stub must stay revoked after enrichment.
        assert!(!INSERT_ISSUED_SQL.contains("revoked ="));
        assert!(!INSERT_ISSUED_SQL.contains("revocation_reason ="));
    }
}
