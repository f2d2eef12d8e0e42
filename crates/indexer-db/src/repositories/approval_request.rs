use crate::models::{DbApproval, DbApprovalRequest};
use crate::Result;
use sqlx::{PgConnection, PgPool};

pub struct ApprovalRequestRepository;

// The conflict arm only fires for placeholder rows, so a re-delivered
// creation event can enrich an approval-first stub but never rewrite a
// request that the real creation event already populated.
const INSERT_CREATED_SQL: &str = r#"
    INSERT INTO approval_requests (request_id, org_id, action, required_approvals,
                                   initiator, created_at_block)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (request_id) DO UPDATE SET
        org_id = EXCLUDED.org_id,
        action = EXCLUDED.action,
        required_approvals = EXCLUDED.required_approvals,
        initiator = EXCLUDED.initiator,
        created_at_block = EXCLUDED.created_at_block,
        on_chain_verified = TRUE,
        last_synced_at = NOW()
    WHERE approval_requests.on_chain_verified = FALSE
"#;

impl ApprovalRequestRepository {
    /// Upsert keyed by request_id. Enriches a placeholder left by an
    /// out-of-order approval; a no-op for an already-verified row.
    pub async fn insert_created(
        conn: &mut PgConnection,
        request_id: i64,
        org_id: i64,
        action: &str,
        required_approvals: i32,
        initiator: &str,
        block: i64,
    ) -> Result<()> {
        sqlx::query(INSERT_CREATED_SQL)
            .bind(request_id)
            .bind(org_id)
            .bind(action)
            .bind(required_approvals)
            .bind(initiator)
            .bind(block)
            .execute(conn)
            .await?;
        Ok(())
    }

    /// Minimal unverified row for approvals that arrive ahead of the
    /// creation event they reference.
    pub async fn ensure_placeholder(conn: &mut PgConnection, request_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO approval_requests (request_id, org_id, action, required_approvals,
                                           created_at_block, on_chain_verified)
            VALUES ($1, 0, 'unknown', 0, 0, FALSE)
            ON CONFLICT (request_id) DO NOTHING
            "#,
        )
        .bind(request_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// One approval row per (request, approver); duplicate delivery is
    /// absorbed by the conflict target.
    pub async fn insert_approval(
        conn: &mut PgConnection,
        request_id: i64,
        approver_address: &str,
        block: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO request_approvals (request_id, approver_address, approved_at_block)
            VALUES ($1, $2, $3)
            ON CONFLICT (request_id, approver_address) DO NOTHING
            "#,
        )
        .bind(request_id)
        .bind(approver_address)
        .bind(block)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// approval_count is a derived COUNT, never an incremented counter,
    /// so replaying events converges to the same value.
    pub async fn recompute_approval_count(
        conn: &mut PgConnection,
        request_id: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE approval_requests
            SET approval_count = (SELECT COUNT(*) FROM request_approvals WHERE request_id = $1),
                last_synced_at = NOW()
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn set_status(
        conn: &mut PgConnection,
        request_id: i64,
        status: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE approval_requests SET status = $2, last_synced_at = NOW() WHERE request_id = $1",
        )
        .bind(request_id)
        .bind(status)
        .execute(conn)
        .await?;
        Ok(())
    }

    pub async fn get(pool: &PgPool, request_id: i64) -> Result<Option<DbApprovalRequest>> {
        let row = sqlx::query_as::<_, DbApprovalRequest>(
            "SELECT * FROM approval_requests WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_optional(pool)
        .await?;
        Ok(row)
    }

    pub async fn approvals(pool: &PgPool, request_id: i64) -> Result<Vec<DbApproval>> {
        let rows = sqlx::query_as::<_, DbApproval>(
            "SELECT * FROM request_approvals WHERE request_id = $1 ORDER BY approver_address",
        )
        .bind(request_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creation_upsert_enriches_only_unverified_placeholders() {
        assert!(INSERT_CREATED_SQL.contains("ON CONFLICT (request_id) DO UPDATE"));
        assert!(INSERT_CREATED_SQL.contains("on_chain_verified = TRUE"));
        assert!(INSERT_CREATED_SQL.contains("WHERE approval_requests.on_chain_verified = FALSE"));
        // Terminal status and the derived approval count are never rewritten.
        assert!(!INSERT_CREATED_SQL.contains("status ="));
        assert!(!INSERT_CREATED_SQL.contains("approval_count ="));
    }
}
