use indexer_core::Result;
use indexer_db::repositories::{CredentialRepository, OrganizationRepository};
use sqlx::PgConnection;
use tracing::info;

use super::storage;

pub struct CredentialHandler;

impl CredentialHandler {
    /// Apply a CredentialIssued event. Keyed by token_id; double delivery
    /// is a no-op. An unknown organization gets a placeholder row rather
    /// than failing the event.
    pub async fn handle_issued(
        conn: &mut PgConnection,
        token_id: i64,
        org_id: i64,
        owner: &str,
        schema_hash: &str,
        block: i64,
    ) -> Result<()> {
        OrganizationRepository::ensure_placeholder(conn, org_id)
            .await
            .map_err(storage)?;
        CredentialRepository::insert_issued(conn, token_id, org_id, owner, Some(schema_hash), block)
            .await
            .map_err(storage)?;

        info!(token_id = token_id, org_id = org_id, owner = owner, "Credential issued");
        Ok(())
    }

    pub async fn handle_revoked(
        conn: &mut PgConnection,
        token_id: i64,
        org_id: i64,
        reason: &str,
        block: i64,
    ) -> Result<()> {
        OrganizationRepository::ensure_placeholder(conn, org_id)
            .await
            .map_err(storage)?;
        let reason = if reason.is_empty() { None } else { Some(reason) };
        CredentialRepository::mark_revoked(conn, token_id, org_id, reason, block)
            .await
            .map_err(storage)?;

        info!(token_id = token_id, org_id = org_id, "Credential revoked");
        Ok(())
    }
}
