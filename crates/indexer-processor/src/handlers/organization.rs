use indexer_core::Result;
use indexer_db::repositories::OrganizationRepository;
use sqlx::PgConnection;
use tracing::info;

use super::storage;

pub struct OrganizationHandler;

impl OrganizationHandler {
    /// Apply an OrganizationRegistered event. Upsert semantics: if a
    /// placeholder row already exists it is enriched in place.
    pub async fn handle_registered(
        conn: &mut PgConnection,
        org_id: i64,
        name: &str,
        admin: &str,
    ) -> Result<()> {
        OrganizationRepository::upsert_registered(conn, org_id, name, admin)
            .await
            .map_err(storage)?;

        info!(org_id = org_id, name = name, "Organization registered");
        Ok(())
    }
}
