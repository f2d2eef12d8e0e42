use indexer_core::types::Role;
use indexer_core::Result;
use indexer_db::repositories::{OrganizationRepository, RoleGrantRepository};
use sqlx::PgConnection;
use tracing::info;

use super::storage;

pub struct RoleHandler;

impl RoleHandler {
    pub async fn handle_granted(
        conn: &mut PgConnection,
        org_id: i64,
        holder: &str,
        role: Role,
        block: i64,
    ) -> Result<()> {
        OrganizationRepository::ensure_placeholder(conn, org_id)
            .await
            .map_err(storage)?;
        RoleGrantRepository::upsert_granted(conn, org_id, holder, role.as_str(), block)
            .await
            .map_err(storage)?;

        info!(org_id = org_id, holder = holder, role = role.as_str(), "Role granted");
        Ok(())
    }

    pub async fn handle_revoked(
        conn: &mut PgConnection,
        org_id: i64,
        holder: &str,
        role: Role,
        block: i64,
    ) -> Result<()> {
        OrganizationRepository::ensure_placeholder(conn, org_id)
            .await
            .map_err(storage)?;
        RoleGrantRepository::mark_revoked(conn, org_id, holder, role.as_str(), block)
            .await
            .map_err(storage)?;

        info!(org_id = org_id, holder = holder, role = role.as_str(), "Role revoked");
        Ok(())
    }
}
