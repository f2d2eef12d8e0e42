use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for the organizations table.
/// A row with on_chain_verified = false and NULL name is a placeholder
/// created to satisfy a foreign reference before the registration event
/// was projected.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbOrganization {
    pub org_id: i64,
    pub name: Option<String>,
    pub admin_address: Option<String>,
    pub on_chain_verified: bool,
    pub last_synced_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}
