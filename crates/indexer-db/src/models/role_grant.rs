use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for the role_grants table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbRoleGrant {
    pub org_id: i64,
    pub holder_address: String,
    /// issuer | revoker | verifier
    pub role: String,
    pub active: bool,
    pub granted_at_block: i64,
    pub revoked_at_block: Option<i64>,
    pub on_chain_verified: bool,
    pub last_synced_at: DateTime<Utc>,
}
