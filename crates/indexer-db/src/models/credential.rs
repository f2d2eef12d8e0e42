use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for the credentials table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbCredential {
    pub token_id: i64,
    pub org_id: i64,
    pub owner_address: String,
    pub schema_hash: Option<String>,
    pub revoked: bool,
    pub revocation_reason: Option<String>,
    pub issued_at_block: i64,
    pub revoked_at_block: Option<i64>,
    pub on_chain_verified: bool,
    pub last_synced_at: DateTime<Utc>,
}
