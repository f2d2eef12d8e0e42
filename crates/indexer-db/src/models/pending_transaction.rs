use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for the pending_transactions table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPendingTransaction {
    pub tx_hash: String,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub org_id: Option<i64>,
    pub initiator: Option<String>,
    /// pending | confirmed | timeout
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
