use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for the singleton sync_status row (id = 'main')
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbSyncStatus {
    pub id: String,
    pub last_synced_block: i64,
    pub finalized_block: i64,
    pub sync_mode: String,
    pub last_full_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}
