use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Natural dedup key of a raw ledger event. Never reused by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub chain_id: i64,
    pub tx_hash: String,
    pub log_index: i64,
}

/// Database model for the raw_events table
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbRawEvent {
    pub chain_id: i64,
    /// Transaction hash (0x-prefixed hex)
    pub tx_hash: String,
    /// Log index within the block
    pub log_index: i64,
    pub event_name: String,
    pub contract_address: String,
    pub block_number: i64,
    pub block_hash: Option<String>,
    /// Topic hashes as 0x-prefixed hex strings, topic0 first
    pub topics: sqlx::types::Json<Vec<String>>,
    /// ABI-encoded event data (0x-prefixed hex)
    pub data: String,
    pub is_finalized: bool,
    pub confirmation_depth: i64,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub projection_applied: bool,
    pub created_at: DateTime<Utc>,
}

impl DbRawEvent {
    pub fn key(&self) -> EventKey {
        EventKey {
            chain_id: self.chain_id,
            tx_hash: self.tx_hash.clone(),
            log_index: self.log_index,
        }
    }
}
