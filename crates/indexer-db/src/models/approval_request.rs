use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database model for the approval_requests table.
/// approval_count is always recomputed from request_approvals, never
/// incremented in place, so replay converges.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbApprovalRequest {
    pub request_id: i64,
    pub org_id: i64,
    pub action: String,
    pub required_approvals: i32,
    pub approval_count: i32,
    /// pending | executed | rejected
    pub status: String,
    pub initiator: Option<String>,
    pub created_at_block: i64,
    pub on_chain_verified: bool,
    pub last_synced_at: DateTime<Utc>,
}

/// Database model for the request_approvals table, one row per approver
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbApproval {
    pub request_id: i64,
    pub approver_address: String,
    pub approved_at_block: i64,
}
