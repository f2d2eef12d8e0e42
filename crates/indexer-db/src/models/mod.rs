mod approval_request;
mod credential;
mod organization;
mod pending_transaction;
mod raw_event;
mod role_grant;
mod sync_status;

pub use approval_request::{DbApproval, DbApprovalRequest};
pub use credential::DbCredential;
pub use organization::DbOrganization;
pub use pending_transaction::DbPendingTransaction;
pub use raw_event::{DbRawEvent, EventKey};
pub use role_grant::DbRoleGrant;
pub use sync_status::DbSyncStatus;
