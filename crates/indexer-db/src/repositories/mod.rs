mod approval_request;
mod credential;
mod event_store;
mod organization;
mod pending_transaction;
mod role_grant;
mod sync_status;

pub use approval_request::ApprovalRequestRepository;
pub use credential::CredentialRepository;
pub use event_store::{EventBrowseFilter, EventStoreRepository, UpsertOutcome};
pub use organization::OrganizationRepository;
pub use pending_transaction::PendingTransactionRepository;
pub use role_grant::RoleGrantRepository;
pub use sync_status::SyncStatusRepository;
