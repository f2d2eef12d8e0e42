mod credential;
mod organization;
mod request;
mod role;

pub use credential::CredentialHandler;
pub use organization::OrganizationHandler;
pub use request::RequestHandler;
pub use role::RoleHandler;

use indexer_core::IndexerError;
use indexer_db::DatabaseError;

pub(crate) fn storage(err: DatabaseError) -> IndexerError {
    IndexerError::Storage(err.to_string())
}
