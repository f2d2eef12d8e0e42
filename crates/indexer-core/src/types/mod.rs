mod event;
mod role;
mod tier;

pub use event::EventKind;
pub use role::{RequestAction, RequestStatus, Role};
pub use tier::{RateTier, SyncMode};
