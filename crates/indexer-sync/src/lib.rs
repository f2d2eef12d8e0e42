pub mod engine;
pub mod fetcher;
pub mod orchestrator;
pub mod provider;
pub mod throttle;
pub mod tracker;

pub use engine::SyncEngine;
pub use fetcher::{EventFetcher, PollOutcome};
pub use orchestrator::{OrgScope, SyncOrchestrator, SyncResult, SyncTarget};
pub use provider::{ProviderHealth, ProviderManager};
pub use throttle::Throttle;
pub use tracker::{PendingStatus, PendingTracker, TrackedTransaction};
