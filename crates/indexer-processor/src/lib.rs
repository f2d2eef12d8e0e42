pub mod backfill;
pub mod decoder;
pub mod handlers;
pub mod projector;

pub use backfill::{Backfill, BackfillReport};
pub use decoder::{decode_raw_event, RegistryEvent};
pub use projector::{ProjectionOutcome, Projector};
