//! View and download tracking for mechanisms.
//!
//! Interaction events are append-only facts keyed by (subject, actor, kind).
//! Repeat interactions inside the dedup window are absorbed into the most
//! recent event instead of producing a new row. Counts are read straight from
//! the store, never cached.
//!
//! The store is a trait so the same recorder and aggregator run against
//! Postgres in production and an in-process store in tests.

pub mod error;
pub mod likes;
pub mod memory;
pub mod policy;
pub mod recorder;
pub mod stats;
pub mod store;
pub mod types;

pub use error::{InteractionError, Result};
pub use likes::{
    LikedMechanism, LikeOutcome, LikeStore, MemoryLikeStore, PgLikeStore, PopularMechanism,
};
pub use memory::MemoryEventStore;
pub use policy::{Decision, DedupPolicy, DEFAULT_DEDUP_WINDOW_SECS};
pub use recorder::{InteractionRecorder, Recorded};
pub use stats::{InteractionStats, StatsAggregator};
pub use store::{EventStore, PgEventStore};
pub use types::{validate_id, EventKind, InteractionEvent};
