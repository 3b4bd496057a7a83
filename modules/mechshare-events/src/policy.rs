//! Dedup decision for a single (subject, actor, kind) key.

use chrono::{DateTime, Duration, Utc};

use crate::types::InteractionEvent;

pub const DEFAULT_DEDUP_WINDOW_SECS: i64 = 5 * 60;

/// What the recorder should do with an incoming interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The latest event is still inside the window; hand it back.
    Reuse(InteractionEvent),
    CreateNew,
}

/// Pure window check. Holds no state beyond the window length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupPolicy {
    window: Duration,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            window: Duration::seconds(DEFAULT_DEDUP_WINDOW_SECS),
        }
    }
}

impl DedupPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Reuse when `now - latest.occurred_at < window`, create otherwise.
    ///
    /// An event stamped after `now` (clock skew between app servers) has a
    /// negative age and is reused.
    pub fn decide(&self, latest: Option<InteractionEvent>, now: DateTime<Utc>) -> Decision {
        match latest {
            Some(event) if now - event.occurred_at < self.window => Decision::Reuse(event),
            _ => Decision::CreateNew,
        }
    }
}
