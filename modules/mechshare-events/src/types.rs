//! Core types for interaction tracking.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{InteractionError, Result};

/// The interaction stream an event belongs to. Views and downloads are
/// counted and deduplicated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    View,
    Download,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::View => "view",
            EventKind::Download => "download",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = InteractionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "view" => Ok(EventKind::View),
            "download" => Ok(EventKind::Download),
            other => Err(InteractionError::Corrupt(format!(
                "unknown event kind {other:?}"
            ))),
        }
    }
}

/// A recorded view or download. `actor_id` is `None` for anonymous actors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub id: i64,
    pub subject_id: i64,
    pub actor_id: Option<i64>,
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
}

/// Subject and actor ids are positive database keys.
pub fn validate_id(what: &str, id: i64) -> Result<()> {
    if id <= 0 {
        return Err(InteractionError::InvalidKey(format!(
            "{what} must be a positive integer, got {id}"
        )));
    }
    Ok(())
}
