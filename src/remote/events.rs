//! Messages pushed over a remote subscription.

use crate::feed::SnapshotEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Events delivered on a subscription channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteEvent {
    /// A full or incremental change to the collection.
    Snapshot { event: SnapshotEvent },

    /// The remote stopped serving this subscription.
    Dropped { reason: DropReason },
}

impl RemoteEvent {
    pub fn snapshot(event: SnapshotEvent) -> Self {
        RemoteEvent::Snapshot { event }
    }
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Transport or permission error on the remote side.
    Error(String),
    /// Explicitly cancelled by the subscriber.
    Cancelled,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::BufferOverflow => f.write_str("subscription buffer overflow"),
            DropReason::Error(message) => f.write_str(message),
            DropReason::Cancelled => f.write_str("subscription cancelled"),
        }
    }
}
