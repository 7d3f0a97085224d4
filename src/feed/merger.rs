//! Snapshot merging.
//!
//! Folds remote snapshot events into an [`OrderedSet`]. Merging is a pure
//! function of the current set and the event, and applying the same event
//! twice leaves the set as the first application did.

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::feed::ordered_set::{OrderedSet, Upserted};
use crate::types::{RawRecord, Record, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// A change pushed by the remote collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotEvent {
    /// Every record of the subscription (initial load or reconnect).
    Full {
        records: Vec<RawRecord>,
        /// Whether the remote holds older records beyond this snapshot.
        #[serde(default)]
        has_more_upstream: bool,
    },

    /// Insert or replace one record by id.
    Upsert { record: RawRecord },

    /// Remove one record by id.
    Delete { id: RecordId },
}

impl SnapshotEvent {
    pub fn full(records: Vec<RawRecord>) -> Self {
        SnapshotEvent::Full {
            records,
            has_more_upstream: false,
        }
    }

    pub fn upsert(record: RawRecord) -> Self {
        SnapshotEvent::Upsert { record }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        SnapshotEvent::Delete {
            id: RecordId(id.into()),
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, SnapshotEvent::Full { .. })
    }
}

/// What a merge changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeReport {
    pub inserted: usize,
    pub updated: usize,
    /// Pre-merge positions of removed records, ascending.
    pub removed: Vec<usize>,
    /// Records excluded as malformed.
    pub skipped: Vec<FeedError>,
}

impl MergeReport {
    /// Removed records that sat inside the first `window` positions.
    pub fn removed_within(&self, window: usize) -> usize {
        self.removed.iter().filter(|&&pos| pos < window).count()
    }

    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.removed.is_empty()
    }
}

/// Result of a pure merge.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    pub set: OrderedSet,
    pub report: MergeReport,
}

/// Merge `event` into a copy of `current`.
pub fn merge(current: &OrderedSet, event: &SnapshotEvent, config: &FeedConfig) -> MergeOutcome {
    let mut set = current.clone();
    let report = apply(&mut set, event, config);
    MergeOutcome { set, report }
}

/// Merge `event` into `set` in place.
pub fn apply(set: &mut OrderedSet, event: &SnapshotEvent, config: &FeedConfig) -> MergeReport {
    let report = match event {
        SnapshotEvent::Full { records, .. } => replace_all(set, records, config),
        SnapshotEvent::Upsert { record } => upsert_one(set, record, config),
        SnapshotEvent::Delete { id } => {
            let mut report = MergeReport::default();
            if let Some((pos, _)) = set.remove(id) {
                report.removed.push(pos);
            }
            report
        }
    };

    debug!(
        inserted = report.inserted,
        updated = report.updated,
        removed = report.removed.len(),
        skipped = report.skipped.len(),
        len = set.len(),
        "merged snapshot event"
    );

    report
}

/// Validate a raw record, logging and returning the error if malformed.
fn validate(raw: &RawRecord, config: &FeedConfig) -> Result<Record, FeedError> {
    Record::from_raw(raw.clone(), &config.sort_field).map_err(|e| {
        warn!(id = %raw.id, error = %e, "skipping malformed record");
        e
    })
}

fn replace_all(set: &mut OrderedSet, records: &[RawRecord], config: &FeedConfig) -> MergeReport {
    let mut report = MergeReport::default();
    let mut incoming = Vec::with_capacity(records.len());

    for raw in records {
        match validate(raw, config) {
            Ok(record) if config.admits(&record) => incoming.push(record),
            Ok(_) => {}
            Err(e) => report.skipped.push(e),
        }
    }

    let next = OrderedSet::from_records(incoming);
    let kept: HashSet<&RecordId> = next.iter().map(|r| &r.id).collect();

    for (pos, old) in set.iter().enumerate() {
        if !kept.contains(&old.id) {
            report.removed.push(pos);
        }
    }
    for record in next.iter() {
        match set.get_by_id(&record.id) {
            None => report.inserted += 1,
            Some(old) if old != record => report.updated += 1,
            Some(_) => {}
        }
    }

    *set = next;
    report
}

fn upsert_one(set: &mut OrderedSet, raw: &RawRecord, config: &FeedConfig) -> MergeReport {
    let mut report = MergeReport::default();

    let record = match validate(raw, config) {
        Ok(record) => record,
        Err(e) => {
            report.skipped.push(e);
            return report;
        }
    };

    // A record that stops passing the status rule leaves the feed.
    if !config.admits(&record) {
        if let Some((pos, _)) = set.remove(&record.id) {
            report.removed.push(pos);
        }
        return report;
    }

    match set.upsert(record) {
        Upserted::Inserted(_) => report.inserted += 1,
        Upserted::Replaced { .. } => report.updated += 1,
        Upserted::Unchanged(_) => {}
    }
    report
}
