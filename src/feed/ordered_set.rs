//! Sorted, deduplicated in-memory record collection.

use crate::types::{Record, RecordId, SortKey, Timestamp};
use std::collections::HashMap;

/// What an upsert did to the set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upserted {
    /// New id, inserted at this position.
    Inserted(usize),
    /// Existing id, replaced. The record may have moved.
    Replaced { from: usize, to: usize },
    /// Existing id with an identical record.
    Unchanged(usize),
}

/// Records in feed order (newest first, ties by id ascending).
///
/// No two elements share an id. Every mutation keeps the order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderedSet {
    records: Vec<Record>,
    /// Id to sort timestamp, for locating a record by id in O(log n).
    index: HashMap<RecordId, Timestamp>,
}

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from records in any order. A later duplicate id wins.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut latest: HashMap<RecordId, Record> = HashMap::new();
        for record in records {
            latest.insert(record.id.clone(), record);
        }

        let mut records: Vec<Record> = latest.into_values().collect();
        records.sort_by(Record::feed_cmp);

        let index = records
            .iter()
            .map(|r| (r.id.clone(), r.created_at))
            .collect();

        Self { records, index }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }

    /// The first `n` records (fewer if the set is shorter).
    pub fn prefix(&self, n: usize) -> &[Record] {
        &self.records[..n.min(self.records.len())]
    }

    pub fn get(&self, position: usize) -> Option<&Record> {
        self.records.get(position)
    }

    pub fn last(&self) -> Option<&Record> {
        self.records.last()
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.index.contains_key(id)
    }

    pub fn get_by_id(&self, id: &RecordId) -> Option<&Record> {
        self.position(id).map(|pos| &self.records[pos])
    }

    /// Current position of a record.
    pub fn position(&self, id: &RecordId) -> Option<usize> {
        let created_at = *self.index.get(id)?;
        let key = SortKey {
            created_at,
            id: id.clone(),
        };
        self.records
            .binary_search_by(|probe| probe.sort_key().cmp(&key))
            .ok()
    }

    /// Insert or replace by id, keeping the record at its sorted position.
    pub fn upsert(&mut self, record: Record) -> Upserted {
        let mut from = None;
        if let Some(pos) = self.position(&record.id) {
            if self.records[pos] == record {
                return Upserted::Unchanged(pos);
            }
            self.records.remove(pos);
            from = Some(pos);
        }

        let key = record.sort_key();
        let to = match self
            .records
            .binary_search_by(|probe| probe.sort_key().cmp(&key))
        {
            Ok(pos) | Err(pos) => pos,
        };

        self.index.insert(record.id.clone(), record.created_at);
        self.records.insert(to, record);

        match from {
            Some(from) => Upserted::Replaced { from, to },
            None => Upserted::Inserted(to),
        }
    }

    /// Remove by id, returning the old position and record.
    pub fn remove(&mut self, id: &RecordId) -> Option<(usize, Record)> {
        let pos = self.position(id)?;
        self.index.remove(id);
        Some((pos, self.records.remove(pos)))
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    /// Number of records sorting at or before `key`.
    pub fn count_through(&self, key: &SortKey) -> usize {
        self.records.partition_point(|r| r.sort_key() <= *key)
    }
}

impl<'a> IntoIterator for &'a OrderedSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
