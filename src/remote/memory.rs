//! In-process remote collection.
//!
//! Holds documents in memory and broadcasts every change to open
//! subscriptions over bounded channels. A subscriber whose buffer fills up
//! is dropped. Faults can be injected for the next subscribe or fetch.

use crate::error::{FeedError, Result};
use crate::feed::{PageCursor, SnapshotEvent};
use crate::remote::events::{DropReason, RemoteEvent};
use crate::remote::port::{CancelHandle, RemoteCollectionPort, RemoteSubscription};
use crate::types::{sort_value, RawRecord, RecordId, SortKey};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Configuration for a [`MemoryCollection`].
#[derive(Clone, Debug)]
pub struct MemoryCollectionConfig {
    /// Max buffered events per subscriber before it is dropped.
    /// Default: 1000
    pub buffer_size: usize,

    /// Max records in the initial snapshot (None = all).
    pub subscription_limit: Option<usize>,

    /// Field documents are ordered by.
    /// Default: "createdAt"
    pub sort_field: String,
}

impl Default for MemoryCollectionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1000,
            subscription_limit: None,
            sort_field: "createdAt".to_string(),
        }
    }
}

struct Listener {
    sender: Sender<RemoteEvent>,
}

impl Listener {
    /// Returns false if the buffer is full or the receiver is gone.
    fn try_send(&self, event: RemoteEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

type Listeners = Arc<RwLock<HashMap<u64, Listener>>>;

#[derive(Default)]
struct Faults {
    subscribe: Option<String>,
    fetch: Option<String>,
}

/// A push-updating ordered collection kept in memory.
pub struct MemoryCollection {
    config: MemoryCollectionConfig,
    /// Documents by key.
    records: RwLock<HashMap<String, Value>>,
    listeners: Listeners,
    next_listener: AtomicU64,
    faults: Mutex<Faults>,
    cancellations: Arc<AtomicUsize>,
    fetches: AtomicUsize,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::with_config(MemoryCollectionConfig::default())
    }

    pub fn with_config(config: MemoryCollectionConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
            listeners: Arc::new(RwLock::new(HashMap::new())),
            next_listener: AtomicU64::new(1),
            faults: Mutex::new(Faults::default()),
            cancellations: Arc::new(AtomicUsize::new(0)),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Build a collection pre-filled with documents.
    pub fn seeded(config: MemoryCollectionConfig, docs: impl IntoIterator<Item = RawRecord>) -> Self {
        let collection = Self::with_config(config);
        {
            let mut records = collection.records.write();
            for doc in docs {
                records.insert(doc.id, doc.data);
            }
        }
        collection
    }

    // --- Mutations ---

    /// Create or overwrite a document.
    pub fn set(&self, id: impl Into<String>, data: Value) {
        let id = id.into();
        let mut records = self.records.write();
        records.insert(id.clone(), data.clone());
        self.broadcast(RemoteEvent::snapshot(SnapshotEvent::upsert(RawRecord::new(id, data))));
    }

    /// Merge fields into an existing object document. Returns false if absent.
    pub fn update(&self, id: &str, patch: serde_json::Map<String, Value>) -> bool {
        let mut records = self.records.write();
        let data = match records.get_mut(id) {
            Some(Value::Object(existing)) => {
                existing.extend(patch);
                Value::Object(existing.clone())
            }
            _ => return false,
        };
        self.broadcast(RemoteEvent::snapshot(SnapshotEvent::upsert(RawRecord::new(id, data))));
        true
    }

    /// Delete a document. Returns false if absent.
    pub fn remove(&self, id: &str) -> bool {
        let mut records = self.records.write();
        if records.remove(id).is_none() {
            return false;
        }
        self.broadcast(RemoteEvent::snapshot(SnapshotEvent::delete(id)));
        true
    }

    /// Push a fresh full snapshot to every subscriber, as on reconnect.
    pub fn resync(&self) {
        let records = self.records.read();
        let (docs, has_more_upstream) = self.initial_snapshot(&records);
        self.broadcast(RemoteEvent::snapshot(SnapshotEvent::Full {
            records: docs,
            has_more_upstream,
        }));
    }

    // --- Fault injection ---

    /// Make the next `subscribe_ordered` call fail.
    pub fn fail_next_subscribe(&self, message: impl Into<String>) {
        self.faults.lock().subscribe = Some(message.into());
    }

    /// Make the next `fetch_page` call fail.
    pub fn fail_next_fetch(&self, message: impl Into<String>) {
        self.faults.lock().fetch = Some(message.into());
    }

    /// Drop every open subscription with a transport error.
    pub fn fail_subscriptions(&self, message: impl Into<String>) {
        let message = message.into();
        let mut listeners = self.listeners.write();
        for (_, listener) in listeners.drain() {
            let _ = listener.try_send(RemoteEvent::Dropped {
                reason: DropReason::Error(message.clone()),
            });
        }
    }

    // --- Introspection ---

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// How many listeners were unregistered through a cancel handle.
    pub fn cancellation_count(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// How many `fetch_page` calls were made.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    // --- Internals ---

    fn sort_key(&self, id: &str, data: &Value) -> Option<SortKey> {
        let created_at = data.get(&self.config.sort_field).and_then(sort_value)?;
        Some(SortKey {
            created_at,
            id: RecordId::from(id),
        })
    }

    /// Documents in feed order. Documents without a sort key go last.
    fn ordered(&self, records: &HashMap<String, Value>) -> Vec<RawRecord> {
        let mut keyed: Vec<(Option<SortKey>, RawRecord)> = records
            .iter()
            .map(|(id, data)| (self.sort_key(id, data), RawRecord::new(id.clone(), data.clone())))
            .collect();
        keyed.sort_by(|(a, ra), (b, rb)| match (a, b) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => ra.id.cmp(&rb.id),
        });
        keyed.into_iter().map(|(_, raw)| raw).collect()
    }

    fn initial_snapshot(&self, records: &HashMap<String, Value>) -> (Vec<RawRecord>, bool) {
        let mut docs = self.ordered(records);
        let has_more = match self.config.subscription_limit {
            Some(limit) if docs.len() > limit => {
                docs.truncate(limit);
                true
            }
            _ => false,
        };
        (docs, has_more)
    }

    /// Send to every listener, dropping those that cannot keep up.
    fn broadcast(&self, event: RemoteEvent) {
        let mut to_remove = Vec::new();

        {
            let listeners = self.listeners.read();
            for (id, listener) in listeners.iter() {
                if !listener.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut listeners = self.listeners.write();
            for id in to_remove {
                if let Some(listener) = listeners.remove(&id) {
                    debug!(listener = id, "dropping slow subscriber");
                    let _ = listener.try_send(RemoteEvent::Dropped {
                        reason: DropReason::BufferOverflow,
                    });
                }
            }
        }
    }
}

impl Default for MemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteCollectionPort for MemoryCollection {
    fn subscribe_ordered(&self, sort_field: &str) -> Result<RemoteSubscription> {
        if let Some(message) = self.faults.lock().subscribe.take() {
            return Err(FeedError::SubscriptionFailure(message));
        }
        if sort_field != self.config.sort_field {
            return Err(FeedError::SubscriptionFailure(format!(
                "collection is not ordered by '{}'",
                sort_field
            )));
        }

        // Holding the read lock keeps writers out until the snapshot is queued,
        // so no change can slip between the snapshot and registration.
        let records = self.records.read();
        let (docs, has_more_upstream) = self.initial_snapshot(&records);

        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = bounded(self.config.buffer_size.max(1));
        let listener = Listener { sender };
        let snapshot = RemoteEvent::snapshot(SnapshotEvent::Full {
            records: docs,
            has_more_upstream,
        });
        if !listener.try_send(snapshot) {
            return Err(FeedError::SubscriptionFailure(
                "initial snapshot exceeds subscription buffer".to_string(),
            ));
        }
        self.listeners.write().insert(id, listener);
        drop(records);

        let listeners = Arc::clone(&self.listeners);
        let cancellations = Arc::clone(&self.cancellations);
        let cancel = CancelHandle::new(move || {
            if let Some(listener) = listeners.write().remove(&id) {
                let _ = listener.try_send(RemoteEvent::Dropped {
                    reason: DropReason::Cancelled,
                });
            }
            cancellations.fetch_add(1, Ordering::SeqCst);
        });

        Ok(RemoteSubscription {
            events: receiver,
            cancel,
        })
    }

    fn fetch_page(&self, after: Option<&PageCursor>, page_size: usize) -> Result<Vec<RawRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.faults.lock().fetch.take() {
            return Err(FeedError::FetchFailure(message));
        }

        let bound = after.map(PageCursor::key);
        let records = self.records.read();
        let page = self
            .ordered(&records)
            .into_iter()
            .filter(|raw| match (&bound, self.sort_key(&raw.id, &raw.data)) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(bound), Some(key)) => key > *bound,
            })
            .take(page_size)
            .collect();
        Ok(page)
    }
}
