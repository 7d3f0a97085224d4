//! Feed controller tying the subscription, merging, windowing and filtering
//! together.

use crate::config::FeedConfig;
use crate::error::{FeedError, Result};
use crate::feed::{apply, OrderedSet, PaginationCursor, SnapshotEvent, Window};
use crate::filter::{Facet, FilterEngine, FilterField, FilterResult, FilterSpec};
use crate::remote::{CancelHandle, DropReason, RemoteCollectionPort, RemoteEvent};
use crate::types::Record;
use crossbeam_channel::{Receiver, Select, TryRecvError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Lifecycle of a feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Loading,
    Ready,
    LoadingMore,
    Error(String),
}

impl FeedState {
    pub fn name(&self) -> &'static str {
        match self {
            FeedState::Idle => "idle",
            FeedState::Loading => "loading",
            FeedState::Ready => "ready",
            FeedState::LoadingMore => "loading more",
            FeedState::Error(_) => "error",
        }
    }

    /// Data is loaded and the window is meaningful.
    pub fn is_ready(&self) -> bool {
        matches!(self, FeedState::Ready | FeedState::LoadingMore)
    }

    fn is_live(&self) -> bool {
        matches!(
            self,
            FeedState::Loading | FeedState::Ready | FeedState::LoadingMore
        )
    }
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedState::Error(message) => write!(f, "error: {}", message),
            other => f.write_str(other.name()),
        }
    }
}

/// Counters for the consumer's summary line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Records in the ordered set.
    pub total: usize,
    /// Records inside the window.
    pub window: usize,
    /// Records the consumer sees after filtering.
    pub visible: usize,
    /// Visible records come from a relaxed filter.
    pub relaxed: bool,
}

struct ActiveSubscription {
    events: Receiver<RemoteEvent>,
    cancel: CancelHandle,
}

struct FeedInner {
    state: FeedState,
    set: OrderedSet,
    cursor: PaginationCursor,
    filters: FilterSpec,
    subscription: Option<ActiveSubscription>,
    /// Bumped on every (re)subscribe and close; stale events and fetches
    /// carry an older value and are discarded.
    generation: u64,
    last_error: Option<FeedError>,
}

impl FeedInner {
    fn transition(&mut self, next: FeedState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "feed state change");
            self.state = next;
        }
    }

    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            if subscription.cancel.cancel() {
                debug!(generation = self.generation, "remote listener unregistered");
            }
        }
    }

    /// Records the window may cover. While older pages are still
    /// upstream, this stops at the cursor's boundary.
    fn reachable(&self) -> usize {
        match self.cursor.boundary() {
            Some(boundary) if self.cursor.upstream_has_more() => self.set.count_through(boundary),
            _ => self.set.len(),
        }
    }

    fn invalid(&self, operation: &'static str) -> FeedError {
        FeedError::InvalidState {
            operation,
            state: self.state.name().to_string(),
        }
    }
}

/// Consumer-facing live feed.
///
/// Owns one remote subscription at a time. Remote events are applied in
/// arrival order by [`process_pending`](Self::process_pending) or
/// [`wait_for_event`](Self::wait_for_event); every other call works on the
/// in-memory state. All methods take `&self`, so a controller can be shared
/// between a pump thread and consumers. Events are only ever applied under
/// the state lock, one drain at a time, and no call holds that lock while
/// blocking on the remote.
pub struct FeedController<P: RemoteCollectionPort> {
    port: Arc<P>,
    config: FeedConfig,
    engine: FilterEngine,
    inner: Mutex<FeedInner>,
}

impl<P: RemoteCollectionPort> FeedController<P> {
    pub fn new(port: Arc<P>, config: FeedConfig) -> Result<Self> {
        config.validate()?;
        let engine = FilterEngine::from_config(&config);
        let cursor = PaginationCursor::new(config.page_size);

        Ok(Self {
            port,
            config,
            engine,
            inner: Mutex::new(FeedInner {
                state: FeedState::Idle,
                set: OrderedSet::new(),
                cursor,
                filters: FilterSpec::default(),
                subscription: None,
                generation: 0,
                last_error: None,
            }),
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    // --- Lifecycle ---

    /// Open the remote subscription. Only valid from `Idle`.
    pub fn subscribe(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        if guard.state != FeedState::Idle {
            return Err(guard.invalid("subscribe"));
        }
        self.open(&mut guard)
    }

    /// Drop all loaded data and subscribe again from scratch.
    pub fn refetch(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        info!(from = %guard.state, "refetching feed");
        self.open(&mut guard)
    }

    /// Unregister the listener and return to `Idle`. Safe to call repeatedly.
    pub fn close(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.teardown();
        inner.generation += 1;
        inner.set.clear();
        inner.cursor.reset();
        inner.transition(FeedState::Idle);
    }

    fn open(&self, inner: &mut FeedInner) -> Result<()> {
        inner.teardown();
        inner.generation += 1;
        inner.set.clear();
        inner.cursor.reset();
        inner.last_error = None;
        inner.transition(FeedState::Loading);

        match self.port.subscribe_ordered(&self.config.sort_field) {
            Ok(subscription) => {
                inner.subscription = Some(ActiveSubscription {
                    events: subscription.events,
                    cancel: subscription.cancel,
                });
                Ok(())
            }
            Err(e) => {
                let message = failure_message(e);
                warn!(error = %message, "subscription failed");
                inner.transition(FeedState::Error(message.clone()));
                Err(FeedError::SubscriptionFailure(message))
            }
        }
    }

    // --- Event pump ---

    /// Apply every event already queued on the subscription, without blocking.
    pub fn process_pending(&self) -> usize {
        let mut guard = self.inner.lock();
        self.drain(&mut guard)
    }

    /// Block up to `timeout` until an event is queued, then apply everything
    /// queued. Returns false if nothing arrived.
    ///
    /// The wait happens without the state lock, so other threads can read
    /// the feed or call [`process_pending`](Self::process_pending) in the
    /// meantime. Nothing is received until the lock is taken, which keeps
    /// events in arrival order whichever thread applies them.
    pub fn wait_for_event(&self, timeout: Duration) -> bool {
        let events = match self.inner.lock().subscription.as_ref() {
            Some(sub) => sub.events.clone(),
            None => return false,
        };

        let mut select = Select::new();
        select.recv(&events);
        if select.ready_timeout(timeout).is_err() {
            return false;
        }

        let mut guard = self.inner.lock();
        self.drain(&mut guard);
        true
    }

    /// Pump events until the feed leaves `Loading` or `timeout` elapses.
    /// Returns the state at that point.
    pub fn wait_until_settled(&self, timeout: Duration) -> FeedState {
        let deadline = Instant::now() + timeout;
        loop {
            let state = self.state();
            if state != FeedState::Loading {
                return state;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.wait_for_event(remaining) {
                return self.state();
            }
        }
    }

    fn drain(&self, inner: &mut FeedInner) -> usize {
        let mut applied = 0;
        loop {
            let generation = inner.generation;
            let received = match inner.subscription.as_ref() {
                Some(sub) => sub.events.try_recv(),
                None => break,
            };
            match received {
                Ok(event) => {
                    self.handle_event(inner, generation, event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.handle_disconnect(inner, generation);
                    break;
                }
            }
        }
        applied
    }

    fn handle_event(&self, inner: &mut FeedInner, generation: u64, event: RemoteEvent) {
        if generation != inner.generation {
            debug!(generation, current = inner.generation, "discarding stale remote event");
            return;
        }
        match event {
            RemoteEvent::Snapshot { event } => self.merge_event(inner, event),
            RemoteEvent::Dropped {
                reason: DropReason::Cancelled,
            } => {}
            RemoteEvent::Dropped { reason } => self.fail_subscription(inner, reason.to_string()),
        }
    }

    fn handle_disconnect(&self, inner: &mut FeedInner, generation: u64) {
        if generation == inner.generation {
            self.fail_subscription(inner, "subscription closed".to_string());
        }
    }

    fn fail_subscription(&self, inner: &mut FeedInner, message: String) {
        if !inner.state.is_live() {
            return;
        }
        warn!(error = %message, "subscription failed");
        inner.teardown();
        inner.transition(FeedState::Error(message));
    }

    fn merge_event(&self, inner: &mut FeedInner, event: SnapshotEvent) {
        if !inner.state.is_live() {
            return;
        }

        let report = apply(&mut inner.set, &event, &self.config);
        let upstream = match &event {
            SnapshotEvent::Full {
                has_more_upstream, ..
            } => Some(*has_more_upstream),
            _ => None,
        };

        // A full snapshot is one contiguous run; its tail is where the next
        // upstream page starts.
        if let Some(has_more_upstream) = upstream {
            let tail = inner.set.last().map(Record::sort_key);
            inner.cursor.set_boundary(tail);
            if inner.state == FeedState::Loading {
                let len = inner.set.len();
                let window = inner.cursor.open(len, has_more_upstream);
                info!(records = len, window = window.size, "feed ready");
                inner.transition(FeedState::Ready);
                if !self.config.real_time {
                    inner.teardown();
                }
                return;
            }
            inner.cursor.set_upstream_has_more(has_more_upstream);
        }

        // Only a full snapshot completes the initial load.
        if inner.state == FeedState::Loading {
            return;
        }

        let reachable = inner.reachable();
        inner.cursor.on_merge(&report, reachable);
    }

    // --- Pagination ---

    /// Grow the window by one page, fetching from the remote first when the
    /// local set is used up. Only valid in `Ready` with more to show.
    pub fn load_more(&self) -> Result<Window> {
        let (after, generation) = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            match inner.state {
                FeedState::Ready => {}
                FeedState::LoadingMore => return Err(FeedError::LoadMoreInProgress),
                _ => return Err(inner.invalid("load more")),
            }

            let reachable = inner.reachable();
            if !inner.cursor.has_more(reachable) {
                return Err(FeedError::NoMoreRecords);
            }
            if !inner.cursor.needs_fetch(reachable) {
                let window = inner.cursor.load_more(reachable);
                debug!(window = window.size, total = inner.set.len(), "window advanced");
                return Ok(window);
            }

            inner.transition(FeedState::LoadingMore);
            (inner.cursor.next_page(), inner.generation)
        };

        // The lock is released while the remote is queried; events keep
        // merging and concurrent load_more calls see LoadingMore.
        let fetched = self.port.fetch_page(after.as_ref(), self.config.page_size);

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.generation != generation || inner.state != FeedState::LoadingMore {
            debug!("discarding page fetched before refetch");
            return Err(inner.invalid("load more"));
        }

        match fetched {
            Ok(records) => {
                let fetched_len = records.len();
                let tail = records
                    .iter()
                    .rev()
                    .find_map(|raw| raw.sort_key(&self.config.sort_field));
                for raw in records {
                    let report = apply(&mut inner.set, &SnapshotEvent::upsert(raw), &self.config);
                    let reachable = inner.reachable();
                    inner.cursor.on_merge(&report, reachable);
                }
                if tail.is_some() {
                    inner.cursor.set_boundary(tail);
                }
                inner
                    .cursor
                    .set_upstream_has_more(fetched_len >= self.config.page_size);

                let reachable = inner.reachable();
                let window = inner.cursor.load_more(reachable);
                debug!(
                    fetched = fetched_len,
                    window = window.size,
                    total = inner.set.len(),
                    "page loaded"
                );
                inner.transition(FeedState::Ready);
                Ok(window)
            }
            Err(e) => {
                let error = FeedError::FetchFailure(failure_message(e));
                warn!(error = %error, "page fetch failed");
                inner.last_error = Some(error.clone());
                inner.transition(FeedState::Ready);
                Err(error)
            }
        }
    }

    pub fn has_more(&self) -> bool {
        let guard = self.inner.lock();
        guard.state.is_ready() && guard.cursor.has_more(guard.reachable())
    }

    pub fn window(&self) -> Window {
        let guard = self.inner.lock();
        guard.cursor.window(guard.reachable())
    }

    // --- Filtering ---

    /// Replace the filter. Does not touch the window or the remote.
    pub fn set_filters(&self, spec: FilterSpec) -> Result<()> {
        let mut guard = self.inner.lock();
        if !guard.state.is_ready() {
            return Err(guard.invalid("set filters"));
        }
        debug!(active = spec.is_active(), "filters updated");
        guard.filters = spec;
        Ok(())
    }

    pub fn clear_filters(&self) -> Result<()> {
        self.set_filters(FilterSpec::default())
    }

    pub fn filters(&self) -> FilterSpec {
        self.inner.lock().filters.clone()
    }

    /// The window filtered by the current spec.
    pub fn get_visible(&self) -> FilterResult {
        let guard = self.inner.lock();
        self.engine
            .evaluate(guard.set.prefix(guard.cursor.size()), &guard.filters)
    }

    // --- Introspection ---

    pub fn state(&self) -> FeedState {
        self.inner.lock().state.clone()
    }

    /// Records in the ordered set, loaded but not necessarily visible.
    pub fn len(&self) -> usize {
        self.inner.lock().set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().set.is_empty()
    }

    pub fn records(&self) -> Vec<Record> {
        self.inner.lock().set.as_slice().to_vec()
    }

    /// The most recent page fetch failure, if any.
    pub fn last_error(&self) -> Option<FeedError> {
        self.inner.lock().last_error.clone()
    }

    pub fn take_last_error(&self) -> Option<FeedError> {
        self.inner.lock().last_error.take()
    }

    /// Distinct categories across every loaded record.
    pub fn categories(&self) -> Vec<Facet> {
        let guard = self.inner.lock();
        self.engine.facet(guard.set.as_slice(), FilterField::Category)
    }

    pub fn stats(&self) -> FeedStats {
        let guard = self.inner.lock();
        let window = guard.cursor.size().min(guard.set.len());
        let visible = self.engine.evaluate(guard.set.prefix(window), &guard.filters);
        FeedStats {
            total: guard.set.len(),
            window,
            visible: visible.len(),
            relaxed: visible.relaxed,
        }
    }
}

impl<P: RemoteCollectionPort> Drop for FeedController<P> {
    fn drop(&mut self) {
        self.inner.get_mut().teardown();
    }
}

fn failure_message(error: FeedError) -> String {
    match error {
        FeedError::SubscriptionFailure(message) | FeedError::FetchFailure(message) => message,
        other => other.to_string(),
    }
}
