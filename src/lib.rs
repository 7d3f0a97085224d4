//! # Live Feed
//!
//! Keeps an ordered, paginated, filterable view over a remote collection
//! that pushes inserts, edits and removals at any time.
//!
//! ## Core Concepts
//!
//! - **Ordered set**: deduplicated records, newest first, ties by id
//! - **Merging**: full and incremental snapshot events folded into the set
//! - **Window**: the prefix exposed to the consumer, grown by `load_more`
//! - **Filtering**: multi-field match with city relaxation when too few
//!   records match
//!
//! ## Example
//!
//! ```ignore
//! use livefeed::{FeedConfig, FeedController, FilterSpec, MemoryCollection};
//! use std::{sync::Arc, time::Duration};
//!
//! let collection = Arc::new(MemoryCollection::new());
//! let feed = FeedController::new(Arc::clone(&collection), FeedConfig::default())?;
//!
//! feed.subscribe()?;
//! feed.wait_until_settled(Duration::from_secs(5));
//!
//! feed.set_filters(FilterSpec::new().with_city("Ankara").with_category("driver"))?;
//! let visible = feed.get_visible();
//! if visible.relaxed {
//!     println!("no exact matches nearby, showing similar listings");
//! }
//!
//! if feed.has_more() {
//!     feed.load_more()?;
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod feed;
pub mod filter;
pub mod remote;
pub mod types;

// Re-exports
pub use config::{FeedConfig, FieldMapping, StatusRule};
pub use controller::{FeedController, FeedState, FeedStats};
pub use error::{FeedError, Result};
pub use feed::{
    advance, apply, merge, MergeOutcome, MergeReport, OrderedSet, PageCursor, PaginationCursor,
    SnapshotEvent, Upserted, Window,
};
pub use filter::{Facet, FilterEngine, FilterField, FilterResult, FilterSpec};
pub use remote::{
    CancelHandle, DropReason, MemoryCollection, MemoryCollectionConfig, RemoteCollectionPort,
    RemoteEvent, RemoteSubscription,
};
pub use types::{RawRecord, Record, RecordId, SortKey, Timestamp};
