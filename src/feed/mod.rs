//! Live ordered feed state.
//!
//! - [`OrderedSet`]: deduplicated records in feed order
//! - [`merge`]: folds snapshot events into a set
//! - [`PaginationCursor`]: the forward-only visible window

mod cursor;
mod merger;
mod ordered_set;

pub use cursor::{advance, PageCursor, PaginationCursor, Window};
pub use merger::{apply, merge, MergeOutcome, MergeReport, SnapshotEvent};
pub use ordered_set::{OrderedSet, Upserted};
