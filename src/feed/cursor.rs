//! Forward-only windowing over the ordered set.

use crate::feed::merger::MergeReport;
use crate::types::{RecordId, SortKey, Timestamp};
use serde::{Deserialize, Serialize};

/// How much of the ordered set is exposed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub size: usize,
    /// No further records locally or upstream.
    pub exhausted: bool,
}

/// Grow a window by one page, clamped to the local set.
pub fn advance(set_len: usize, current: usize, page_size: usize, upstream_has_more: bool) -> Window {
    let size = current.saturating_add(page_size).min(set_len);
    Window {
        size,
        exhausted: size >= set_len && !upstream_has_more,
    }
}

/// Upstream continuation point: `fetch_page` returns records sorting
/// strictly after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    pub created_at: Timestamp,
    pub id: RecordId,
}

impl PageCursor {
    pub fn at(key: &SortKey) -> Self {
        Self {
            created_at: key.created_at,
            id: key.id.clone(),
        }
    }

    pub fn key(&self) -> SortKey {
        SortKey {
            created_at: self.created_at,
            id: self.id.clone(),
        }
    }
}

/// Window state for one subscription.
///
/// The window only grows through [`load_more`](Self::load_more). Inserts
/// never resize it; removals inside it shrink it by one each.
///
/// While upstream has more, the boundary is the last record delivered in
/// one unbroken run (the full snapshot plus every fetched page). Records
/// merged past it are kept but stay outside the window until the pages in
/// between have been fetched, so callers pass the count of records up to
/// the boundary as `set_len`.
#[derive(Clone, Debug)]
pub struct PaginationCursor {
    page_size: usize,
    size: usize,
    upstream_has_more: bool,
    boundary: Option<SortKey>,
}

impl PaginationCursor {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            size: 0,
            upstream_has_more: false,
            boundary: None,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn upstream_has_more(&self) -> bool {
        self.upstream_has_more
    }

    pub fn set_upstream_has_more(&mut self, more: bool) {
        self.upstream_has_more = more;
    }

    pub fn boundary(&self) -> Option<&SortKey> {
        self.boundary.as_ref()
    }

    /// Record the last key delivered contiguously by the remote.
    pub fn set_boundary(&mut self, key: Option<SortKey>) {
        self.boundary = key;
    }

    /// Where the next upstream page starts.
    pub fn next_page(&self) -> Option<PageCursor> {
        self.boundary.as_ref().map(PageCursor::at)
    }

    /// Open the first page over a freshly loaded set.
    pub fn open(&mut self, set_len: usize, upstream_has_more: bool) -> Window {
        self.upstream_has_more = upstream_has_more;
        self.size = self.page_size.min(set_len);
        self.window(set_len)
    }

    pub fn window(&self, set_len: usize) -> Window {
        Window {
            size: self.size,
            exhausted: !self.has_more(set_len),
        }
    }

    pub fn has_more(&self, set_len: usize) -> bool {
        self.size < set_len || self.upstream_has_more
    }

    /// Local data is used up but the remote has more.
    pub fn needs_fetch(&self, set_len: usize) -> bool {
        self.size >= set_len && self.upstream_has_more
    }

    pub fn load_more(&mut self, set_len: usize) -> Window {
        let window = advance(set_len, self.size, self.page_size, self.upstream_has_more);
        self.size = window.size;
        window
    }

    /// Adjust for a merge: removals inside the window shrink it.
    pub fn on_merge(&mut self, report: &MergeReport, set_len: usize) {
        let shrink = report.removed_within(self.size);
        self.size = self.size.saturating_sub(shrink).min(set_len);
    }

    pub fn reset(&mut self) {
        self.size = 0;
        self.upstream_has_more = false;
        self.boundary = None;
    }
}
