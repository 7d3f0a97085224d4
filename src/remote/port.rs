//! Interface to the hosted collection.

use crate::error::Result;
use crate::feed::PageCursor;
use crate::remote::events::RemoteEvent;
use crate::types::RawRecord;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// An ordered, push-updating remote collection.
pub trait RemoteCollectionPort: Send + Sync {
    /// Open a subscription ordered by `sort_field`.
    ///
    /// The first event on the stream is a full snapshot.
    fn subscribe_ordered(&self, sort_field: &str) -> Result<RemoteSubscription>;

    /// Fetch up to `page_size` records sorting strictly after `after`.
    fn fetch_page(&self, after: Option<&PageCursor>, page_size: usize) -> Result<Vec<RawRecord>>;
}

impl<P: RemoteCollectionPort + ?Sized> RemoteCollectionPort for Arc<P> {
    fn subscribe_ordered(&self, sort_field: &str) -> Result<RemoteSubscription> {
        (**self).subscribe_ordered(sort_field)
    }

    fn fetch_page(&self, after: Option<&PageCursor>, page_size: usize) -> Result<Vec<RawRecord>> {
        (**self).fetch_page(after, page_size)
    }
}

/// An open subscription: the event stream and its cancel handle.
pub struct RemoteSubscription {
    pub events: Receiver<RemoteEvent>,
    pub cancel: CancelHandle,
}

type CancelFn = Box<dyn FnOnce() + Send>;

/// Unregisters a remote listener.
///
/// Clones share state: the listener is unregistered exactly once no matter
/// how many times or from how many clones `cancel` is called.
#[derive(Clone)]
pub struct CancelHandle {
    action: Arc<Mutex<Option<CancelFn>>>,
}

impl CancelHandle {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Arc::new(Mutex::new(Some(Box::new(action)))),
        }
    }

    /// A handle with nothing to unregister.
    pub fn noop() -> Self {
        Self {
            action: Arc::new(Mutex::new(None)),
        }
    }

    /// Run the unregister action. Returns true only for the call that ran it.
    pub fn cancel(&self) -> bool {
        let action = self.action.lock().take();
        match action {
            Some(action) => {
                action();
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.action.lock().is_none()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
