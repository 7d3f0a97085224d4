//! The remote collection a feed subscribes to.
//!
//! [`RemoteCollectionPort`] is the seam to the hosted store: an ordered
//! subscription delivering [`RemoteEvent`]s plus a one-shot paged fetch.
//! [`MemoryCollection`] implements it in process.
//!
//! # Example
//!
//! ```ignore
//! let collection = MemoryCollection::new();
//! let sub = collection.subscribe_ordered("createdAt")?;
//!
//! loop {
//!     match sub.events.recv() {
//!         Ok(RemoteEvent::Snapshot { event }) => println!("change: {:?}", event),
//!         Ok(RemoteEvent::Dropped { reason }) => break,
//!         Err(_) => break,
//!     }
//! }
//! sub.cancel.cancel();
//! ```

mod events;
mod memory;
mod port;

pub use events::{DropReason, RemoteEvent};
pub use memory::{MemoryCollection, MemoryCollectionConfig};
pub use port::{CancelHandle, RemoteCollectionPort, RemoteSubscription};
