//! Multi-field filtering of the visible feed.

mod engine;
mod spec;

pub use engine::{Facet, FilterEngine, FilterResult};
pub use spec::{FilterField, FilterSpec, ALL};
