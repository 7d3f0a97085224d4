//! Error types for the feed.

use thiserror::Error;

/// Main error type for feed operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("Subscription failed: {0}")]
    SubscriptionFailure(String),

    #[error("Page fetch failed: {0}")]
    FetchFailure(String),

    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    #[error("A page fetch is already in progress")]
    LoadMoreInProgress,

    #[error("No more records to load")]
    NoMoreRecords,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Deserialization(e.to_string())
    }
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
