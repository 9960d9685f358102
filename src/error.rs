//! Errors for the fallible edges of the crate: JSON assets and wire payloads.
//!
//! Evaluation, calibration, mapping and gesture matching never fail; they
//! degrade to a no-op or pass-through instead.

/// Errors that can occur while loading assets or decoding replicated data.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload truncated: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Unknown replication mode tag: {0}")]
    UnknownReplicationMode(u8),

    #[error("Invalid gesture template: {0}")]
    InvalidGesture(String),

    #[error("Invalid skeleton: {0}")]
    InvalidSkeleton(String),

    #[error("Decompression failed: {0}")]
    Decompression(String),
}

pub type Result<T> = std::result::Result<T, Error>;
