//! Error types for the population core.
//!
//! Almost everything that can go wrong inside the core — malformed wave
//! segments, stale merge requests, splits of degenerate enemies — degrades
//! locally with a logged warning and never surfaces as an error (see the
//! module docs on [`crate::population`]). `CoreError` covers the few hard
//! API misuses a caller can commit.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Top-level error type for population-core API misuse.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity id does not name a live enemy or lesser enemy.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// Wave lifecycle method called in the wrong state.
    #[error("Invalid wave state: {0}")]
    InvalidWaveState(String),

    /// Config data failed to parse.
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    /// State snapshot failed to encode or decode.
    #[error("Failed to {action} population snapshot: {message}")]
    Snapshot {
        /// Either "serialize" or "deserialize".
        action: &'static str,
        /// Underlying codec error.
        message: String,
    },
}
