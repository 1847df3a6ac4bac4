//! Unified error handling for the route-export library.
//!
//! Malformed backend data (missing message columns, bad voice-hint rows)
//! fails fast: it indicates a contract violation upstream. Missing
//! optional data (a segment without `voicehints`) is recovered locally
//! and never surfaces here.

use thiserror::Error;

/// Unified error type for route-export operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    /// The concatenator was handed an empty segment list.
    #[error("cannot concatenate an empty segment list")]
    EmptySegments,

    /// A message table row violates the backend contract.
    #[error("malformed message row {index}: {detail}")]
    MalformedMessage { index: usize, detail: String },

    /// A voice-hint row violates the backend contract.
    #[error("malformed voice hint {index}: {detail}")]
    MalformedVoiceHint { index: usize, detail: String },

    /// The track cannot be rendered as GPX.
    #[error("invalid track: {0}")]
    InvalidTrack(String),

    /// The requested turn-instruction mode has no GPX dialect.
    #[error("unsupported turn-instruction mode {0}")]
    UnsupportedDialect(u8),

    /// A voice-hint dialect was selected for a track without hints.
    #[error("track carries no voice hints")]
    MissingVoiceHints,
}

/// Result type alias for route-export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
