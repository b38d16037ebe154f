//! Error types for the Concord library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Concord operations.
///
/// Per-position problems (a dangling relation endpoint, an invalid feature
/// value, a skipped stacked instance) are not errors: they are recorded as
/// [`Diagnostic`](crate::Diagnostic) entries and the run continues. Only
/// conditions that invalidate a whole invocation surface here.
#[derive(Debug, Error)]
pub enum ConcordError {
    /// An input list or document set that must be non-empty was empty.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A span list handed to the aligner was not sorted by begin offset.
    #[error("Unsorted input: {0}")]
    UnsortedInput(String),

    /// The aligner was stepped after both lists were exhausted.
    #[error("Aligner stepped past the end of both lists")]
    AlignerExhausted,

    /// A stored document changed between the caller's read and write.
    #[error("Concurrent modification of '{document}' for annotator '{annotator}'")]
    ConcurrentModification {
        document: String,
        annotator: String,
    },

    /// A requested document does not exist in the store.
    #[error("Document not found: '{document}' for annotator '{annotator}'")]
    NotFound {
        document: String,
        annotator: String,
    },

    /// A merge strategy failed while deciding one configuration set.
    #[error("Strategy '{strategy}' failed at {position}: {message}")]
    Strategy {
        strategy: String,
        position: String,
        message: String,
    },

    /// Error reading or writing a store file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Concord operations.
pub type Result<T> = std::result::Result<T, ConcordError>;
