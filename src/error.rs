//! Error types for the scprep library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for scprep operations.
///
/// The pipeline is fail-fast: none of these are recoverable mid-run, and
/// all of them terminate the process with a non-zero status.
#[derive(Debug, Error)]
pub enum ScprepError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON (e.g. the ontology mapping file).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the HDF5 library (unreadable store, missing table).
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Input that parsed but violates a structural expectation.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// An id referenced by a downstream step is absent from an index.
    #[error("Missing key '{key}' in {index}")]
    MissingKey { key: String, index: String },

    /// The gene-symbol service is unavailable or returned an
    /// unexpected shape.
    #[error("Gene symbol lookup failed: {0}")]
    Lookup(String),
}

impl ScprepError {
    /// Wrap an IO error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScprepError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for scprep operations.
pub type Result<T> = std::result::Result<T, ScprepError>;
