//! Error types for the knowledge store.
//!
//! Storage-layer failures are always surfaced to the direct caller; the
//! ingestion pipeline catches per-batch errors itself and the live-context
//! path encodes "unavailable" as `Option`/empty rather than an error.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("storage I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// Another process already holds the single-instance lock on the index
    /// directory. Raised immediately on `open` rather than waiting.
    #[error("index at {path} is already open in another process")]
    Locked {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported filter kind: {0}")]
    UnsupportedFilter(&'static str),

    #[error("embedding dimension mismatch: store holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("batch size mismatch: {vectors} vectors, {documents} documents")]
    BatchMismatch { vectors: usize, documents: usize },

    #[error("document {id} has empty text")]
    EmptyDocument { id: String },

    #[error("corrupt metadata for document {id}")]
    MetadataCorrupt {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("embedding provider failure: {0}")]
    Embedding(String),
}
