//! Error types for backend operations

use strata_schema::{RecordId, SchemaError};

/// Errors raised by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Collection/table does not exist
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// Staging relation does not exist
    #[error("unknown staging relation: {0}")]
    UnknownStaging(String),

    /// Patch target does not exist
    #[error("record {id} not found in {collection}")]
    RecordNotFound {
        /// Collection patched
        collection: String,
        /// Missing primary key
        id: RecordId,
    },

    /// Insert target already exists
    #[error("record {id} already exists in {collection}")]
    DuplicateRecord {
        /// Collection inserted into
        collection: String,
        /// Conflicting primary key
        id: RecordId,
    },

    /// Backend cannot perform the requested operation
    #[error("{backend} backend does not support {operation}")]
    Unsupported {
        /// Backend name
        backend: &'static str,
        /// Operation requested
        operation: &'static str,
    },

    /// Best-effort write stopped after some writes were applied
    #[error("write interrupted after {applied}/{total} writes: {source}")]
    Partial {
        /// Writes applied before the failure
        applied: usize,
        /// Writes requested
        total: usize,
        /// Failure that stopped the batch
        #[source]
        source: Box<StoreError>,
    },

    /// Fault injected by a test
    #[error("injected fault: {0}")]
    Injected(&'static str),

    /// SQLite failure
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored row does not match the expected shape
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl StoreError {
    /// Create unsupported operation error
    #[inline]
    #[must_use]
    pub fn unsupported(backend: &'static str, operation: &'static str) -> Self {
        Self::Unsupported { backend, operation }
    }

    /// Wrap a failure of write `applied` (0-based) out of `total`
    ///
    /// Nothing was written when the first write fails, so the bare error is
    /// returned in that case.
    #[must_use]
    pub fn interrupted(applied: usize, total: usize, source: StoreError) -> Self {
        if applied == 0 {
            source
        } else {
            Self::Partial {
                applied,
                total,
                source: Box::new(source),
            }
        }
    }

    /// Check if the collection was left partially written
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial { .. })
    }
}
