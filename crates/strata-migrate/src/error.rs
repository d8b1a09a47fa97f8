//! Error types for the migration engine
//!
//! Nothing here is retried. Every failure propagates to the caller, which
//! decides whether to abort the whole schema change.

use strata_schema::{RecordId, SchemaError};
use strata_store::StoreError;

/// Main migration error type
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Pre-alteration data could not be read
    #[error("{migration}: capture failed: {source}")]
    Capture {
        /// Failing migration
        migration: String,
        /// Backend failure
        #[source]
        source: StoreError,
    },

    /// Post-alteration rewrite failed and nothing was written
    #[error("{migration}: restore failed: {source}")]
    Restore {
        /// Failing migration
        migration: String,
        /// Backend failure
        #[source]
        source: StoreError,
    },

    /// Post-alteration rewrite stopped halfway on a non-transactional backend
    ///
    /// The collection now holds a mix of old and new shapes.
    #[error(
        "{migration}: restore of '{collection}' interrupted after {applied}/{total} writes, \
         manual intervention required: {source}"
    )]
    PartialRestore {
        /// Failing migration
        migration: String,
        /// Collection left in a mixed shape
        collection: String,
        /// Writes applied before the failure
        applied: usize,
        /// Writes requested
        total: usize,
        /// Failure that stopped the rewrite
        #[source]
        source: StoreError,
    },

    /// Staging relation could not be populated or applied
    #[error("{migration}: staging failed: {source}")]
    Staging {
        /// Failing migration
        migration: String,
        /// Backend failure
        #[source]
        source: StoreError,
    },

    /// Staging relation could not be dropped
    #[error("failed to drop staging relation '{relation}': {source}")]
    Cleanup {
        /// Relation left behind
        relation: String,
        /// Backend failure
        #[source]
        source: StoreError,
    },

    /// Locale directory failure
    #[error("locale directory error: {0}")]
    Locales(#[from] LocaleError),

    /// Stored row had an unexpected shape
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The external schema alteration failed
    #[error("schema alteration failed: {0}")]
    Alteration(#[source] anyhow::Error),

    /// Invalid engine configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MigrationError {
    /// Check if the data was left in a state an operator must repair
    #[inline]
    #[must_use]
    pub fn requires_intervention(&self) -> bool {
        matches!(self, Self::PartialRestore { .. })
    }

    /// Migration that raised the error, if known
    #[must_use]
    pub fn migration(&self) -> Option<&str> {
        match self {
            Self::Capture { migration, .. }
            | Self::Restore { migration, .. }
            | Self::PartialRestore { migration, .. }
            | Self::Staging { migration, .. } => Some(migration),
            _ => None,
        }
    }

    /// Create restore error, keeping partial progress visible
    #[must_use]
    pub fn restore(migration: &str, collection: &str, source: StoreError) -> Self {
        match source {
            StoreError::Partial {
                applied,
                total,
                source,
            } => Self::PartialRestore {
                migration: migration.to_string(),
                collection: collection.to_string(),
                applied,
                total,
                source: *source,
            },
            source => Self::Restore {
                migration: migration.to_string(),
                source,
            },
        }
    }

    /// Create capture error
    pub fn capture(migration: &str, source: impl Into<StoreError>) -> Self {
        Self::Capture {
            migration: migration.to_string(),
            source: source.into(),
        }
    }

    /// Create staging error
    #[must_use]
    pub fn staging(migration: &str, source: StoreError) -> Self {
        Self::Staging {
            migration: migration.to_string(),
            source,
        }
    }
}

/// Locale directory errors
#[derive(Debug, thiserror::Error)]
pub enum LocaleError {
    /// Backing store failure
    #[error("locale store error: {0}")]
    Store(#[from] StoreError),

    /// Stored locale row could not be read
    #[error("malformed locale row {id}: {source}")]
    Malformed {
        /// Row primary key
        id: RecordId,
        /// Decoder failure
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
