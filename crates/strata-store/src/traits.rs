//! Backend capability interface
//!
//! Migrations never branch on the concrete backend. They read and write
//! through these traits, and each backend implements them in its own terms.

use crate::error::StoreError;
use serde_json::{Map, Value};
use strata_schema::{Record, RecordId};

/// Storage family of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Tables with scalar columns; structured values kept as JSON text
    Relational,
    /// Documents holding structured values natively
    Document,
}

impl BackendKind {
    /// Backend family name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relational => "relational",
            Self::Document => "document",
        }
    }
}

/// One write of a bulk write
#[derive(Debug, Clone, PartialEq)]
pub enum RecordWrite {
    /// Overwrite the given columns of an existing record
    Patch {
        /// Target primary key
        id: RecordId,
        /// Columns to overwrite
        values: Map<String, Value>,
        /// Keys to clear; document backends remove them, relational
        /// backends set surviving columns to null and skip dropped ones
        unset: Vec<String>,
    },
    /// Remove every record of the collection
    DeleteAll,
    /// Insert a record with its own primary key
    Insert(Record),
}

impl RecordWrite {
    /// Create patch write
    #[inline]
    #[must_use]
    pub fn patch(id: RecordId, values: Map<String, Value>) -> Self {
        Self::Patch {
            id,
            values,
            unset: Vec::new(),
        }
    }

    /// Also clear `columns` when this is a patch
    #[must_use]
    pub fn unsetting<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Self::Patch { unset, .. } = &mut self {
            unset.extend(columns.into_iter().map(Into::into));
        }
        self
    }
}

/// How a bulk write is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// All writes in one transaction, or none
    #[default]
    Atomic,
    /// Writes one by one; a failure leaves earlier writes in place
    BestEffort,
}

/// Outcome of a bulk write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteReport {
    /// Writes applied
    pub applied: usize,
    /// Rows touched (deletes count every removed row)
    pub rows_affected: usize,
}

/// Full-scan and bulk-write capabilities
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Storage family
    fn backend(&self) -> BackendKind;

    /// Whether [`WriteMode::Atomic`] is available
    fn supports_transactions(&self) -> bool;

    /// Read every record of a collection, ordered by primary key
    async fn fetch_all(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    /// Apply writes to a collection
    ///
    /// # Errors
    /// - `StoreError::Unsupported` for `Atomic` on a non-transactional backend
    /// - `StoreError::Partial` when a `BestEffort` batch stops after some
    ///   writes were applied
    async fn bulk_write(
        &self,
        collection: &str,
        writes: Vec<RecordWrite>,
        mode: WriteMode,
    ) -> Result<WriteReport, StoreError>;
}

/// Staging relation shaped `{id, columns}` copied from `source`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSpec {
    /// Staging relation name
    pub name: String,
    /// Primary collection the staging relation mirrors
    pub source: String,
    /// Columns besides `id`
    pub columns: Vec<String>,
}

impl StagingSpec {
    /// Create staging spec
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            columns,
        }
    }
}

/// One page of a locale-filtered scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Collection to scan
    pub collection: String,
    /// Only rows whose `locale` column equals this code
    pub locale: String,
    /// Columns to project besides `id`
    pub columns: Vec<String>,
    /// Rows to skip, in primary key order
    pub offset: usize,
    /// Maximum rows returned
    pub limit: usize,
}

/// Temporary relation capabilities used by bulk correlated updates
#[async_trait::async_trait]
pub trait StagingStore: Send + Sync {
    /// Drop any leftover relation of the same name, then create it empty
    async fn create_staging(&self, spec: &StagingSpec) -> Result<(), StoreError>;

    /// Read one page of rows of a given locale
    async fn select_locale_page(&self, request: &PageRequest) -> Result<Vec<Record>, StoreError>;

    /// Insert rows into a staging relation in chunks of `chunk_size`
    async fn insert_staging(
        &self,
        name: &str,
        rows: &[Record],
        chunk_size: usize,
    ) -> Result<usize, StoreError>;

    /// Overwrite `spec.columns` of every source row whose id is staged
    async fn apply_staging(&self, spec: &StagingSpec) -> Result<usize, StoreError>;

    /// Drop a staging relation if it exists
    async fn drop_staging(&self, name: &str) -> Result<(), StoreError>;

    /// Check if a table/collection/relation exists
    async fn relation_exists(&self, name: &str) -> Result<bool, StoreError>;
}

/// Everything a migration may need from a backend
pub trait Store: RecordStore + StagingStore {}

impl<T: RecordStore + StagingStore> Store for T {}
