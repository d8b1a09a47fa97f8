//! Strata Store
//!
//! The narrow backend capability interface migrations are written against,
//! plus two backends.
//!
//! # Capabilities
//!
//! - [`RecordStore`]: full scan, bulk write, atomic or best-effort
//! - [`StagingStore`]: paged locale scans and staging relations for one
//!   correlated bulk update
//! - [`Store`]: both, as one trait object
//!
//! # Backends
//!
//! - [`MemoryStore`]: relational or document flavour with fault injection
//! - [`SqliteStore`]: rusqlite, structured values as JSON text
//!
//! # Example
//!
//! ```rust
//! use strata_store::{MemoryStore, RecordStore, RecordWrite, WriteMode};
//! use strata_schema::Record;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), strata_store::StoreError> {
//! let store = MemoryStore::relational();
//! store.seed("things", [Record::new(1).with("name", json!("a"))]);
//!
//! let rows = store.fetch_all("things").await?;
//! store
//!     .bulk_write("things", vec![RecordWrite::DeleteAll], WriteMode::Atomic)
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod memory;
mod sqlite;
mod traits;

pub use error::StoreError;
pub use memory::{Fault, MemoryStore};
pub use sqlite::SqliteStore;
pub use traits::{
    BackendKind, PageRequest, RecordStore, RecordWrite, StagingSpec, StagingStore, Store,
    WriteMode, WriteReport,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
