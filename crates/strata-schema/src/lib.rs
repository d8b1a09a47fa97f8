//! Strata Schema
//!
//! Immutable content-type snapshots and the row shapes the migration engine
//! moves around.
//!
//! # Core Concepts
//!
//! - [`Definition`]: schema of one collection at a point in time
//! - [`AttributeDescriptor`]: one attribute of a definition
//! - [`Model`]: the live handle a schema change event is raised for
//! - [`Record`]: a stored row/document keyed by [`RecordId`]
//! - [`Locale`]: a locale descriptor with its priority ordering
//! - [`LocalizationRef`]: one member of a localization group
//!
//! # Example
//!
//! ```rust
//! use strata_schema::{AttributeDescriptor, AttributeType, Definition};
//!
//! let before = Definition::new("strapi::permission", "strapi_permission")
//!     .with_attribute("fields", AttributeDescriptor::new(AttributeType::Json));
//! let after = Definition::new("strapi::permission", "strapi_permission")
//!     .with_attribute("properties", AttributeDescriptor::new(AttributeType::Json));
//!
//! assert!(before.has_attribute("fields"));
//! assert!(!after.has_attribute("fields"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod attribute;
mod definition;
mod error;
mod locale;
mod record;

pub use attribute::{AttributeDescriptor, AttributeType};
pub use definition::{Definition, I18nOptions, Model, PluginOptions};
pub use error::SchemaError;
pub use locale::{decode_localizations, sort_by_priority, Locale, LocalizationRef};
pub use record::{Record, RecordId};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
