//! Strata Migrate
//!
//! Two-phase data migrations around content-type schema changes.
//!
//! # Lifecycle
//!
//! For each schema change event the caller:
//! 1. runs every migration's `before` while the old shape is in place
//! 2. performs the structural alteration (add/drop columns)
//! 3. runs every migration's `after` against the new shape
//!
//! Data captured in step 1 reaches step 3 only through a per-event
//! [`MigrationContext`]. Applying the alteration before step 1, or running
//! step 3 without it, gives undefined results.
//!
//! # Migrations
//!
//! - [`PermissionFieldsMigration`]: `fields` → `properties.fields` on the
//!   permission model
//! - [`LocaleFieldMigration`]: consolidates attributes demoted from
//!   localized to shared across each localization group
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_migrate::{
//!     EngineConfig, I18nPluginOptions, MigrationRunner, SchemaChange, StaticLocaleDirectory,
//! };
//! use strata_schema::{AttributeDescriptor, AttributeType, Definition, Model, Record};
//! use strata_store::MemoryStore;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), strata_migrate::MigrationError> {
//! let store = MemoryStore::relational();
//! store.seed("strapi_permission", [Record::new(1).with("fields", json!({ "a": 1 }))]);
//!
//! let previous = Definition::new("strapi::permission", "strapi_permission")
//!     .with_attribute("fields", AttributeDescriptor::new(AttributeType::Json));
//! let definition = Definition::new("strapi::permission", "strapi_permission")
//!     .with_attribute("properties", AttributeDescriptor::new(AttributeType::Json));
//! let model = Model::from_definition(&definition);
//!
//! let runner = MigrationRunner::with_defaults(
//!     EngineConfig::default(),
//!     Arc::new(StaticLocaleDirectory::with_default("en", &["en"])),
//!     Arc::new(I18nPluginOptions),
//! )?;
//! let event = SchemaChange::new(&model, &previous, &definition, &store);
//! let handle = &store;
//! runner
//!     .run_with(&event, move || async move {
//!         handle.add_column("strapi_permission", "properties")?;
//!         handle.drop_column("strapi_permission", "fields")?;
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod context;
mod detect;
mod error;
mod event;
mod i18n;
mod locales;
mod migration;
mod permissions;
mod registry;

pub use config::{EngineConfig, RebuildStrategy, PERMISSION_MODEL_UID, STAGING_RELATION};
pub use context::MigrationContext;
pub use detect::{demoted_attributes, localization_demotion, FieldsToProperties};
pub use error::{ConfigError, LocaleError, MigrationError};
pub use event::SchemaChange;
pub use i18n::{broadcast, LocaleFieldMigration, ProcessedLocales, LOCALE_MIGRATION_ID};
pub use locales::{
    I18nPluginOptions, LocaleDirectory, Localization, StaticLocaleDirectory,
    StoredLocaleDirectory, DEFAULT_LOCALE,
};
pub use migration::Migration;
pub use permissions::{PermissionFieldsMigration, PERMISSION_MIGRATION_ID};
pub use registry::{MigrationRunner, PhaseSummary};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
