//! Locale field consolidation migration
//!
//! When attributes of a localized model stop being localized, every member
//! of a localization group must end up with the same value for them: the
//! value held by the group's highest priority member.
//!
//! Locales are walked default first, then by code. For each locale, rows
//! are read in pages ordered by id. A row whose group has siblings and no
//! member in an already processed locale broadcasts its values to every
//! sibling through a staging relation. One correlated update then copies
//! the staged values back, and the staging relation is dropped whatever
//! happened before.

use crate::config::EngineConfig;
use crate::context::MigrationContext;
use crate::detect::localization_demotion;
use crate::error::{ConfigError, MigrationError};
use crate::event::SchemaChange;
use crate::locales::{LocaleDirectory, Localization};
use crate::migration::Migration;
use std::collections::BTreeSet;
use std::sync::Arc;
use strata_schema::{decode_localizations, sort_by_priority, Locale, Record};
use strata_store::{PageRequest, StagingSpec, Store};

/// Context key and id of [`LocaleFieldMigration`]
pub const LOCALE_MIGRATION_ID: &str = "i18n-field-migration";

const LOCALE: &str = "locale";
const LOCALIZATIONS: &str = "localizations";

/// Locale codes whose rows have all been staged
///
/// Grows monotonically during a run. A group with a member in a processed
/// locale has already contributed its values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedLocales {
    codes: BTreeSet<String>,
}

impl ProcessedLocales {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a locale as processed
    pub fn mark(&mut self, code: impl Into<String>) {
        self.codes.insert(code.into());
    }

    /// Check one locale
    #[inline]
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Check if any of `codes` was processed
    pub fn intersects<'a>(&self, mut codes: impl Iterator<Item = &'a str>) -> bool {
        codes.any(|code| self.contains(code))
    }

    /// Number of processed locales
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Check if nothing was processed yet
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Staging rows for one page of a locale
///
/// Each eligible row yields one staging row per sibling, keyed by the
/// sibling's id and holding the row's values for `attributes`.
pub fn broadcast(
    page: &[Record],
    locale: &str,
    processed: &ProcessedLocales,
    attributes: &[String],
) -> Result<Vec<Record>, MigrationError> {
    let mut staged = Vec::new();
    for row in page {
        let group = decode_localizations(row.get(LOCALIZATIONS))?;
        if group.len() <= 1 || processed.intersects(group.iter().map(|m| m.locale.as_str())) {
            continue;
        }
        let values = row.pick(attributes);
        staged.extend(
            group
                .into_iter()
                .filter(|member| member.locale != locale)
                .map(|member| Record {
                    id: member.id,
                    values: values.clone(),
                }),
        );
    }
    Ok(staged)
}

/// Demoted-attribute consolidation migration for localized models
pub struct LocaleFieldMigration {
    config: EngineConfig,
    locales: Arc<dyn LocaleDirectory>,
    localization: Arc<dyn Localization>,
}

impl LocaleFieldMigration {
    /// Create migration
    ///
    /// # Errors
    /// `ConfigError::Invalid` when `config` does not validate; a zero
    /// page size would never advance through a locale.
    pub fn new(
        config: EngineConfig,
        locales: Arc<dyn LocaleDirectory>,
        localization: Arc<dyn Localization>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            locales,
            localization,
        })
    }

    /// Locales in migration priority order
    async fn ordered_locales(&self) -> Result<Vec<Locale>, MigrationError> {
        let locales = self.locales.find().await?;
        let mut locales = self.locales.set_is_default(locales).await?;
        sort_by_priority(&mut locales);
        Ok(locales)
    }

    /// Create, populate and apply the staging relation
    async fn stage_and_apply(
        &self,
        store: &dyn Store,
        spec: &StagingSpec,
        locales: &[Locale],
    ) -> Result<usize, MigrationError> {
        let staging = |e| MigrationError::staging(LOCALE_MIGRATION_ID, e);
        store.create_staging(spec).await.map_err(staging)?;

        let mut columns = spec.columns.clone();
        for extra in [LOCALE, LOCALIZATIONS] {
            if !columns.iter().any(|c| c == extra) {
                columns.push(extra.to_string());
            }
        }

        let batch_size = self.config.batch_size;
        let mut processed = ProcessedLocales::new();
        for locale in locales {
            let mut offset = 0;
            loop {
                let request = PageRequest {
                    collection: spec.source.clone(),
                    locale: locale.code.clone(),
                    columns: columns.clone(),
                    offset,
                    limit: batch_size,
                };
                let page = store.select_locale_page(&request).await.map_err(staging)?;
                let rows = broadcast(&page, &locale.code, &processed, &spec.columns)?;
                if !rows.is_empty() {
                    store
                        .insert_staging(&spec.name, &rows, self.config.insert_chunk_size)
                        .await
                        .map_err(staging)?;
                }
                tracing::debug!(
                    migration = LOCALE_MIGRATION_ID,
                    locale = %locale.code,
                    offset,
                    fetched = page.len(),
                    staged = rows.len(),
                    "staged batch"
                );
                if page.len() < batch_size {
                    break;
                }
                offset += batch_size;
            }
            processed.mark(locale.code.as_str());
        }

        store.apply_staging(spec).await.map_err(staging)
    }
}

impl std::fmt::Debug for LocaleFieldMigration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocaleFieldMigration")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Migration for LocaleFieldMigration {
    fn id(&self) -> &str {
        LOCALE_MIGRATION_ID
    }

    /// Nothing to capture: demoted columns survive the alteration
    async fn before(
        &self,
        _event: &SchemaChange<'_>,
        _ctx: &mut MigrationContext,
    ) -> Result<(), MigrationError> {
        Ok(())
    }

    async fn after(
        &self,
        event: &SchemaChange<'_>,
        _ctx: &mut MigrationContext,
    ) -> Result<(), MigrationError> {
        let Some(attributes) = localization_demotion(
            event.model,
            event.previous,
            event.definition,
            self.localization.as_ref(),
        ) else {
            return Ok(());
        };
        let collection = event.collection();
        tracing::info!(
            migration = LOCALE_MIGRATION_ID,
            collection,
            attributes = ?attributes,
            "consolidating demoted attributes"
        );

        let locales = self.ordered_locales().await?;
        let spec = StagingSpec::new(self.config.staging_relation.clone(), collection, attributes);

        let outcome = self.stage_and_apply(event.store, &spec, &locales).await;
        let cleanup = event.store.drop_staging(&spec.name).await;

        match (outcome, cleanup) {
            (Ok(updated), Ok(())) => {
                tracing::info!(
                    migration = LOCALE_MIGRATION_ID,
                    collection,
                    updated,
                    "consolidated demoted attributes"
                );
                Ok(())
            }
            (Ok(_), Err(source)) => {
                tracing::error!(
                    migration = LOCALE_MIGRATION_ID,
                    relation = %spec.name,
                    error = %source,
                    "failed to drop staging relation"
                );
                Err(MigrationError::Cleanup {
                    relation: spec.name,
                    source,
                })
            }
            (Err(err), Ok(())) => {
                tracing::error!(
                    migration = LOCALE_MIGRATION_ID,
                    collection,
                    error = %err,
                    "consolidation failed"
                );
                Err(err)
            }
            (Err(err), Err(source)) => {
                tracing::error!(
                    migration = LOCALE_MIGRATION_ID,
                    collection,
                    error = %err,
                    cleanup = %source,
                    "consolidation failed and staging relation was left behind"
                );
                Err(err)
            }
        }
    }
}
