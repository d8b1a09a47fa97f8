//! Permission restructuring migration
//!
//! Moves each permission record's `fields` value into a nested
//! `properties.fields` container when the permission model swaps the
//! `fields` attribute for `properties`.
//!
//! `before` captures every record, decoding `fields` from JSON text on
//! relational backends. `after` rewrites the captured records in a single
//! atomic bulk write when the backend supports transactions, and one by
//! one otherwise.

use crate::config::{EngineConfig, RebuildStrategy};
use crate::context::MigrationContext;
use crate::detect::{FieldsToProperties, FIELDS, PROPERTIES};
use crate::error::MigrationError;
use crate::event::SchemaChange;
use crate::migration::Migration;
use serde_json::{Map, Value};
use strata_schema::Record;
use strata_store::{BackendKind, RecordWrite, WriteMode};

/// Context key and id of [`PermissionFieldsMigration`]
pub const PERMISSION_MIGRATION_ID: &str = "permissions-fields-to-properties";

/// Records captured before the alteration
#[derive(Debug, Clone, PartialEq)]
struct Captured(Vec<Record>);

/// `fields` → `properties.fields` migration of the permission model
#[derive(Debug, Clone)]
pub struct PermissionFieldsMigration {
    detector: FieldsToProperties,
    rebuild: RebuildStrategy,
}

impl PermissionFieldsMigration {
    /// Create migration from engine configuration
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            detector: FieldsToProperties::new(config.permission_model_uid.clone()),
            rebuild: config.rebuild,
        }
    }

    fn applies(&self, event: &SchemaChange<'_>) -> bool {
        self.detector
            .applies(event.previous, event.definition, &event.model.uid)
    }

    fn writes(&self, records: Vec<Record>) -> Vec<RecordWrite> {
        let reshaped = records.into_iter().map(reshape);
        match self.rebuild {
            RebuildStrategy::PatchInPlace => reshaped
                .map(|record| {
                    let mut values = Map::new();
                    if let Some(properties) = record.values.get(PROPERTIES) {
                        values.insert(PROPERTIES.to_string(), properties.clone());
                    }
                    // document stores keep undeclared keys through the alteration
                    RecordWrite::patch(record.id, values).unsetting([FIELDS])
                })
                .collect(),
            RebuildStrategy::Replace => std::iter::once(RecordWrite::DeleteAll)
                .chain(reshaped.map(RecordWrite::Insert))
                .collect(),
        }
    }
}

/// Move `fields` under a `properties` container
fn reshape(mut record: Record) -> Record {
    let fields = record.remove(FIELDS).unwrap_or(Value::Null);
    let mut properties = Map::new();
    properties.insert(FIELDS.to_string(), fields);
    record.insert(PROPERTIES, Value::Object(properties));
    record
}

#[async_trait::async_trait]
impl Migration for PermissionFieldsMigration {
    fn id(&self) -> &str {
        PERMISSION_MIGRATION_ID
    }

    async fn before(
        &self,
        event: &SchemaChange<'_>,
        ctx: &mut MigrationContext,
    ) -> Result<(), MigrationError> {
        if !self.applies(event) {
            return Ok(());
        }
        let collection = event.collection();
        let mut records = event
            .store
            .fetch_all(collection)
            .await
            .map_err(|e| MigrationError::capture(PERMISSION_MIGRATION_ID, e))?;

        if event.store.backend() == BackendKind::Relational {
            for record in &mut records {
                record
                    .decode_column(FIELDS)
                    .map_err(|e| MigrationError::capture(PERMISSION_MIGRATION_ID, e))?;
            }
        }

        tracing::info!(
            migration = PERMISSION_MIGRATION_ID,
            collection,
            captured = records.len(),
            "captured permission records"
        );
        ctx.insert(PERMISSION_MIGRATION_ID, Captured(records));
        Ok(())
    }

    async fn after(
        &self,
        event: &SchemaChange<'_>,
        ctx: &mut MigrationContext,
    ) -> Result<(), MigrationError> {
        if !self.applies(event) {
            return Ok(());
        }
        let Some(Captured(records)) = ctx.take::<Captured>(PERMISSION_MIGRATION_ID) else {
            tracing::warn!(
                migration = PERMISSION_MIGRATION_ID,
                "nothing captured, skipping rewrite"
            );
            return Ok(());
        };
        if records.is_empty() {
            return Ok(());
        }

        let collection = event.collection();
        let total = records.len();
        let mode = if event.store.supports_transactions() {
            WriteMode::Atomic
        } else {
            WriteMode::BestEffort
        };
        let report = event
            .store
            .bulk_write(collection, self.writes(records), mode)
            .await
            .map_err(|e| {
                let err = MigrationError::restore(PERMISSION_MIGRATION_ID, collection, e);
                tracing::error!(
                    migration = PERMISSION_MIGRATION_ID,
                    collection,
                    error = %err,
                    "permission rewrite failed"
                );
                err
            })?;

        tracing::info!(
            migration = PERMISSION_MIGRATION_ID,
            collection,
            records = total,
            rows = report.rows_affected,
            rebuild = ?self.rebuild,
            atomic = mode == WriteMode::Atomic,
            "rewrote permission records"
        );
        Ok(())
    }
}
