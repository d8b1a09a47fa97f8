//! Migration registry and lifecycle runner
//!
//! Provides [`MigrationRunner`], which runs registered migrations around
//! one structural alteration, strictly in registration order.

use crate::config::EngineConfig;
use crate::context::MigrationContext;
use crate::error::{ConfigError, MigrationError};
use crate::event::SchemaChange;
use crate::i18n::LocaleFieldMigration;
use crate::locales::{LocaleDirectory, Localization};
use crate::migration::Migration;
use crate::permissions::PermissionFieldsMigration;
use std::future::Future;
use std::sync::Arc;

/// Outcome of a `before` phase
#[derive(Debug, Default)]
pub struct PhaseSummary {
    /// Migrations whose `before` succeeded
    pub completed: Vec<String>,
    /// Migrations whose `before` failed; their `after` is skipped
    pub failed: Vec<(String, MigrationError)>,
}

impl PhaseSummary {
    /// Check if every migration succeeded
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Ids of the failed migrations
    #[must_use]
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|(id, _)| id.as_str()).collect()
    }
}

/// Ordered set of migrations run around each schema change
///
/// The runner holds no per-run state; the caller supplies a fresh
/// [`MigrationContext`] for each event.
#[derive(Default)]
pub struct MigrationRunner {
    migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRunner {
    /// Create new empty runner
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            migrations: Vec::new(),
        }
    }

    /// Create runner with the permission migration then the locale migration
    pub fn with_defaults(
        config: EngineConfig,
        locales: Arc<dyn LocaleDirectory>,
        localization: Arc<dyn Localization>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut runner = Self::new();
        runner.register(PermissionFieldsMigration::new(&config));
        runner.register(LocaleFieldMigration::new(config, locales, localization)?);
        Ok(runner)
    }

    /// Append a migration
    ///
    /// Returns `false` and ignores the migration if its id is taken, since
    /// ids are context keys.
    pub fn register<M: Migration + 'static>(&mut self, migration: M) -> bool {
        if self.contains(migration.id()) {
            tracing::warn!(migration = migration.id(), "migration already registered");
            return false;
        }
        self.migrations.push(Box::new(migration));
        true
    }

    /// Check if a migration id is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.migrations.iter().any(|m| m.id() == id)
    }

    /// Registered ids in execution order
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.id()).collect()
    }

    /// Get number of registered migrations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    /// Check if runner is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    /// Run every `before`, continuing past failures
    ///
    /// A failing migration's context key is poisoned so its `after` is
    /// skipped.
    pub async fn run_before(
        &self,
        event: &SchemaChange<'_>,
        ctx: &mut MigrationContext,
    ) -> PhaseSummary {
        let mut summary = PhaseSummary::default();
        for migration in &self.migrations {
            let id = migration.id();
            match migration.before(event, ctx).await {
                Ok(()) => summary.completed.push(id.to_string()),
                Err(err) => {
                    tracing::error!(
                        migration = id,
                        collection = %event.model.collection_name,
                        error = %err,
                        "before phase failed, restore will be skipped"
                    );
                    ctx.poison(id);
                    summary.failed.push((id.to_string(), err));
                }
            }
        }
        summary
    }

    /// Run every `after`, stopping at the first failure
    ///
    /// # Errors
    /// The first error raised by a migration's `after`.
    pub async fn run_after(
        &self,
        event: &SchemaChange<'_>,
        ctx: &mut MigrationContext,
    ) -> Result<(), MigrationError> {
        for migration in &self.migrations {
            let id = migration.id();
            if ctx.is_poisoned(id) {
                tracing::warn!(migration = id, "skipping after phase of failed capture");
                continue;
            }
            migration.after(event, ctx).await?;
        }
        Ok(())
    }

    /// Run `before`, the alteration, then `after` with a fresh context
    ///
    /// `alteration` performs the structural change; if it fails, no
    /// `after` runs.
    pub async fn run_with<F, Fut>(
        &self,
        event: &SchemaChange<'_>,
        alteration: F,
    ) -> Result<PhaseSummary, MigrationError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut ctx = MigrationContext::new();
        let summary = self.run_before(event, &mut ctx).await;
        alteration().await.map_err(MigrationError::Alteration)?;
        self.run_after(event, &mut ctx).await?;
        Ok(summary)
    }
}

impl std::fmt::Debug for MigrationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRunner")
            .field("migrations", &self.ids())
            .finish()
    }
}
