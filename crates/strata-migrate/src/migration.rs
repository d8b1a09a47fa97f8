//! Migration trait

use crate::context::MigrationContext;
use crate::error::MigrationError;
use crate::event::SchemaChange;

/// A two-phase data migration around one structural alteration
///
/// `before` runs while the old shape is still in place and may capture
/// data into the context under [`Migration::id`]. `after` runs once the
/// alteration is applied and rebuilds the data from the context. A
/// migration whose structural signature is absent from the event must do
/// nothing in either phase.
#[async_trait::async_trait]
pub trait Migration: Send + Sync {
    /// Stable identifier, also the migration's context key
    fn id(&self) -> &str;

    /// Pre-alteration phase
    async fn before(
        &self,
        event: &SchemaChange<'_>,
        ctx: &mut MigrationContext,
    ) -> Result<(), MigrationError>;

    /// Post-alteration phase
    async fn after(
        &self,
        event: &SchemaChange<'_>,
        ctx: &mut MigrationContext,
    ) -> Result<(), MigrationError>;
}
