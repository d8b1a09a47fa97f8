//! Schema change events

use std::fmt;
use strata_schema::{Definition, Model};
use strata_store::Store;

/// One schema change, as handed to every registered migration
///
/// The structural alteration between `previous` and `definition` is
/// performed by the caller strictly between the `before` and `after`
/// phases.
#[derive(Clone, Copy)]
pub struct SchemaChange<'a> {
    /// Model being altered
    pub model: &'a Model,
    /// Snapshot before the alteration
    pub previous: &'a Definition,
    /// Snapshot after the alteration
    pub definition: &'a Definition,
    /// Backend holding the model's data
    pub store: &'a dyn Store,
}

impl<'a> SchemaChange<'a> {
    /// Create event
    #[must_use]
    pub fn new(
        model: &'a Model,
        previous: &'a Definition,
        definition: &'a Definition,
        store: &'a dyn Store,
    ) -> Self {
        Self {
            model,
            previous,
            definition,
            store,
        }
    }

    /// Collection holding the model's data
    #[inline]
    #[must_use]
    pub fn collection(&self) -> &'a str {
        &self.model.collection_name
    }
}

impl fmt::Debug for SchemaChange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaChange")
            .field("model", &self.model.uid)
            .field("collection", &self.model.collection_name)
            .field("backend", &self.store.backend().as_str())
            .finish_non_exhaustive()
    }
}
