//! In-memory backend
//!
//! Behaves like a relational or a document backend depending on its
//! [`BackendKind`]: the relational flavour keeps structured values as JSON
//! text and supports transactions, the document flavour keeps them
//! structured and does not. One-shot [`Fault`]s make failure paths
//! reproducible.

use crate::error::StoreError;
use crate::traits::{
    BackendKind, PageRequest, RecordStore, RecordWrite, StagingSpec, StagingStore, WriteMode,
    WriteReport,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use strata_schema::{Record, RecordId};

type Rows = BTreeMap<RecordId, Map<String, Value>>;

/// Failure to raise on the next matching operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Next `fetch_all`
    FetchAll,
    /// Write number `n` (0-based) of the next `bulk_write`
    WriteAt(usize),
    /// Next `insert_staging`
    InsertStaging,
    /// Next `apply_staging`
    ApplyStaging,
    /// Next `drop_staging`
    DropStaging,
}

#[derive(Debug, Default, Clone)]
struct Relation {
    /// `Some` for staging relations, which only keep these columns
    columns: Option<Vec<String>>,
    rows: Rows,
}

/// In-memory [`RecordStore`] + [`StagingStore`]
#[derive(Debug)]
pub struct MemoryStore {
    kind: BackendKind,
    relations: RwLock<BTreeMap<String, Relation>>,
    faults: Mutex<Vec<Fault>>,
}

impl MemoryStore {
    /// Create empty store of the given flavour
    #[must_use]
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            relations: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Relational flavour: JSON text columns, transactional
    #[inline]
    #[must_use]
    pub fn relational() -> Self {
        Self::new(BackendKind::Relational)
    }

    /// Document flavour: structured values, no transactions
    #[inline]
    #[must_use]
    pub fn document() -> Self {
        Self::new(BackendKind::Document)
    }

    /// Create collection if absent
    pub fn create_collection(&self, name: &str) {
        self.relations.write().entry(name.to_string()).or_default();
    }

    /// Create collection if absent and insert records, replacing same ids
    pub fn seed(&self, name: &str, records: impl IntoIterator<Item = Record>) {
        let mut relations = self.relations.write();
        let relation = relations.entry(name.to_string()).or_default();
        for record in records {
            let values = self.encode_all(record.values);
            relation.rows.insert(record.id, values);
        }
    }

    /// Snapshot of a collection in stored form, ordered by id
    #[must_use]
    pub fn records(&self, name: &str) -> Vec<Record> {
        self.relations
            .read()
            .get(name)
            .map(|r| to_records(&r.rows))
            .unwrap_or_default()
    }

    /// Get one record in stored form
    #[must_use]
    pub fn get(&self, name: &str, id: &RecordId) -> Option<Record> {
        let relations = self.relations.read();
        let values = relations.get(name)?.rows.get(id)?;
        Some(Record {
            id: id.clone(),
            values: values.clone(),
        })
    }

    /// Schema alteration: add a null column to every row
    pub fn add_column(&self, name: &str, column: &str) -> Result<(), StoreError> {
        let mut relations = self.relations.write();
        let relation = relations
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))?;
        for values in relation.rows.values_mut() {
            values.entry(column.to_string()).or_insert(Value::Null);
        }
        Ok(())
    }

    /// Schema alteration: remove a column from every row
    pub fn drop_column(&self, name: &str, column: &str) -> Result<(), StoreError> {
        let mut relations = self.relations.write();
        let relation = relations
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))?;
        for values in relation.rows.values_mut() {
            values.remove(column);
        }
        Ok(())
    }

    /// Arm a one-shot fault
    pub fn inject(&self, fault: Fault) {
        self.faults.lock().push(fault);
    }

    fn take_fault(&self, fault: Fault) -> bool {
        let mut faults = self.faults.lock();
        match faults.iter().position(|f| *f == fault) {
            Some(pos) => {
                faults.remove(pos);
                true
            }
            None => false,
        }
    }

    fn take_write_fault(&self) -> Option<usize> {
        let mut faults = self.faults.lock();
        let pos = faults.iter().position(|f| matches!(f, Fault::WriteAt(_)))?;
        match faults.remove(pos) {
            Fault::WriteAt(n) => Some(n),
            _ => None,
        }
    }

    fn encode(&self, value: Value) -> Value {
        match (self.kind, value) {
            (BackendKind::Relational, v @ (Value::Object(_) | Value::Array(_))) => {
                Value::String(v.to_string())
            }
            (_, v) => v,
        }
    }

    fn encode_all(&self, values: Map<String, Value>) -> Map<String, Value> {
        values.into_iter().map(|(k, v)| (k, self.encode(v))).collect()
    }

    fn apply(&self, rows: &mut Rows, collection: &str, write: RecordWrite) -> Result<usize, StoreError> {
        match write {
            RecordWrite::Patch { id, values, unset } => {
                let Some(row) = rows.get_mut(&id) else {
                    return Err(StoreError::RecordNotFound {
                        collection: collection.to_string(),
                        id,
                    });
                };
                for (column, value) in values {
                    row.insert(column, self.encode(value));
                }
                for column in unset {
                    match self.kind {
                        BackendKind::Document => {
                            row.remove(&column);
                        }
                        BackendKind::Relational => {
                            if let Some(value) = row.get_mut(&column) {
                                *value = Value::Null;
                            }
                        }
                    }
                }
                Ok(1)
            }
            RecordWrite::DeleteAll => {
                let removed = rows.len();
                rows.clear();
                Ok(removed)
            }
            RecordWrite::Insert(record) => {
                if rows.contains_key(&record.id) {
                    return Err(StoreError::DuplicateRecord {
                        collection: collection.to_string(),
                        id: record.id,
                    });
                }
                let values = self.encode_all(record.values);
                rows.insert(record.id, values);
                Ok(1)
            }
        }
    }
}

fn to_records(rows: &Rows) -> Vec<Record> {
    rows.iter()
        .map(|(id, values)| Record {
            id: id.clone(),
            values: values.clone(),
        })
        .collect()
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    fn backend(&self) -> BackendKind {
        self.kind
    }

    fn supports_transactions(&self) -> bool {
        self.kind == BackendKind::Relational
    }

    async fn fetch_all(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        if self.take_fault(Fault::FetchAll) {
            return Err(StoreError::Injected("fetch_all"));
        }
        let relations = self.relations.read();
        let relation = relations
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(to_records(&relation.rows))
    }

    async fn bulk_write(
        &self,
        collection: &str,
        writes: Vec<RecordWrite>,
        mode: WriteMode,
    ) -> Result<WriteReport, StoreError> {
        if mode == WriteMode::Atomic && !self.supports_transactions() {
            return Err(StoreError::unsupported(self.kind.as_str(), "atomic writes"));
        }
        let fail_at = self.take_write_fault();
        let total = writes.len();

        let mut relations = self.relations.write();
        let relation = relations
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        let mut report = WriteReport::default();

        match mode {
            WriteMode::Atomic => {
                // work on a copy; dropping it on error is the rollback
                let mut rows = relation.rows.clone();
                for (i, write) in writes.into_iter().enumerate() {
                    if fail_at == Some(i) {
                        return Err(StoreError::Injected("write"));
                    }
                    report.rows_affected += self.apply(&mut rows, collection, write)?;
                    report.applied += 1;
                }
                relation.rows = rows;
            }
            WriteMode::BestEffort => {
                for (i, write) in writes.into_iter().enumerate() {
                    if fail_at == Some(i) {
                        return Err(StoreError::interrupted(i, total, StoreError::Injected("write")));
                    }
                    match self.apply(&mut relation.rows, collection, write) {
                        Ok(n) => {
                            report.rows_affected += n;
                            report.applied += 1;
                        }
                        Err(e) => return Err(StoreError::interrupted(i, total, e)),
                    }
                }
            }
        }
        Ok(report)
    }
}

#[async_trait::async_trait]
impl StagingStore for MemoryStore {
    async fn create_staging(&self, spec: &StagingSpec) -> Result<(), StoreError> {
        let mut relations = self.relations.write();
        if !relations.contains_key(&spec.source) {
            return Err(StoreError::UnknownCollection(spec.source.clone()));
        }
        relations.insert(
            spec.name.clone(),
            Relation {
                columns: Some(spec.columns.clone()),
                rows: Rows::new(),
            },
        );
        Ok(())
    }

    async fn select_locale_page(&self, request: &PageRequest) -> Result<Vec<Record>, StoreError> {
        let relations = self.relations.read();
        let relation = relations
            .get(&request.collection)
            .ok_or_else(|| StoreError::UnknownCollection(request.collection.clone()))?;
        let page = relation
            .rows
            .iter()
            .filter(|(_, values)| {
                values.get("locale").and_then(Value::as_str) == Some(request.locale.as_str())
            })
            .skip(request.offset)
            .take(request.limit)
            .map(|(id, values)| Record {
                id: id.clone(),
                values: request
                    .columns
                    .iter()
                    .map(|c| (c.clone(), values.get(c).cloned().unwrap_or(Value::Null)))
                    .collect(),
            })
            .collect();
        Ok(page)
    }

    async fn insert_staging(
        &self,
        name: &str,
        rows: &[Record],
        chunk_size: usize,
    ) -> Result<usize, StoreError> {
        if self.take_fault(Fault::InsertStaging) {
            return Err(StoreError::Injected("insert_staging"));
        }
        let mut relations = self.relations.write();
        let relation = relations
            .get_mut(name)
            .filter(|r| r.columns.is_some())
            .ok_or_else(|| StoreError::UnknownStaging(name.to_string()))?;
        let columns = relation.columns.clone().unwrap_or_default();

        let mut inserted = 0;
        for chunk in rows.chunks(chunk_size.max(1)) {
            for row in chunk {
                let values = self.encode_all(row.pick(&columns));
                // the correlated update reads the first staged row per id
                relation.rows.entry(row.id.clone()).or_insert(values);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn apply_staging(&self, spec: &StagingSpec) -> Result<usize, StoreError> {
        if self.take_fault(Fault::ApplyStaging) {
            return Err(StoreError::Injected("apply_staging"));
        }
        let mut relations = self.relations.write();
        let staged = relations
            .get(&spec.name)
            .filter(|r| r.columns.is_some())
            .map(|r| r.rows.clone())
            .ok_or_else(|| StoreError::UnknownStaging(spec.name.clone()))?;
        let source = relations
            .get_mut(&spec.source)
            .ok_or_else(|| StoreError::UnknownCollection(spec.source.clone()))?;

        let mut updated = 0;
        for (id, values) in staged {
            if let Some(row) = source.rows.get_mut(&id) {
                for column in &spec.columns {
                    row.insert(
                        column.clone(),
                        values.get(column).cloned().unwrap_or(Value::Null),
                    );
                }
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn drop_staging(&self, name: &str) -> Result<(), StoreError> {
        if self.take_fault(Fault::DropStaging) {
            return Err(StoreError::Injected("drop_staging"));
        }
        self.relations.write().remove(name);
        Ok(())
    }

    async fn relation_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.relations.read().contains_key(name))
    }
}
