//! SQLite backend
//!
//! Implements both capability traits with rusqlite (bundled). The
//! connection sits behind a `parking_lot::Mutex`; every trait method runs
//! its SQL synchronously under the lock and never awaits while holding it.
//! Structured values are stored as JSON text.

use crate::error::StoreError;
use crate::traits::{
    BackendKind, PageRequest, RecordStore, RecordWrite, StagingSpec, StagingStore, WriteMode,
    WriteReport,
};
use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params, params_from_iter, Connection, Params, Statement};
use serde_json::{Map, Value};
use std::path::Path;
use strata_schema::{Record, RecordId};

// ============================================================================
// Value helpers
// ============================================================================

/// Quote an identifier for interpolation into SQL
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Convert a `serde_json::Value` to a `rusqlite::types::Value` for query params
fn json_to_sql(v: &Value) -> rusqlite::types::Value {
    match v {
        Value::Null => rusqlite::types::Value::Null,
        Value::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                rusqlite::types::Value::Integer(i)
            } else {
                rusqlite::types::Value::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => rusqlite::types::Value::Text(s.clone()),
        // Arrays and objects stored as JSON text
        other => rusqlite::types::Value::Text(other.to_string()),
    }
}

fn id_to_sql(id: &RecordId) -> rusqlite::types::Value {
    match id {
        RecordId::Int(i) => rusqlite::types::Value::Integer(*i),
        RecordId::Text(s) => rusqlite::types::Value::Text(s.clone()),
    }
}

fn sql_to_json(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
    }
}

/// Bound parameters per statement (`SQLITE_MAX_VARIABLE_NUMBER` since 3.32)
const MAX_VARIABLES: usize = 32_766;

/// Rows per multi-row insert, kept under [`MAX_VARIABLES`]
fn rows_per_statement(chunk_size: usize, width: usize) -> usize {
    chunk_size.clamp(1, (MAX_VARIABLES / width.max(1)).max(1))
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Run a query and turn every row into a [`Record`]
fn read_records<P: Params>(stmt: &mut Statement<'_>, params: P) -> Result<Vec<Record>, StoreError> {
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut object = Map::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            object.insert(name.clone(), sql_to_json(row.get_ref(i)?));
        }
        records.push(Record::from_object(object)?);
    }
    Ok(records)
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn table_columns(conn: &Connection, name: &str) -> Result<Vec<String>, StoreError> {
    let stmt = conn.prepare(&format!("SELECT * FROM {} LIMIT 0", quote_ident(name)))?;
    Ok(stmt.column_names().into_iter().map(String::from).collect())
}

fn apply_write(conn: &Connection, collection: &str, write: &RecordWrite) -> Result<usize, StoreError> {
    let table = quote_ident(collection);
    match write {
        RecordWrite::Patch { id, values, unset } => {
            let cleared = if unset.is_empty() {
                Vec::new()
            } else {
                let existing = table_columns(conn, collection)?;
                unset
                    .iter()
                    .filter(|c| existing.contains(*c) && !values.contains_key(c.as_str()))
                    .map(|c| format!("{} = NULL", quote_ident(c)))
                    .collect()
            };
            let assignments = values
                .keys()
                .map(|c| format!("{} = ?", quote_ident(c)))
                .chain(cleared)
                .collect::<Vec<_>>();
            let assignments = if assignments.is_empty() {
                "\"id\" = \"id\"".to_string()
            } else {
                assignments.join(", ")
            };
            let sql = format!("UPDATE {table} SET {assignments} WHERE \"id\" = ?");
            let params = values
                .values()
                .map(json_to_sql)
                .chain(std::iter::once(id_to_sql(id)));
            let changed = conn.execute(&sql, params_from_iter(params))?;
            if changed == 0 {
                return Err(StoreError::RecordNotFound {
                    collection: collection.to_string(),
                    id: id.clone(),
                });
            }
            Ok(changed)
        }
        RecordWrite::DeleteAll => Ok(conn.execute(&format!("DELETE FROM {table}"), [])?),
        RecordWrite::Insert(record) => {
            let columns = std::iter::once("id")
                .chain(record.values.keys().map(String::as_str))
                .map(quote_ident)
                .collect::<Vec<_>>();
            let placeholders = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders})",
                columns.join(", ")
            );
            let params = std::iter::once(id_to_sql(&record.id))
                .chain(record.values.values().map(json_to_sql));
            Ok(conn.execute(&sql, params_from_iter(params))?)
        }
    }
}

// ============================================================================
// SqliteStore
// ============================================================================

/// SQLite [`RecordStore`] + [`StagingStore`]
///
/// Every collection is a table with an `id` primary key column.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a file-backed SQLite database
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open an in-memory SQLite database (useful for tests)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wrap an existing connection
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run raw SQL statements (schema alteration, seeding)
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(sql)?;
        Ok(())
    }

    fn fetch_all_sync(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let conn = self.conn.lock();
        if !table_exists(&conn, collection)? {
            return Err(StoreError::UnknownCollection(collection.to_string()));
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT * FROM {} ORDER BY \"id\"",
            quote_ident(collection)
        ))?;
        read_records(&mut stmt, [])
    }

    fn bulk_write_sync(
        &self,
        collection: &str,
        writes: &[RecordWrite],
        mode: WriteMode,
    ) -> Result<WriteReport, StoreError> {
        let mut conn = self.conn.lock();
        if !table_exists(&conn, collection)? {
            return Err(StoreError::UnknownCollection(collection.to_string()));
        }
        let mut report = WriteReport::default();
        match mode {
            WriteMode::Atomic => {
                // rolled back on drop unless committed
                let tx = conn.transaction()?;
                for write in writes {
                    report.rows_affected += apply_write(&tx, collection, write)?;
                    report.applied += 1;
                }
                tx.commit()?;
            }
            WriteMode::BestEffort => {
                for (i, write) in writes.iter().enumerate() {
                    match apply_write(&conn, collection, write) {
                        Ok(n) => {
                            report.rows_affected += n;
                            report.applied += 1;
                        }
                        Err(e) => return Err(StoreError::interrupted(i, writes.len(), e)),
                    }
                }
            }
        }
        Ok(report)
    }

    fn create_staging_sync(&self, spec: &StagingSpec) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        if !table_exists(&conn, &spec.source)? {
            return Err(StoreError::UnknownCollection(spec.source.clone()));
        }
        let columns = std::iter::once("id")
            .chain(spec.columns.iter().map(String::as_str))
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        let name = quote_ident(&spec.name);
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {name};
             CREATE TABLE {name} AS SELECT {columns} FROM {} WHERE 0;",
            quote_ident(&spec.source)
        ))?;
        tracing::debug!(staging = %spec.name, source = %spec.source, "created staging table");
        Ok(())
    }

    fn select_locale_page_sync(&self, request: &PageRequest) -> Result<Vec<Record>, StoreError> {
        let conn = self.conn.lock();
        let columns = std::iter::once("id")
            .chain(
                request
                    .columns
                    .iter()
                    .map(String::as_str)
                    .filter(|c| *c != "id"),
            )
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {columns} FROM {} WHERE \"locale\" = ?1 ORDER BY \"id\" LIMIT ?2 OFFSET ?3",
            quote_ident(&request.collection)
        ))?;
        read_records(
            &mut stmt,
            params![request.locale, to_i64(request.limit), to_i64(request.offset)],
        )
    }

    fn insert_staging_sync(
        &self,
        name: &str,
        rows: &[Record],
        chunk_size: usize,
    ) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock();
        if !table_exists(&conn, name)? {
            return Err(StoreError::UnknownStaging(name.to_string()));
        }
        let columns: Vec<String> = table_columns(&conn, name)?
            .into_iter()
            .filter(|c| c != "id")
            .collect();
        let column_list = std::iter::once("id")
            .chain(columns.iter().map(String::as_str))
            .map(quote_ident)
            .collect::<Vec<_>>()
            .join(", ");
        let tuple = format!("({})", vec!["?"; columns.len() + 1].join(", "));

        let chunk_size = rows_per_statement(chunk_size, columns.len() + 1);
        let tx = conn.transaction()?;
        let mut inserted = 0;
        for chunk in rows.chunks(chunk_size) {
            let sql = format!(
                "INSERT INTO {} ({column_list}) VALUES {}",
                quote_ident(name),
                vec![tuple.as_str(); chunk.len()].join(", ")
            );
            let params = chunk.iter().flat_map(|row| {
                std::iter::once(id_to_sql(&row.id)).chain(
                    columns
                        .iter()
                        .map(move |c| row.get(c).map_or(rusqlite::types::Value::Null, json_to_sql)),
                )
            });
            inserted += tx.execute(&sql, params_from_iter(params))?;
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn apply_staging_sync(&self, spec: &StagingSpec) -> Result<usize, StoreError> {
        let conn = self.conn.lock();
        if !table_exists(&conn, &spec.name)? {
            return Err(StoreError::UnknownStaging(spec.name.clone()));
        }
        let source = quote_ident(&spec.source);
        let staging = quote_ident(&spec.name);
        let columns = spec
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let target = if spec.columns.len() == 1 {
            columns.clone()
        } else {
            format!("({columns})")
        };
        let sql = format!(
            "UPDATE {source} SET {target} = \
             (SELECT {columns} FROM {staging} AS tmp WHERE tmp.\"id\" = {source}.\"id\") \
             WHERE \"id\" IN (SELECT \"id\" FROM {staging})"
        );
        let updated = conn.execute(&sql, [])?;
        tracing::debug!(staging = %spec.name, source = %spec.source, updated, "applied staging table");
        Ok(updated)
    }

    fn drop_staging_sync(&self, name: &str) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute_batch(&format!("DROP TABLE IF EXISTS {};", quote_ident(name)))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for SqliteStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Relational
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    async fn fetch_all(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        self.fetch_all_sync(collection)
    }

    async fn bulk_write(
        &self,
        collection: &str,
        writes: Vec<RecordWrite>,
        mode: WriteMode,
    ) -> Result<WriteReport, StoreError> {
        self.bulk_write_sync(collection, &writes, mode)
    }
}

#[async_trait::async_trait]
impl StagingStore for SqliteStore {
    async fn create_staging(&self, spec: &StagingSpec) -> Result<(), StoreError> {
        self.create_staging_sync(spec)
    }

    async fn select_locale_page(&self, request: &PageRequest) -> Result<Vec<Record>, StoreError> {
        self.select_locale_page_sync(request)
    }

    async fn insert_staging(
        &self,
        name: &str,
        rows: &[Record],
        chunk_size: usize,
    ) -> Result<usize, StoreError> {
        self.insert_staging_sync(name, rows, chunk_size)
    }

    async fn apply_staging(&self, spec: &StagingSpec) -> Result<usize, StoreError> {
        self.apply_staging_sync(spec)
    }

    async fn drop_staging(&self, name: &str) -> Result<(), StoreError> {
        self.drop_staging_sync(name)
    }

    async fn relation_exists(&self, name: &str) -> Result<bool, StoreError> {
        table_exists(&self.conn.lock(), name)
    }
}
