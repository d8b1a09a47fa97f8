//! Testing utilities for the Strata workspace
//!
//! Shared definitions, seeded stores and localization group builders.

#![allow(missing_docs)]

use serde_json::{json, Value};
use strata_schema::{AttributeDescriptor, AttributeType, Definition, Model, Record};
use strata_store::{MemoryStore, SqliteStore, StoreError};
use tracing_subscriber::EnvFilter;

pub const PERMISSION_UID: &str = "strapi::permission";
pub const PERMISSION_COLLECTION: &str = "strapi_permission";
pub const ARTICLE_UID: &str = "api::article.article";
pub const ARTICLE_COLLECTION: &str = "articles";

/// Install a test subscriber honouring `RUST_LOG`; later calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Permission fixtures
// ---------------------------------------------------------------------------

/// Permission definition with the given attributes besides `action`
pub fn permission_definition(attributes: &[&str]) -> Definition {
    attributes.iter().fold(
        Definition::new(PERMISSION_UID, PERMISSION_COLLECTION)
            .with_attribute("action", AttributeDescriptor::new(AttributeType::String)),
        |definition, name| {
            definition.with_attribute(*name, AttributeDescriptor::new(AttributeType::Json))
        },
    )
}

/// Permission definition before the restructuring
pub fn permission_before() -> Definition {
    permission_definition(&["fields"])
}

/// Permission definition after the restructuring
pub fn permission_after() -> Definition {
    permission_definition(&["properties"])
}

pub fn permission_model() -> Model {
    Model::from_definition(&permission_after())
}

pub fn permission_row(id: i64, action: &str, fields: Value) -> Record {
    Record::new(id)
        .with("action", json!(action))
        .with("fields", fields)
}

/// Store of the given flavour seeded with permission rows
pub fn permission_store(store: MemoryStore, rows: impl IntoIterator<Item = Record>) -> MemoryStore {
    store.create_collection(PERMISSION_COLLECTION);
    store.seed(PERMISSION_COLLECTION, rows);
    store
}

/// External alteration: add new attributes, drop removed ones
pub fn apply_alteration(
    store: &MemoryStore,
    previous: &Definition,
    definition: &Definition,
) -> Result<(), StoreError> {
    let collection = &definition.collection_name;
    for name in definition
        .attribute_names()
        .filter(|name| !previous.has_attribute(name))
    {
        store.add_column(collection, name)?;
    }
    for name in previous
        .attribute_names()
        .filter(|name| !definition.has_attribute(name))
    {
        store.drop_column(collection, name)?;
    }
    Ok(())
}

/// SQLite permission table holding `rows` of `(id, action, fields JSON text)`
pub fn sqlite_permissions(rows: &[(i64, &str, &str)]) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    store
        .execute_batch(
            "CREATE TABLE strapi_permission (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action TEXT NOT NULL,
                fields TEXT
             );",
        )
        .unwrap();
    for (id, action, fields) in rows {
        store
            .execute_batch(&format!(
                "INSERT INTO strapi_permission (id, action, fields) VALUES ({id}, '{action}', '{fields}');"
            ))
            .unwrap();
    }
    store
}

// ---------------------------------------------------------------------------
// Localization fixtures
// ---------------------------------------------------------------------------

/// Localized article definition with string attributes and their flags
pub fn article_definition(attributes: &[(&str, bool)]) -> Definition {
    attributes.iter().fold(
        Definition::new(ARTICLE_UID, ARTICLE_COLLECTION).localized(true),
        |definition, (name, localized)| {
            definition.with_attribute(
                *name,
                AttributeDescriptor::new(AttributeType::String).localized(*localized),
            )
        },
    )
}

pub fn article_model() -> Model {
    Model::from_definition(&article_definition(&[]))
}

/// Localization membership list, the record itself included
pub fn group(members: &[(i64, &str)]) -> Value {
    Value::Array(
        members
            .iter()
            .map(|(id, locale)| json!({ "id": id, "locale": locale }))
            .collect(),
    )
}

/// Localized row without attribute values
pub fn localized_row(id: i64, locale: &str, members: &[(i64, &str)]) -> Record {
    Record::new(id)
        .with("locale", json!(locale))
        .with("localizations", group(members))
}

/// Localized article row with a `title` and a `body` of `"body {id}"`
pub fn article_row(id: i64, locale: &str, title: &str, members: &[(i64, &str)]) -> Record {
    localized_row(id, locale, members)
        .with("title", json!(title))
        .with("body", json!(format!("body {id}")))
}

/// SQLite article table with one TEXT column per attribute
pub fn sqlite_articles(attributes: &[&str]) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    let columns: String = attributes
        .iter()
        .map(|name| format!(", \"{name}\" TEXT"))
        .collect();
    store
        .execute_batch(&format!(
            "CREATE TABLE articles (id INTEGER PRIMARY KEY, locale TEXT, localizations TEXT{columns});"
        ))
        .unwrap();
    store
}

/// Insert a localized row into a SQLite article table
pub fn sqlite_insert_row(store: &SqliteStore, record: &Record) {
    let mut columns = vec!["id".to_string()];
    let mut values = vec![record.id.to_string()];
    for (column, value) in &record.values {
        columns.push(format!("\"{column}\""));
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        values.push(format!("'{}'", text.replace('\'', "''")));
    }
    store
        .execute_batch(&format!(
            "INSERT INTO articles ({}) VALUES ({});",
            columns.join(", "),
            values.join(", ")
        ))
        .unwrap();
}

/// Stored value decoded from JSON text when needed
pub fn decoded(value: Option<&Value>) -> Value {
    match value {
        Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or(Value::String(raw.clone())),
        Some(other) => other.clone(),
        None => Value::Null,
    }
}
