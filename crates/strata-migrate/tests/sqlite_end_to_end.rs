use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use strata_migrate::{
    EngineConfig, I18nPluginOptions, LocaleDirectory, MigrationError, MigrationRunner,
    SchemaChange, StaticLocaleDirectory, StoredLocaleDirectory, STAGING_RELATION,
};
use strata_schema::{Model, RecordId};
use strata_store::{RecordStore, SqliteStore, StagingStore};
use strata_test_utils::{
    article_definition, article_row, decoded, init_tracing, permission_after, permission_before,
    sqlite_articles, sqlite_insert_row, sqlite_permissions, ARTICLE_COLLECTION,
    PERMISSION_COLLECTION,
};

fn runner(config: EngineConfig, locales: Arc<dyn LocaleDirectory>) -> MigrationRunner {
    MigrationRunner::with_defaults(config, locales, Arc::new(I18nPluginOptions)).unwrap()
}

fn english_first() -> Arc<dyn LocaleDirectory> {
    Arc::new(StaticLocaleDirectory::with_default("en", &["en", "fr"]))
}

async fn column(store: &SqliteStore, collection: &str, name: &str) -> Vec<(RecordId, Value)> {
    store
        .fetch_all(collection)
        .await
        .unwrap()
        .into_iter()
        .map(|r| {
            let value = r.get(name).cloned().unwrap_or(Value::Null);
            (r.id, value)
        })
        .collect()
}

#[tokio::test]
async fn permission_example_on_sqlite() {
    init_tracing();
    let store = sqlite_permissions(&[(1, "read", "{\"a\":1}"), (2, "update", "[\"title\"]")]);
    let previous = permission_before();
    let definition = permission_after();
    let model = Model::from_definition(&definition);
    let event = SchemaChange::new(&model, &previous, &definition, &store);

    let handle = &store;
    runner(EngineConfig::default(), english_first())
        .run_with(&event, move || async move {
            handle.execute_batch(
                "ALTER TABLE strapi_permission ADD COLUMN properties TEXT;
                 ALTER TABLE strapi_permission DROP COLUMN fields;",
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let records = store.fetch_all(PERMISSION_COLLECTION).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get("fields"), None);
    assert_eq!(
        decoded(records[0].get("properties")),
        json!({ "fields": { "a": 1 } })
    );
    assert_eq!(
        decoded(records[1].get("properties")),
        json!({ "fields": ["title"] })
    );
}

#[tokio::test]
async fn permission_rewrite_rolls_back_on_sqlite() {
    let store = sqlite_permissions(&[(1, "read", "{}"), (2, "read", "{}"), (3, "read", "{}")]);
    let previous = permission_before();
    let definition = permission_after();
    let model = Model::from_definition(&definition);
    let event = SchemaChange::new(&model, &previous, &definition, &store);

    let handle = &store;
    let err = runner(EngineConfig::default(), english_first())
        .run_with(&event, move || async move {
            handle.execute_batch(
                "ALTER TABLE strapi_permission ADD COLUMN properties TEXT;
                 ALTER TABLE strapi_permission DROP COLUMN fields;
                 DELETE FROM strapi_permission WHERE id = 2;",
            )?;
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Restore { .. }));

    assert_eq!(
        column(&store, PERMISSION_COLLECTION, "properties").await,
        vec![(RecordId::Int(1), Value::Null), (RecordId::Int(3), Value::Null)]
    );
}

fn seed_articles(store: &SqliteStore) {
    let pairs = [(10, 11), (12, 13), (14, 15)];
    for (i, (en, fr)) in pairs.into_iter().enumerate() {
        let group = [(en, "en"), (fr, "fr")];
        sqlite_insert_row(store, &article_row(en, "en", &format!("X{i}"), &group));
        sqlite_insert_row(store, &article_row(fr, "fr", &format!("Y{i}"), &group));
    }
    sqlite_insert_row(store, &article_row(16, "fr", "lonely", &[(16, "fr")]));
}

#[tokio::test]
async fn locale_example_on_sqlite() {
    init_tracing();
    let store = sqlite_articles(&["title", "body"]);
    seed_articles(&store);

    let previous = article_definition(&[("title", true), ("body", true)]);
    let definition = article_definition(&[("title", false), ("body", true)]);
    let model = Model::from_definition(&definition);
    let event = SchemaChange::new(&model, &previous, &definition, &store);

    let config = EngineConfig::default().with_batch_size(2).with_insert_chunk_size(2);
    runner(config, english_first())
        .run_with(&event, || async { Ok(()) })
        .await
        .unwrap();

    let titles = column(&store, ARTICLE_COLLECTION, "title").await;
    let expected: Vec<_> = [
        (10, "X0"),
        (11, "X0"),
        (12, "X1"),
        (13, "X1"),
        (14, "X2"),
        (15, "X2"),
        (16, "lonely"),
    ]
    .into_iter()
    .map(|(id, title)| (RecordId::Int(id), json!(title)))
    .collect();
    assert_eq!(titles, expected);
    assert!(!store.relation_exists(STAGING_RELATION).await.unwrap());

    let bodies = column(&store, ARTICLE_COLLECTION, "body").await;
    assert_eq!(bodies[1], (RecordId::Int(11), json!("body 11")));
}

#[tokio::test]
async fn locale_migration_with_stored_locales_on_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("content.db");
    let store = Arc::new(SqliteStore::open(&path).unwrap());
    store
        .execute_batch(
            "CREATE TABLE articles (id INTEGER PRIMARY KEY, locale TEXT, localizations TEXT, title TEXT, body TEXT);
             CREATE TABLE i18n_locales (id INTEGER PRIMARY KEY, code TEXT NOT NULL, name TEXT);
             INSERT INTO i18n_locales (id, code, name) VALUES (1, 'en', 'English'), (2, 'fr', NULL);",
        )
        .unwrap();
    seed_articles(&store);

    let locales = StoredLocaleDirectory::new(store.clone(), "i18n_locales").with_default("fr");
    let previous = article_definition(&[("title", true)]);
    let definition = article_definition(&[("title", false)]);
    let model = Model::from_definition(&definition);
    let event = SchemaChange::new(&model, &previous, &definition, store.as_ref());

    runner(EngineConfig::default().with_batch_size(1), Arc::new(locales))
        .run_with(&event, || async { Ok(()) })
        .await
        .unwrap();

    let reopened = SqliteStore::open(&path).unwrap();
    let titles = column(&reopened, ARTICLE_COLLECTION, "title").await;
    assert_eq!(titles[0], (RecordId::Int(10), json!("Y0")));
    assert_eq!(titles[1], (RecordId::Int(11), json!("Y0")));
    assert_eq!(titles[6], (RecordId::Int(16), json!("lonely")));
    assert!(!reopened.relation_exists(STAGING_RELATION).await.unwrap());
}

#[tokio::test]
async fn permission_fields_column_cleared_when_alteration_keeps_it() {
    let store = sqlite_permissions(&[(1, "read", "{\"a\":1}")]);
    let previous = permission_before();
    let definition = permission_after();
    let model = Model::from_definition(&definition);
    let event = SchemaChange::new(&model, &previous, &definition, &store);

    let handle = &store;
    runner(EngineConfig::default(), english_first())
        .run_with(&event, move || async move {
            handle.execute_batch("ALTER TABLE strapi_permission ADD COLUMN properties TEXT;")?;
            Ok(())
        })
        .await
        .unwrap();

    let records = store.fetch_all(PERMISSION_COLLECTION).await.unwrap();
    assert_eq!(records[0].get("fields"), Some(&Value::Null));
    assert_eq!(
        decoded(records[0].get("properties")),
        json!({ "fields": { "a": 1 } })
    );
}

#[tokio::test]
async fn failed_staging_creation_leaves_no_relation_on_sqlite() {
    init_tracing();
    let store = sqlite_articles(&["title", "body"]);
    seed_articles(&store);
    // leftover from an interrupted run
    store
        .execute_batch(&format!("CREATE TABLE \"{STAGING_RELATION}\" (id INTEGER);"))
        .unwrap();

    // `subtitle` has no column, so the staging SELECT fails
    let previous = article_definition(&[("title", true), ("subtitle", true)]);
    let definition = article_definition(&[("title", true), ("subtitle", false)]);
    let model = Model::from_definition(&definition);
    let event = SchemaChange::new(&model, &previous, &definition, &store);

    let err = runner(EngineConfig::default(), english_first())
        .run_with(&event, || async { Ok(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Staging { .. }), "{err}");
    assert!(!store.relation_exists(STAGING_RELATION).await.unwrap());
}

#[tokio::test]
async fn failed_apply_leaves_no_relation_on_sqlite() {
    let store = sqlite_articles(&["title", "body"]);
    seed_articles(&store);
    store
        .execute_batch(
            "CREATE TRIGGER articles_frozen BEFORE UPDATE ON articles
             BEGIN SELECT RAISE(ABORT, 'articles are frozen'); END;",
        )
        .unwrap();
    let before = column(&store, ARTICLE_COLLECTION, "title").await;

    let previous = article_definition(&[("title", true)]);
    let definition = article_definition(&[("title", false)]);
    let model = Model::from_definition(&definition);
    let event = SchemaChange::new(&model, &previous, &definition, &store);

    let err = runner(EngineConfig::default().with_batch_size(2), english_first())
        .run_with(&event, || async { Ok(()) })
        .await
        .unwrap_err();
    assert!(matches!(err, MigrationError::Staging { .. }), "{err}");
    assert!(!store.relation_exists(STAGING_RELATION).await.unwrap());
    assert_eq!(column(&store, ARTICLE_COLLECTION, "title").await, before);
}
