use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};
use strata_schema::{Record, RecordId};
use strata_store::{
    Fault, MemoryStore, PageRequest, RecordStore, RecordWrite, StagingSpec, StagingStore,
    StoreError, WriteMode,
};

fn values(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

fn seeded(store: MemoryStore) -> MemoryStore {
    store.seed(
        "items",
        [
            Record::new(1).with("name", json!("one")),
            Record::new(2).with("name", json!("two")),
            Record::new(3).with("name", json!("three")),
        ],
    );
    store
}

#[tokio::test]
async fn fetch_all_orders_by_id() {
    let store = MemoryStore::document();
    store.seed(
        "items",
        [Record::new(3), Record::new(1), Record::new(2)],
    );
    let ids: Vec<_> = store
        .fetch_all("items")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![RecordId::Int(1), RecordId::Int(2), RecordId::Int(3)]);
}

#[tokio::test]
async fn fetch_all_unknown_collection() {
    let store = MemoryStore::document();
    let err = store.fetch_all("nope").await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownCollection(name) if name == "nope"));
}

#[tokio::test]
async fn atomic_write_rolls_back_on_failure() {
    let store = seeded(MemoryStore::relational());
    store.inject(Fault::WriteAt(1));

    let writes = vec![
        RecordWrite::patch(RecordId::Int(1), values(json!({ "name": "uno" }))),
        RecordWrite::patch(RecordId::Int(2), values(json!({ "name": "dos" }))),
    ];
    let err = store
        .bulk_write("items", writes, WriteMode::Atomic)
        .await
        .unwrap_err();
    assert!(!err.is_partial());

    let names: Vec<_> = store
        .records("items")
        .into_iter()
        .map(|r| r.get("name").cloned().unwrap())
        .collect();
    assert_eq!(names, vec![json!("one"), json!("two"), json!("three")]);
}

#[tokio::test]
async fn atomic_write_unsupported_on_document_store() {
    let store = seeded(MemoryStore::document());
    let err = store
        .bulk_write("items", vec![RecordWrite::DeleteAll], WriteMode::Atomic)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unsupported { .. }));
    assert_eq!(store.records("items").len(), 3);
}

#[tokio::test]
async fn best_effort_write_reports_partial() {
    let store = seeded(MemoryStore::document());
    store.inject(Fault::WriteAt(2));

    let writes = (1..=3)
        .map(|i| RecordWrite::patch(RecordId::Int(i), values(json!({ "name": "x" }))))
        .collect();
    let err = store
        .bulk_write("items", writes, WriteMode::BestEffort)
        .await
        .unwrap_err();
    match err {
        StoreError::Partial { applied, total, .. } => {
            assert_eq!(applied, 2);
            assert_eq!(total, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
    let third = store.get("items", &RecordId::Int(3)).unwrap();
    assert_eq!(third.get("name"), Some(&json!("three")));
}

#[tokio::test]
async fn patch_missing_record() {
    let store = seeded(MemoryStore::relational());
    let err = store
        .bulk_write(
            "items",
            vec![RecordWrite::patch(RecordId::Int(99), Map::new())],
            WriteMode::Atomic,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RecordNotFound { .. }));
}

#[tokio::test]
async fn patch_unset_removes_document_keys() {
    let store = MemoryStore::document();
    store.seed(
        "items",
        [Record::new(1).with("name", json!("one")).with("legacy", json!({ "a": 1 }))],
    );
    store
        .bulk_write(
            "items",
            vec![RecordWrite::patch(RecordId::Int(1), values(json!({ "name": "uno" })))
                .unsetting(["legacy", "absent"])],
            WriteMode::BestEffort,
        )
        .await
        .unwrap();
    assert_eq!(
        store.records("items"),
        vec![Record::new(1).with("name", json!("uno"))]
    );
}

#[tokio::test]
async fn patch_unset_nulls_relational_columns() {
    let store = MemoryStore::relational();
    store.seed(
        "items",
        [Record::new(1).with("name", json!("one")).with("legacy", json!([1]))],
    );
    store
        .bulk_write(
            "items",
            vec![RecordWrite::patch(RecordId::Int(1), Map::new()).unsetting(["legacy"])],
            WriteMode::Atomic,
        )
        .await
        .unwrap();
    let record = store.get("items", &RecordId::Int(1)).unwrap();
    assert_eq!(record.get("legacy"), Some(&Value::Null));
    assert_eq!(record.get("name"), Some(&json!("one")));
}

#[test]
fn unsetting_ignores_non_patch_writes() {
    assert_eq!(RecordWrite::DeleteAll.unsetting(["x"]), RecordWrite::DeleteAll);
}

#[tokio::test]
async fn delete_then_insert_keeps_supplied_ids() {
    let store = seeded(MemoryStore::document());
    let report = store
        .bulk_write(
            "items",
            vec![
                RecordWrite::DeleteAll,
                RecordWrite::Insert(Record::new(7).with("name", json!({ "nested": true }))),
            ],
            WriteMode::BestEffort,
        )
        .await
        .unwrap();
    assert_eq!(report.applied, 2);
    assert_eq!(report.rows_affected, 4);

    let records = store.records("items");
    assert_eq!(records, vec![Record::new(7).with("name", json!({ "nested": true }))]);
}

#[tokio::test]
async fn duplicate_insert_rejected() {
    let store = seeded(MemoryStore::document());
    let err = store
        .bulk_write(
            "items",
            vec![RecordWrite::Insert(Record::new(1))],
            WriteMode::BestEffort,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateRecord { .. }));
}

fn localized_store() -> MemoryStore {
    let store = MemoryStore::relational();
    store.seed(
        "articles",
        (1..=5).map(|i| {
            Record::new(i)
                .with("locale", json!(if i % 2 == 0 { "fr" } else { "en" }))
                .with("title", json!(format!("t{i}")))
        }),
    );
    store
}

#[tokio::test]
async fn locale_pages_are_ordered_and_bounded() {
    let store = localized_store();
    let request = |offset| PageRequest {
        collection: "articles".into(),
        locale: "en".into(),
        columns: vec!["title".into(), "locale".into()],
        offset,
        limit: 2,
    };

    let first = store.select_locale_page(&request(0)).await.unwrap();
    let second = store.select_locale_page(&request(2)).await.unwrap();
    let third = store.select_locale_page(&request(4)).await.unwrap();

    let ids = |page: &[Record]| page.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&first), vec![RecordId::Int(1), RecordId::Int(3)]);
    assert_eq!(ids(&second), vec![RecordId::Int(5)]);
    assert!(third.is_empty());
    assert_eq!(first[0].get("title"), Some(&json!("t1")));
}

#[tokio::test]
async fn staging_lifecycle() {
    let store = localized_store();
    let spec = StagingSpec::new("__staging", "articles", vec!["title".into()]);

    store.create_staging(&spec).await.unwrap();
    assert!(store.relation_exists("__staging").await.unwrap());

    let rows = vec![
        Record::new(2).with("title", json!("from-one")),
        Record::new(4).with("title", json!("from-three")),
        Record::new(2).with("title", json!("ignored")),
        Record::new(99).with("title", json!("orphan")),
    ];
    assert_eq!(store.insert_staging("__staging", &rows, 3).await.unwrap(), 4);

    let updated = store.apply_staging(&spec).await.unwrap();
    assert_eq!(updated, 2);
    assert_eq!(
        store.get("articles", &RecordId::Int(2)).unwrap().get("title"),
        Some(&json!("from-one"))
    );
    assert_eq!(
        store.get("articles", &RecordId::Int(4)).unwrap().get("title"),
        Some(&json!("from-three"))
    );
    assert_eq!(
        store.get("articles", &RecordId::Int(1)).unwrap().get("title"),
        Some(&json!("t1"))
    );

    store.drop_staging("__staging").await.unwrap();
    assert!(!store.relation_exists("__staging").await.unwrap());
    // dropping twice is fine
    store.drop_staging("__staging").await.unwrap();
}

#[tokio::test]
async fn create_staging_replaces_leftover() {
    let store = localized_store();
    let spec = StagingSpec::new("__staging", "articles", vec!["title".into()]);
    store.create_staging(&spec).await.unwrap();
    store
        .insert_staging("__staging", &[Record::new(1).with("title", json!("x"))], 100)
        .await
        .unwrap();

    store.create_staging(&spec).await.unwrap();
    assert_eq!(store.apply_staging(&spec).await.unwrap(), 0);
}

#[tokio::test]
async fn create_staging_requires_source() {
    let store = MemoryStore::relational();
    let spec = StagingSpec::new("__staging", "missing", vec!["title".into()]);
    let err = store.create_staging(&spec).await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownCollection(_)));
    assert!(!store.relation_exists("__staging").await.unwrap());
}

#[tokio::test]
async fn insert_into_collection_is_not_staging() {
    let store = localized_store();
    let err = store
        .insert_staging("articles", &[Record::new(1)], 10)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownStaging(_)));
}
