//! Integration tests for partition scans and point lookups

mod support;

use cloudtable_core::{
    Entity, OperationTracer, QueryFilter, RowKeyCondition, TableError, TableStructure,
};
use futures::TryStreamExt;
use serde_json::json;
use std::sync::Arc;
use support::{created_table, RecordingStore};

async fn paged_table(
    page_size: usize,
    rows: usize,
) -> (TableStructure<RecordingStore>, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::new(100).with_page_size(page_size));
    let mut table = TableStructure::new("sampletable", Arc::clone(&store)).unwrap();
    table.create_or_load_structure().await.unwrap();
    for i in 0..rows {
        table
            .insert(
                Entity::new("A", format!("{i:03}"))
                    .with_property("foo", i % 3)
                    .with_property("kind", if i % 2 == 0 { "even" } else { "odd" }),
            )
            .unwrap();
    }
    table.insert(Entity::new("B", "000")).unwrap();
    table.commit().await.unwrap();
    (table, store)
}

#[tokio::test]
async fn test_empty_partition_yields_empty_stream() {
    let (table, _store) = created_table(100).await;
    let entities: Vec<Entity> = table
        .retrieve_all("nothing-here", None)
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert!(entities.is_empty());
}

#[tokio::test]
async fn test_scan_follows_continuation_across_pages() {
    let (table, store) = paged_table(4, 10).await;
    let fetches_before = store.page_fetches();

    let entities: Vec<Entity> = table
        .retrieve_all("A", None)
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    let row_keys: Vec<&str> = entities.iter().map(|e| e.row_key.as_str()).collect();
    let expected: Vec<String> = (0..10).map(|i| format!("{i:03}")).collect();
    assert_eq!(row_keys, expected);
    assert!(entities.iter().all(|e| e.partition_key == "A"));
    assert_eq!(store.page_fetches() - fetches_before, 3);
}

#[tokio::test]
async fn test_stream_is_lazy_and_restartable() {
    let (table, store) = paged_table(4, 10).await;

    let stream = table.retrieve_all("A", None).unwrap();
    assert_eq!(store.page_fetches(), 0);
    drop(stream);

    let first: Vec<Entity> = table.retrieve_all("A", None).unwrap().try_collect().await.unwrap();
    let second: Vec<Entity> = table.retrieve_all("A", None).unwrap().try_collect().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_filter_narrows_results() {
    let (table, _store) = paged_table(4, 10).await;

    let filter = QueryFilter::new()
        .row_key(RowKeyCondition::Ge("004".to_string()))
        .property_eq("kind", "even");
    let entities: Vec<Entity> = table
        .retrieve_all("A", Some(filter))
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    let row_keys: Vec<&str> = entities.iter().map(|e| e.row_key.as_str()).collect();
    assert_eq!(row_keys, vec!["004", "006", "008"]);
}

#[tokio::test]
async fn test_filter_on_numeric_property() {
    let (table, _store) = paged_table(100, 9).await;

    let filter = QueryFilter::new().property_eq("foo", 2);
    let entities: Vec<Entity> = table
        .retrieve_all("A", Some(filter))
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(entities.len(), 3);
    assert!(entities.iter().all(|e| e.property("foo") == Some(&json!(2))));
}

#[tokio::test]
async fn test_empty_partition_key_is_rejected_before_store_call() {
    let (table, store) = created_table(100).await;

    assert!(matches!(
        table.retrieve_all("", None),
        Err(TableError::InvalidArgument(_))
    ));
    assert!(matches!(
        table.retrieve("", "1").await,
        Err(TableError::InvalidArgument(_))
    ));
    assert!(matches!(
        table.retrieve("A", " ").await,
        Err(TableError::InvalidArgument(_))
    ));
    assert_eq!(store.page_fetches(), 0);
    assert_eq!(store.lookups(), 0);
}

#[tokio::test]
async fn test_retrieve_missing_row_is_none() {
    let (table, store) = created_table(100).await;
    assert!(table.retrieve("A", "1").await.unwrap().is_none());
    assert_eq!(store.lookups(), 1);
}

#[tokio::test]
async fn test_retrieve_returns_stored_entity() {
    let (mut table, _store) = created_table(100).await;
    table
        .insert(Entity::new("A", "1").with_property("foo", 10))
        .unwrap();

    // Pending inserts are not visible until committed
    assert!(table.retrieve("A", "1").await.unwrap().is_none());
    table.commit().await.unwrap();

    let stored = table
        .retrieve_entity(&Entity::new("A", "1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.property("foo"), Some(&json!(10)));
    assert!(stored.version_tag.is_some());
}

#[tokio::test]
async fn test_scan_of_missing_structure_surfaces_store_error() {
    let store = Arc::new(RecordingStore::new(100));
    let table = TableStructure::new("sampletable", Arc::clone(&store)).unwrap();

    let result: Result<Vec<Entity>, TableError> =
        table.retrieve_all("A", None).unwrap().try_collect().await;
    let err = result.unwrap_err();
    assert!(matches!(err, TableError::Store(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_tracer_counts_retrieved_entities() {
    let (table, _store) = paged_table(4, 10).await;
    let tracer = OperationTracer::new();
    let table = table.with_tracer(tracer.clone());

    let _: Vec<Entity> = table.retrieve_all("A", None).unwrap().try_collect().await.unwrap();
    table.retrieve("B", "000").await.unwrap();
    assert_eq!(tracer.get("entities_retrieved"), 11);
}
