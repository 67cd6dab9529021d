//! Extraction stage against in-memory source and storage
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use starline_pipeline::extract::artifact_key;
use starline_pipeline::source::MemorySource;
use starline_pipeline::storage::{BlobStore, MemoryBlobStore};
use starline_pipeline::{PipelineError, Table, Value};
use std::sync::Arc;

#[tokio::test]
async fn test_first_run_stages_every_table() {
    init_tracing();
    let h = Harness::new("last_updated");
    h.source
        .insert_table(currency(&[
            (1, "GBP", ts(2025, 6, 1, 9, 0, 0)),
            (2, "USD", ts(2025, 6, 1, 10, 30, 0)),
        ]))
        .await;
    h.source
        .insert_table(design(&[(3, "Steel", ts(2025, 6, 2, 8, 0, 0))]))
        .await;

    let mut state = h.state_store.load().await.unwrap();
    let results = h.extract.extract_all(&mut state).await.unwrap();

    let tables: Vec<&str> = results.iter().map(|r| r.table_name.as_str()).collect();
    assert_eq!(tables, vec!["currency", "design"]);

    assert_eq!(state.watermark("currency"), Some(ts(2025, 6, 1, 10, 30, 0)));
    assert_eq!(state.watermark("design"), Some(ts(2025, 6, 2, 8, 0, 0)));
    assert_eq!(
        results[0].key,
        "2025/6/1/currency_2025-6-1_10-30-0_0.parquet"
    );

    let staged = h.read_artifact(INGEST, &results[0].key, "currency").await;
    assert_eq!(staged.len(), 2);
    assert_eq!(staged.value(1, "currency_code"), Some(&Value::from("USD")));

    // the stored document matches the in-memory one
    let persisted = h.state_store.load().await.unwrap();
    assert_eq!(persisted, state);
}

#[tokio::test]
async fn test_rerun_without_changes_stages_nothing() {
    init_tracing();
    let h = Harness::new("last_updated");
    h.source
        .insert_table(currency(&[(1, "GBP", ts(2025, 6, 1, 9, 0, 0))]))
        .await;

    let mut state = h.state_store.load().await.unwrap();
    h.extract.extract_all(&mut state).await.unwrap();
    let objects = h.blobs.object_count(INGEST).await;
    let before = state.clone();

    let results = h.extract.extract_all(&mut state).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(state, before);
    assert_eq!(state.ingest_log("currency").len(), 1);
    assert_eq!(h.blobs.object_count(INGEST).await, objects);
}

#[tokio::test]
async fn test_second_run_only_picks_up_newer_rows() {
    init_tracing();
    let h = Harness::new("last_updated");
    h.source
        .insert_table(currency(&[(1, "GBP", ts(2025, 6, 1, 9, 0, 0))]))
        .await;

    let mut state = h.state_store.load().await.unwrap();
    h.extract.extract_all(&mut state).await.unwrap();

    h.source
        .append(&currency(&[(2, "EUR", ts(2025, 6, 3, 12, 0, 0))]))
        .await
        .unwrap();
    let results = h.extract.extract_all(&mut state).await.unwrap();

    assert_eq!(results.len(), 1);
    let staged = h.read_artifact(INGEST, &results[0].key, "currency").await;
    assert_eq!(staged.len(), 1);
    assert_eq!(staged.value(0, "currency_id"), Some(&Value::Int(2)));

    assert_eq!(state.watermark("currency"), Some(ts(2025, 6, 3, 12, 0, 0)));
    assert_eq!(state.ingest_log("currency").len(), 2);
    assert_eq!(
        state.latest_ingest_key("currency"),
        Some(results[0].key.as_str())
    );
}

#[tokio::test]
async fn test_watermark_is_monotonic_across_runs() {
    init_tracing();
    let h = Harness::new("last_updated");
    h.source
        .insert_table(design(&[(1, "Wooden", ts(2025, 6, 5, 0, 0, 0))]))
        .await;

    let mut state = h.state_store.load().await.unwrap();
    h.extract.extract_all(&mut state).await.unwrap();
    let first = state.watermark("design").unwrap();

    // a backdated row is never newer than the watermark, so it is not seen
    h.source
        .append(&design(&[(2, "Bronze", ts(2025, 6, 4, 0, 0, 0))]))
        .await
        .unwrap();
    h.source
        .append(&design(&[(3, "Granite", ts(2025, 6, 6, 0, 0, 0))]))
        .await
        .unwrap();
    h.extract.extract_all(&mut state).await.unwrap();

    let second = state.watermark("design").unwrap();
    assert!(second >= first);
    assert_eq!(second, ts(2025, 6, 6, 0, 0, 0));
}

#[tokio::test]
async fn test_restaging_same_watermark_overwrites_artifact() {
    init_tracing();
    let h = Harness::new("last_updated");
    let watermark = ts(2025, 6, 1, 10, 30, 0);
    h.source
        .insert_table(currency(&[(1, "GBP", watermark)]))
        .await;

    let mut state = h.state_store.load().await.unwrap();
    let first = h.extract.extract_all(&mut state).await.unwrap();
    let objects = h.blobs.object_count(INGEST).await;

    // replay the run from an empty state
    let mut replay = starline_pipeline::state::State::default();
    let second = h.extract.extract_all(&mut replay).await.unwrap();

    assert_eq!(first[0].key, second[0].key);
    assert_eq!(first[0].key, artifact_key("currency", watermark, "parquet").key);
    assert_eq!(h.blobs.object_count(INGEST).await, objects);
}

#[tokio::test]
async fn test_failed_write_keeps_earlier_tables_and_old_watermark() {
    init_tracing();
    let source = MemorySource::new();
    source
        .insert_table(currency(&[(1, "GBP", ts(2025, 6, 1, 9, 0, 0))]))
        .await;
    source
        .insert_table(design(&[(3, "Steel", ts(2025, 6, 2, 8, 0, 0))]))
        .await;
    source
        .insert_table(department(&[(1, "Sales", "Manchester", ts(2025, 6, 2, 8, 0, 0))]))
        .await;

    let blobs = MemoryBlobStore::new();
    let failing = FailingBlobStore {
        inner: blobs.clone(),
        fail_on: "/design_".to_string(),
    };
    let h = Harness::with_store("last_updated", source, blobs, Arc::new(failing));

    let mut state = h.state_store.load().await.unwrap();
    let err = h.extract.extract_all(&mut state).await.unwrap_err();
    assert!(matches!(err, PipelineError::Storage { .. }));

    // currency and department sort before design and were committed
    assert!(state.watermark("currency").is_some());
    assert!(state.watermark("department").is_some());
    assert_eq!(state.watermark("design"), None);

    let persisted = h.state_store.load().await.unwrap();
    assert_eq!(persisted, state);
    assert!(persisted.ingest_log("design").is_empty());
}

#[tokio::test]
async fn test_table_without_watermark_column_aborts() {
    init_tracing();
    let h = Harness::new("updated_at");
    h.source
        .insert_table(currency(&[(1, "GBP", ts(2025, 6, 1, 9, 0, 0))]))
        .await;

    // the first run reads everything, so the column is only needed for the max
    let mut state = h.state_store.load().await.unwrap();
    let err = h.extract.extract_all(&mut state).await.unwrap_err();

    assert!(matches!(err, PipelineError::MissingColumn { .. }));
    assert_eq!(state.watermark("currency"), None);
}

#[tokio::test]
async fn test_configurable_watermark_column() {
    init_tracing();
    let h = Harness::new("updated_at");
    let table = Table::from_rows(
        "payment_type",
        ["payment_type_id", "payment_type_name", "updated_at"],
        vec![
            vec![Value::Int(1), Value::from("SALES_RECEIPT"), Value::Timestamp(ts(2025, 6, 1, 1, 0, 0))],
            vec![Value::Int(2), Value::from("PURCHASE_REFUND"), Value::Timestamp(ts(2025, 6, 1, 2, 0, 0))],
        ],
    )
    .unwrap();
    h.source.insert_table(table).await;

    let mut state = h.state_store.load().await.unwrap();
    let results = h.extract.extract_all(&mut state).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].last_updated, ts(2025, 6, 1, 2, 0, 0));
    assert_eq!(state.watermark("payment_type"), Some(ts(2025, 6, 1, 2, 0, 0)));
}

#[tokio::test]
async fn test_corrupt_state_document_starts_fresh() {
    init_tracing();
    let h = Harness::new("last_updated");
    h.blobs
        .put(INGEST, STATE_KEY, b"{ not json".to_vec(), "application/json")
        .await
        .unwrap();
    h.source
        .insert_table(currency(&[(1, "GBP", ts(2025, 6, 1, 9, 0, 0))]))
        .await;

    let mut state = h.state_store.load().await.unwrap();
    assert!(state.ingest_state.is_empty());

    // the broken document survives until the first save
    assert_eq!(
        h.blobs.get(INGEST, STATE_KEY).await.unwrap(),
        b"{ not json".to_vec()
    );

    h.extract.extract_all(&mut state).await.unwrap();
    let healed = h.state_store.load().await.unwrap();
    assert_eq!(healed.watermark("currency"), Some(ts(2025, 6, 1, 9, 0, 0)));
}

#[tokio::test]
async fn test_missing_state_document_is_created() {
    init_tracing();
    let h = Harness::new("last_updated");
    assert!(h.blobs.get(INGEST, STATE_KEY).await.unwrap_err().is_not_found());

    let state = h.state_store.load().await.unwrap();

    assert_eq!(state, starline_pipeline::state::State::default());
    assert!(h.blobs.get(INGEST, STATE_KEY).await.is_ok());
}
