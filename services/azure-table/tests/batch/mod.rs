use anyhow::Result;
use http::StatusCode;
use pretty_assertions::assert_eq;
use reqstore_azure_table::{Batch, BatchOperation, BatchResult, ETag, Entity};
use reqstore_core::{ErrorKind, StorageLocation};
use serde_json::json;

use crate::{client, MockTableService, TABLE};

#[tokio::test(start_paused = true)]
async fn test_batch_round_trip() -> Result<()> {
    let service = MockTableService::new();
    service.seed("P", "2", json!({"Done": false}));
    service.seed("P", "3", json!({"Done": true}));
    let (client, history) = client(&service);

    let batch = Batch::new()
        .with(BatchOperation::insert(
            TABLE,
            Entity::new("P", "1").with_property("Done", false),
        ))
        .with(BatchOperation::update(
            TABLE,
            Entity::new("P", "2").with_property("Done", true),
        ))
        .with(BatchOperation::delete(TABLE, "P", "3", None));

    let results = client.submit_batch(&batch).await?;
    assert_eq!(results.len(), 3);
    match &results[0] {
        BatchResult::InsertResult(entity) => {
            assert_eq!(entity.row_key(), "1");
            assert_eq!(entity.property("Done"), Some(&json!(false)));
            assert!(entity.etag().is_some());
        }
        other => panic!("unexpected result {other:?}"),
    }
    assert_eq!(
        results[1],
        BatchResult::UpdateResult(ETag::new(service.etag("P", "2").unwrap()))
    );
    assert_eq!(results[2], BatchResult::DeletedRowKey("3".to_string()));

    assert!(service.get("P", "1").is_some());
    assert_eq!(service.get("P", "2").unwrap()["Done"], json!(true));
    assert!(service.get("P", "3").is_none());
    assert_eq!(history.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_batch_partial_failure_applies_nothing() -> Result<()> {
    let service = MockTableService::new();
    service.seed("P", "2", json!({"Done": false}));
    service.seed("P", "3", json!({"Done": true}));
    let (client, history) = client(&service);

    let batch = Batch::new()
        .with(BatchOperation::insert(TABLE, Entity::new("P", "1")))
        .with(BatchOperation::update(
            TABLE,
            Entity::new("P", "2")
                .with_property("Done", true)
                .with_etag(ETag::new("W/\"datetime'999'\"")),
        ))
        .with(BatchOperation::delete(TABLE, "P", "3", None));

    let err = client.submit_batch(&batch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BatchPartialFailure);
    assert_eq!(err.batch_content_id(), Some(2));
    assert_eq!(err.batch_index(), Some(1));
    assert!(err.is_precondition_failed());
    assert_eq!(err.code(), Some("UpdateConditionNotSatisfied"));
    assert_eq!(err.attempts(), 1);
    assert_eq!(err.location(), Some(StorageLocation::Primary));

    assert!(service.get("P", "1").is_none());
    assert_eq!(service.get("P", "2").unwrap()["Done"], json!(false));
    assert!(service.get("P", "3").is_some());
    assert_eq!(history.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_mixed_partitions_rejected_locally() -> Result<()> {
    let service = MockTableService::new();
    let (client, history) = client(&service);

    let batch = Batch::new()
        .with(BatchOperation::insert(TABLE, Entity::new("P", "1")))
        .with(BatchOperation::insert(TABLE, Entity::new("Q", "2")));

    let err = client.submit_batch(&batch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.attempts(), 0);
    assert_eq!(service.requests(), 0);
    assert!(history.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_empty_batch_rejected_locally() -> Result<()> {
    let service = MockTableService::new();
    let (client, _) = client(&service);

    let err = client.submit_batch(&Batch::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(service.requests(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_batch_delete_wildcard_and_mismatch() -> Result<()> {
    let service = MockTableService::new();
    service.seed("P", "1", json!({}));
    service.seed("P", "2", json!({}));
    let (client, _) = client(&service);

    let wildcard = Batch::new().with(BatchOperation::delete(TABLE, "P", "1", None));
    let results = client.submit_batch(&wildcard).await?;
    assert_eq!(results, vec![BatchResult::DeletedRowKey("1".to_string())]);

    let mismatch = Batch::new().with(BatchOperation::delete(
        TABLE,
        "P",
        "2",
        Some(ETag::new("W/\"stale\"")),
    ));
    let err = client.submit_batch(&mismatch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BatchPartialFailure);
    assert_eq!(err.status(), Some(StatusCode::PRECONDITION_FAILED));
    assert!(service.get("P", "2").is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_batch_retried_on_server_busy() -> Result<()> {
    let service = MockTableService::new();
    service.fail_next(2);
    let (client, history) = client(&service);

    let batch = Batch::new()
        .with(BatchOperation::insert_or_replace(
            TABLE,
            Entity::new("P", "1").with_property("Done", true),
        ))
        .with(BatchOperation::insert_or_merge(
            TABLE,
            Entity::new("P", "2").with_property("Done", false),
        ));

    let results = client.submit_batch(&batch).await?;
    assert!(matches!(results[0], BatchResult::UpdateResult(_)));
    assert!(matches!(results[1], BatchResult::UpdateResult(_)));

    assert_eq!(history.len(), 3);
    assert_eq!(
        history.history()[0].status(),
        Some(StatusCode::SERVICE_UNAVAILABLE)
    );
    assert_eq!(service.get("P", "1").unwrap()["Done"], json!(true));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_batch_failure_after_retry_counts_attempts() -> Result<()> {
    let service = MockTableService::new();
    service.seed("P", "2", json!({}));
    service.fail_next(1);
    let (client, history) = client(&service);

    let batch = Batch::new()
        .with(BatchOperation::insert(TABLE, Entity::new("P", "1")))
        .with(BatchOperation::delete(
            TABLE,
            "P",
            "2",
            Some(ETag::new("W/\"stale\"")),
        ));

    let err = client.submit_batch(&batch).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BatchPartialFailure);
    assert_eq!(err.batch_index(), Some(1));
    assert_eq!(err.attempts(), 2);
    assert_eq!(err.location(), Some(StorageLocation::Primary));
    assert_eq!(history.len(), 2);
    assert!(service.get("P", "1").is_none());
    Ok(())
}
