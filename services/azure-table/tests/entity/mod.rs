use std::collections::HashMap;

use anyhow::Result;
use http::StatusCode;
use pretty_assertions::assert_eq;
use reqstore_azure_table::{BatchOperation, BatchResult, ETag, Entity};
use reqstore_core::{Config, Context, ErrorKind, LocationMode, StaticEnv, StorageLocation};
use serde_json::json;

use crate::{client, MockTableService, TABLE};

#[tokio::test(start_paused = true)]
async fn test_insert_then_get() -> Result<()> {
    let service = MockTableService::new();
    let (client, _) = client(&service);

    let inserted = client
        .execute(BatchOperation::insert(
            TABLE,
            Entity::new("p", "o'brien").with_property("Age", 42),
        ))
        .await?;
    let BatchResult::InsertResult(inserted) = inserted else {
        panic!("insert must return the entity");
    };
    assert_eq!(inserted.row_key(), "o'brien");

    let entity = client.get_entity(TABLE, "p", "o'brien").await?;
    assert_eq!(entity.property("Age"), Some(&json!(42)));
    assert_eq!(entity.etag(), inserted.etag());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_insert_conflict_not_retried() -> Result<()> {
    let service = MockTableService::new();
    service.seed("p", "1", json!({}));
    let (client, history) = client(&service);

    let err = client
        .execute(BatchOperation::insert(TABLE, Entity::new("p", "1")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Service);
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    assert_eq!(err.code(), Some("EntityAlreadyExists"));
    assert_eq!(history.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_merge_keeps_other_properties() -> Result<()> {
    let service = MockTableService::new();
    let etag = service.seed("p", "1", json!({"Age": 1, "Name": "a"}));
    let (client, _) = client(&service);

    let result = client
        .execute(BatchOperation::merge(
            TABLE,
            Entity::new("p", "1")
                .with_property("Age", 2)
                .with_etag(ETag::new(etag)),
        ))
        .await?;
    assert_eq!(
        result,
        BatchResult::UpdateResult(ETag::new(service.etag("p", "1").unwrap()))
    );
    assert_eq!(
        serde_json::Value::Object(service.get("p", "1").unwrap()),
        json!({"Age": 2, "Name": "a"})
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_wildcard_ignores_stored_etag() -> Result<()> {
    let service = MockTableService::new();
    service.seed("p", "1", json!({}));
    // Bump the stored version so any earlier etag is stale.
    service.seed("p", "1", json!({"Age": 1}));
    let (client, _) = client(&service);

    let result = client
        .execute(BatchOperation::delete(TABLE, "p", "1", None))
        .await?;
    assert_eq!(result, BatchResult::DeletedRowKey("1".to_string()));
    assert!(service.get("p", "1").is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_mismatched_etag_fails() -> Result<()> {
    let service = MockTableService::new();
    let stale = service.seed("p", "1", json!({}));
    service.seed("p", "1", json!({"Age": 1}));
    let (client, history) = client(&service);

    let err = client
        .execute(BatchOperation::delete(TABLE, "p", "1", Some(ETag::new(stale))))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::CONFLICT));
    assert_eq!(err.code(), Some("EntityAlreadyExists"));
    assert_eq!(err.attempts(), 1);
    assert_eq!(history.len(), 1);
    assert!(service.get("p", "1").is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_get_entity_reads_secondary() -> Result<()> {
    let service = MockTableService::new();
    service.seed("p", "1", json!({"Age": 1}));
    service.fail_next(1);
    let (client, history) = client(&service);
    let client = client.with_location_mode(LocationMode::SecondaryThenPrimary);

    let entity = client.get_entity(TABLE, "p", "1").await?;
    assert_eq!(entity.property("Age"), Some(&json!(1)));
    assert_eq!(
        service.hosts(),
        vec![
            "acct-secondary.table.core.windows.net",
            "acct.table.core.windows.net",
        ]
    );
    assert_eq!(
        history.history()[1].response().map(|r| r.location()),
        Some(StorageLocation::Primary)
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_writes_stay_on_primary() -> Result<()> {
    let service = MockTableService::new();
    service.fail_next(1);
    let (client, _) = client(&service);
    let client = client.with_location_mode(LocationMode::SecondaryOnly);

    client
        .execute(BatchOperation::insert_or_replace(TABLE, Entity::new("p", "1")))
        .await?;
    assert_eq!(
        service.hosts(),
        vec!["acct.table.core.windows.net", "acct.table.core.windows.net"]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_location_mode_from_env() -> Result<()> {
    let service = MockTableService::new();
    service.seed("p", "1", json!({"Age": 7}));
    let ctx = Context::new().with_env(StaticEnv {
        envs: HashMap::from([(
            "REQSTORE_LOCATION_MODE".to_string(),
            "secondary_only".to_string(),
        )]),
    });
    let cfg = Config::default().from_env(&ctx)?;
    let (client, _) = client(&service);
    let client = client.with_config(&cfg);
    assert_eq!(client.location_mode(), LocationMode::SecondaryOnly);

    let entity = client.get_entity(TABLE, "p", "1").await?;
    assert_eq!(entity.property("Age"), Some(&json!(7)));
    assert_eq!(service.hosts(), vec!["acct-secondary.table.core.windows.net"]);
    Ok(())
}
