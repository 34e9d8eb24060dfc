use std::time::Duration;

use anyhow::Result;
use http::{Method, StatusCode};
use pretty_assertions::assert_eq;
use reqstore_core::{LocationMode, Request, RetryPolicy, StorageLocation};

use super::{get, PRIMARY_HOST, SECONDARY_HOST};
use crate::{build_pipeline, ScriptedHttpSend};

fn policy() -> RetryPolicy {
    RetryPolicy::linear(3, Duration::from_millis(10))
}

#[tokio::test(start_paused = true)]
async fn test_primary_then_secondary_ping_pong() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([503, 503, 503, 200]);
    let (pipeline, history) = build_pipeline(&transport, policy(), None);

    let req = get().with_location_mode(LocationMode::PrimaryThenSecondary);
    let resp = pipeline.send(req).await?;

    assert_eq!(resp.location(), StorageLocation::Secondary);
    assert_eq!(
        transport.hosts(),
        vec![PRIMARY_HOST, SECONDARY_HOST, PRIMARY_HOST, SECONDARY_HOST]
    );
    assert_eq!(
        history
            .history()
            .iter()
            .map(|e| e.request().location())
            .collect::<Vec<_>>(),
        vec![
            StorageLocation::Primary,
            StorageLocation::Secondary,
            StorageLocation::Primary,
            StorageLocation::Secondary,
        ]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_secondary_then_primary_starts_on_secondary() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([500, 200]);
    let (pipeline, _) = build_pipeline(&transport, policy(), None);

    let req = get().with_location_mode(LocationMode::SecondaryThenPrimary);
    let resp = pipeline.send(req).await?;

    assert_eq!(resp.location(), StorageLocation::Primary);
    assert_eq!(transport.hosts(), vec![SECONDARY_HOST, PRIMARY_HOST]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_secondary_only_never_switches() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([500, 500, 200]);
    let (pipeline, _) = build_pipeline(&transport, policy(), None);

    let req = get().with_location_mode(LocationMode::SecondaryOnly);
    pipeline.send(req).await?;

    assert_eq!(
        transport.hosts(),
        vec![SECONDARY_HOST, SECONDARY_HOST, SECONDARY_HOST]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_mutating_request_pinned_to_primary() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([503, 503, 201]);
    let (pipeline, _) = build_pipeline(&transport, policy(), None);

    let req = Request::new(
        Method::POST,
        format!("https://{PRIMARY_HOST}/mytable").parse()?,
    )
    .with_body(r#"{"PartitionKey":"p","RowKey":"r"}"#)
    .with_location_mode(LocationMode::PrimaryThenSecondary);
    assert_eq!(req.location_mode(), LocationMode::PrimaryOnly);

    let resp = pipeline.send(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(
        transport.hosts(),
        vec![PRIMARY_HOST, PRIMARY_HOST, PRIMARY_HOST]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_secondary_not_found_is_permanent_by_default() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([503, 404, 200]);
    let (pipeline, history) = build_pipeline(&transport, policy(), None);

    let req = get().with_location_mode(LocationMode::PrimaryThenSecondary);
    let err = pipeline.send(req).await.unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(err.location(), Some(StorageLocation::Secondary));
    assert_eq!(err.attempts(), 2);
    assert_eq!(history.len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_secondary_not_found_retried_when_enabled() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([503, 404, 200]);
    let (pipeline, history) = build_pipeline(
        &transport,
        policy().with_retry_secondary_not_found(true),
        None,
    );

    let req = get().with_location_mode(LocationMode::PrimaryThenSecondary);
    let resp = pipeline.send(req).await?;

    assert_eq!(resp.location(), StorageLocation::Primary);
    assert_eq!(
        transport.hosts(),
        vec![PRIMARY_HOST, SECONDARY_HOST, PRIMARY_HOST]
    );
    assert_eq!(history.len(), 3);
    Ok(())
}
