use std::time::Duration;

use anyhow::Result;
use http::StatusCode;
use pretty_assertions::assert_eq;
use reqstore_core::constants::{X_MS_CLIENT_REQUEST_ID, X_MS_DATE};
use reqstore_core::{ErrorKind, RetryPolicy};
use tokio::time::Instant;

use super::get;
use crate::{build_pipeline, ScriptedHttpSend, Step};

#[tokio::test(start_paused = true)]
async fn test_transient_failures_then_success() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([503, 500, 200]);
    let (pipeline, history) = build_pipeline(&transport, RetryPolicy::default(), None);

    let resp = pipeline.send(get()).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let entries = history.history();
    assert_eq!(entries.len(), 3);
    assert_eq!(
        entries.iter().map(|e| e.status()).collect::<Vec<_>>(),
        vec![
            Some(StatusCode::SERVICE_UNAVAILABLE),
            Some(StatusCode::INTERNAL_SERVER_ERROR),
            Some(StatusCode::OK),
        ]
    );
    assert_eq!(
        entries
            .iter()
            .map(|e| e.request().attempt())
            .collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_stops_immediately() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([404, 200]);
    let (pipeline, history) = build_pipeline(&transport, RetryPolicy::default(), None);

    let err = pipeline.send(get()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Service);
    assert!(err.is_not_found());
    assert_eq!(err.attempts(), 1);
    assert_eq!(history.len(), 1);
    assert_eq!(transport.seen().len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_returns_last_error() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([500, 500, 500, 503]);
    let policy = RetryPolicy::linear(3, Duration::from_millis(100));
    let (pipeline, history) = build_pipeline(&transport, policy, None);

    let err = pipeline.send(get()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Service);
    assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    assert_eq!(err.attempts(), 4);
    assert_eq!(history.len(), 4);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_zero_retries() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([500, 200]);
    let policy = RetryPolicy::linear(0, Duration::ZERO);
    let (pipeline, history) = build_pipeline(&transport, policy, None);

    let err = pipeline.send(get()).await.unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(history.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_is_transient() -> Result<()> {
    let transport = ScriptedHttpSend::new([Step::Transport, Step::Status(StatusCode::OK)]);
    let (pipeline, history) = build_pipeline(&transport, RetryPolicy::default(), None);

    let resp = pipeline.send(get()).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let entries = history.history();
    assert_eq!(entries.len(), 2);
    assert_eq!(
        entries[0].failure().map(|f| f.kind()),
        Some(ErrorKind::Transport)
    );
    assert!(entries[1].response().is_some());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_exponential_backoff_waits() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([500, 500, 500, 200]);
    let policy = RetryPolicy::exponential(3, Duration::from_secs(1));
    let (pipeline, _) = build_pipeline(&transport, policy, None);

    let start = Instant::now();
    pipeline.send(get()).await?;

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(7), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(8), "{elapsed:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_linear_backoff_waits() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([500, 500, 500, 200]);
    let policy = RetryPolicy::linear(3, Duration::from_secs(1));
    let (pipeline, _) = build_pipeline(&transport, policy, None);

    let start = Instant::now();
    pipeline.send(get()).await?;

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(3), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(4), "{elapsed:?}");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_client_request_id_kept_across_retries() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([503, 503, 200]);
    let (pipeline, _) = build_pipeline(&transport, RetryPolicy::default(), None);

    pipeline.send(get()).await?;

    let seen = transport.seen();
    assert_eq!(seen.len(), 3);
    let ids: Vec<_> = seen
        .iter()
        .map(|req| req.headers()[X_MS_CLIENT_REQUEST_ID].clone())
        .collect();
    assert!(ids.iter().all(|id| id == &ids[0]));
    assert!(seen.iter().all(|req| req.headers().contains_key(X_MS_DATE)));
    Ok(())
}
