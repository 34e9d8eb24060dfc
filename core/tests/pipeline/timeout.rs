use std::time::Duration;

use anyhow::Result;
use http::StatusCode;
use pretty_assertions::assert_eq;
use reqstore_core::{Error, ErrorKind, RetryPolicy};

use super::get;
use crate::{build_pipeline, ScriptedHttpSend, Step};

#[tokio::test(start_paused = true)]
async fn test_timeout_before_next_retry() -> Result<()> {
    let transport = ScriptedHttpSend::statuses([503]);
    let policy = RetryPolicy::linear(10, Duration::from_secs(1));
    let timeout = Some(Duration::from_millis(2500));
    let (pipeline, history) = build_pipeline(&transport, policy, timeout);

    let err = pipeline.send(get()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.attempts(), 3);
    assert_eq!(history.len(), 3);

    let last = std::error::Error::source(&err)
        .and_then(|e| e.downcast_ref::<Error>())
        .expect("timeout must carry the last error");
    assert_eq!(last.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timeout_abandons_slow_attempt() -> Result<()> {
    let transport = ScriptedHttpSend::new([Step::Delay(
        Duration::from_secs(10),
        StatusCode::OK,
    )]);
    let (pipeline, history) = build_pipeline(
        &transport,
        RetryPolicy::default(),
        Some(Duration::from_secs(2)),
    );

    let err = pipeline.send(get()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.attempts(), 1);
    assert_eq!(transport.seen().len(), 1);

    let entries = history.history();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].failure().map(|f| f.kind()),
        Some(ErrorKind::Timeout)
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_success_within_timeout() -> Result<()> {
    let transport = ScriptedHttpSend::new([
        Step::Status(StatusCode::INTERNAL_SERVER_ERROR),
        Step::Delay(Duration::from_millis(200), StatusCode::OK),
    ]);
    let policy = RetryPolicy::linear(3, Duration::from_millis(500));
    let (pipeline, history) = build_pipeline(&transport, policy, Some(Duration::from_secs(5)));

    let resp = pipeline.send(get()).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(history.len(), 2);
    Ok(())
}
