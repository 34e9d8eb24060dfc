use std::time::Duration;

use anyhow::Result;
use http::StatusCode;
use pretty_assertions::assert_eq;
use reqstore_core::RetryPolicy;

use super::get;
use crate::{build_pipeline, ScriptedHttpSend};

const OPERATIONS: usize = 32;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_operations_share_history() -> Result<()> {
    // Three operations hit a 503 and retry, everything after succeeds.
    let transport = ScriptedHttpSend::statuses([503, 503, 503, 200]);
    let policy = RetryPolicy::linear(3, Duration::from_millis(1));
    let (pipeline, history) = build_pipeline(&transport, policy, None);

    let tasks: Vec<_> = (0..OPERATIONS)
        .map(|_| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.send(get()).await })
        })
        .collect();
    for task in tasks {
        let resp = task.await??;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    assert_eq!(transport.seen().len(), OPERATIONS + 3);
    assert_eq!(history.len(), OPERATIONS + 3);

    let failed = history
        .history()
        .iter()
        .filter(|entry| entry.status() == Some(StatusCode::SERVICE_UNAVAILABLE))
        .count();
    assert_eq!(failed, 3);
    Ok(())
}
