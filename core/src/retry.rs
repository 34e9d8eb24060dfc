// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Retry and failover engine.

use std::str::FromStr;
use std::time::Duration;

use http::StatusCode;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_INTERVAL_MS};
use crate::{
    Config, Error, ErrorKind, LocationMode, Middleware, Next, Request, Response, Result,
    StorageLocation,
};

/// Check if a service status may succeed when retried: `408` and every `5xx`.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT || status.is_server_error()
}

/// How the wait grows between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    /// Wait the same interval before every retry.
    Linear,
    /// Double the wait after every retry.
    #[default]
    Exponential,
}

impl FromStr for RetryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(RetryKind::Linear),
            "exponential" => Ok(RetryKind::Exponential),
            _ => Err(Error::config_invalid(format!("unknown retry policy: {s}"))),
        }
    }
}

/// Outcome class of one attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// 2xx.
    Success,
    /// May succeed if tried again.
    Transient,
    /// Will fail again, stop now.
    Permanent,
}

/// What the engine does after an attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Return the last outcome to the caller.
    Stop,
    /// Wait `after`, then try again against `location`.
    Retry {
        /// Backoff before the next attempt.
        after: Duration,
        /// Endpoint of the next attempt.
        location: StorageLocation,
    },
}

/// RetryContext describes the operation after its most recent attempt.
///
/// Every attempt produces a new context through [`RetryContext::record`],
/// nothing is updated in place.
#[derive(Clone, Debug)]
pub struct RetryContext {
    started_at: Instant,
    attempt: u32,
    status: Option<StatusCode>,
    error: Option<ErrorKind>,
    classification: Classification,
    elapsed: Duration,
    location: StorageLocation,
}

impl RetryContext {
    /// Start tracking an operation whose first attempt targets `location`.
    pub fn new(started_at: Instant, location: StorageLocation) -> Self {
        Self {
            started_at,
            attempt: 0,
            status: None,
            error: None,
            classification: Classification::Success,
            elapsed: Duration::ZERO,
            location,
        }
    }

    /// Build the context following an attempt on `location`.
    pub fn record(
        &self,
        location: StorageLocation,
        outcome: &Result<Response>,
        classification: Classification,
    ) -> Self {
        let (status, error) = match outcome {
            Ok(resp) => (Some(resp.status()), None),
            Err(err) => (err.status(), Some(err.kind())),
        };

        Self {
            started_at: self.started_at,
            attempt: self.attempt + 1,
            status,
            error,
            classification,
            elapsed: self.started_at.elapsed(),
            location,
        }
    }

    /// When the operation started.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// One-based number of the attempt just made, `0` before the first one.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Status of the most recent attempt, if it got a response.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Error kind of the most recent attempt, if it failed.
    pub fn error(&self) -> Option<ErrorKind> {
        self.error
    }

    /// Class of the most recent attempt.
    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// Time spent since the operation started, as of the last attempt.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Endpoint used by the most recent attempt.
    pub fn location(&self) -> StorageLocation {
        self.location
    }
}

/// RetryPolicy decides whether and when an operation is attempted again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    interval: Duration,
    kind: RetryKind,
    retry_secondary_not_found: bool,
}

impl Default for RetryPolicy {
    /// Exponential backoff, 3 retries starting at 1s.
    fn default() -> Self {
        Self::exponential(
            DEFAULT_MAX_RETRIES,
            Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS),
        )
    }
}

impl RetryPolicy {
    /// Wait `interval` before every retry.
    pub fn linear(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
            kind: RetryKind::Linear,
            retry_secondary_not_found: false,
        }
    }

    /// Wait `interval * 2^(n-1)` before the retry following attempt `n`.
    pub fn exponential(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
            kind: RetryKind::Exponential,
            retry_secondary_not_found: false,
        }
    }

    /// Treat `404` from the secondary as transient in failover modes.
    ///
    /// Replication to the secondary lags, so a resource just written may not
    /// be there yet. Off by default.
    pub fn with_retry_secondary_not_found(mut self, enabled: bool) -> Self {
        self.retry_secondary_not_found = enabled;
        self
    }

    /// Retries allowed beyond the first try.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Base interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Growth kind.
    pub fn kind(&self) -> RetryKind {
        self.kind
    }

    /// Whether a secondary `404` is retried.
    pub fn retry_secondary_not_found(&self) -> bool {
        self.retry_secondary_not_found
    }

    /// Classify the outcome of an attempt sent to `location` under `mode`.
    pub fn classify(
        &self,
        outcome: &Result<Response>,
        location: StorageLocation,
        mode: LocationMode,
    ) -> Classification {
        match outcome {
            Ok(resp) => self.classify_status(resp.status(), location, mode),
            Err(err) => match err.kind() {
                ErrorKind::Transport => Classification::Transient,
                ErrorKind::Service => match err.status() {
                    Some(status) => self.classify_status(status, location, mode),
                    None => Classification::Permanent,
                },
                _ => Classification::Permanent,
            },
        }
    }

    fn classify_status(
        &self,
        status: StatusCode,
        location: StorageLocation,
        mode: LocationMode,
    ) -> Classification {
        if status.is_success() {
            Classification::Success
        } else if is_retryable_status(status) {
            Classification::Transient
        } else if self.retry_secondary_not_found
            && status == StatusCode::NOT_FOUND
            && location == StorageLocation::Secondary
            && mode.can_failover()
        {
            Classification::Transient
        } else {
            Classification::Permanent
        }
    }

    /// Wait before the retry following attempt `attempt` (one-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        match self.kind {
            RetryKind::Linear => self.interval,
            RetryKind::Exponential => {
                let factor = 1u32
                    .checked_shl(attempt.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                self.interval.saturating_mul(factor)
            }
        }
    }

    /// Decide what follows the attempt described by `ctx`.
    pub fn decide(&self, ctx: &RetryContext, mode: LocationMode) -> RetryDecision {
        match ctx.classification() {
            Classification::Success | Classification::Permanent => RetryDecision::Stop,
            Classification::Transient if ctx.attempt() > self.max_retries => RetryDecision::Stop,
            Classification::Transient => RetryDecision::Retry {
                after: self.backoff(ctx.attempt()),
                location: mode.next_location(ctx.location()),
            },
        }
    }
}

/// RetryMiddleware re-runs the rest of the pipeline on transient failures.
///
/// Place it before [`HistoryMiddleware`](crate::HistoryMiddleware) so every
/// physical attempt is recorded.
#[derive(Clone, Debug)]
pub struct RetryMiddleware {
    policy: RetryPolicy,
    timeout: Option<Duration>,
}

impl RetryMiddleware {
    /// Create a new retry stage without operation timeout.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            timeout: None,
        }
    }

    /// Create a retry stage with the policy and timeout described by `cfg`.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.retry_policy()).with_timeout(cfg.timeout())
    }

    /// Bound the total time of an operation, waits included.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Get the operation timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn timeout_error(&self, ctx: &RetryContext, last: Option<Error>) -> Error {
        let timeout = self.timeout.unwrap_or_default();
        let mut err = Error::timeout(format!(
            "operation timed out after {timeout:?} and {} attempts",
            ctx.attempt()
        ))
        .with_attempts(ctx.attempt())
        .with_location(ctx.location());
        if let Some(last) = last {
            err = err.with_source(last);
        }
        err
    }
}

#[async_trait::async_trait]
impl Middleware for RetryMiddleware {
    async fn handle(&self, mut req: Request, next: Next<'_>) -> Result<Response> {
        let mode = req.location_mode();
        let mut ctx = RetryContext::new(Instant::now(), req.location());
        let deadline = self.timeout.map(|timeout| ctx.started_at() + timeout);
        req.set_deadline(deadline);

        loop {
            let location = req.location();
            let attempt = next.run(req.clone());
            // The transport gives up at the same deadline, so inner stages
            // normally see the attempt fail before this fires.
            let outcome = match deadline {
                None => attempt.await,
                Some(deadline) => match tokio::time::timeout_at(deadline, attempt).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(Error::timeout(format!(
                        "attempt on {location} abandoned at operation deadline"
                    ))
                    .with_location(location)),
                },
            };

            let classification = self.policy.classify(&outcome, location, mode);
            ctx = ctx.record(location, &outcome, classification);
            debug!(
                "attempt {} on {location} finished as {classification:?}",
                ctx.attempt()
            );

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                if let Err(err) = &outcome {
                    if err.kind() == ErrorKind::Timeout {
                        return Err(self.timeout_error(&ctx, outcome.err()));
                    }
                }
            }

            match self.policy.decide(&ctx, mode) {
                RetryDecision::Stop => {
                    if classification == Classification::Transient {
                        warn!(
                            "giving up on {location} after {} attempts",
                            ctx.attempt()
                        );
                    }
                    return match outcome {
                        Ok(resp) => resp
                            .error_for_status()
                            .map(|resp| resp.with_attempts(ctx.attempt()))
                            .map_err(|err| {
                                err.with_attempts(ctx.attempt()).with_location(location)
                            }),
                        Err(err) => Err(err
                            .with_attempts(ctx.attempt())
                            .with_location(location)),
                    };
                }
                RetryDecision::Retry { after, location } => {
                    if let Some(timeout) = self.timeout {
                        if ctx.elapsed() + after >= timeout {
                            return Err(self.timeout_error(&ctx, outcome.err()));
                        }
                    }

                    warn!(
                        "attempt {} failed transiently, retrying on {location} after {after:?}",
                        ctx.attempt()
                    );
                    tokio::time::sleep(after).await;

                    req.set_attempt(ctx.attempt());
                    req.set_location(location);
                }
            }
        }
    }
}
