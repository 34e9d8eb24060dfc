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

use std::sync::{Arc, Mutex};

use http::StatusCode;

use crate::time::{now, DateTime};
use crate::{Error, ErrorKind, Middleware, Next, Request, Response, Result};

/// One physical attempt seen by [`HistoryMiddleware`].
#[derive(Clone, Debug)]
pub struct HistoryEntry {
    request: Request,
    outcome: HistoryOutcome,
    timestamp: DateTime,
}

/// What an attempt ended with.
#[derive(Clone, Debug)]
pub enum HistoryOutcome {
    /// The response, successful or short-circuited by an inner stage.
    Response(Response),
    /// The failure, see [`Failure`].
    Failure(Failure),
}

/// Snapshot of an [`Error`] taken when the attempt failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    kind: ErrorKind,
    status: Option<StatusCode>,
    code: Option<String>,
    message: String,
}

impl Failure {
    /// Kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Status of the failed response, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Service error code, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&Error> for Failure {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            status: err.status(),
            code: err.code().map(|v| v.to_string()),
            message: err.message().to_string(),
        }
    }
}

impl HistoryEntry {
    /// The request as this stage received it.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The outcome of the attempt.
    pub fn outcome(&self) -> &HistoryOutcome {
        &self.outcome
    }

    /// The response, if the attempt produced one.
    pub fn response(&self) -> Option<&Response> {
        match &self.outcome {
            HistoryOutcome::Response(resp) => Some(resp),
            HistoryOutcome::Failure(_) => None,
        }
    }

    /// The failure, if the attempt failed.
    pub fn failure(&self) -> Option<&Failure> {
        match &self.outcome {
            HistoryOutcome::Response(_) => None,
            HistoryOutcome::Failure(failure) => Some(failure),
        }
    }

    /// Status of the attempt, from either the response or the failure.
    pub fn status(&self) -> Option<StatusCode> {
        match &self.outcome {
            HistoryOutcome::Response(resp) => Some(resp.status()),
            HistoryOutcome::Failure(failure) => failure.status(),
        }
    }

    /// When the attempt finished.
    pub fn timestamp(&self) -> DateTime {
        self.timestamp
    }
}

/// HistoryMiddleware records every request passing through it, together
/// with its outcome, in arrival order.
///
/// Clones share the same log, so keep one clone to inspect it while the
/// other sits in the pipeline. Recording never alters the outcome. An
/// attempt abandoned at the operation deadline is recorded as a
/// [`ErrorKind::Timeout`] failure.
#[derive(Clone, Debug, Default)]
pub struct HistoryMiddleware {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
}

impl HistoryMiddleware {
    /// Create a new history with no entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries recorded so far.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.entries.lock().expect("lock poisoned").clone()
    }

    /// Number of entries recorded so far.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock poisoned").len()
    }

    /// Check if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all entries.
    pub fn clear(&self) {
        self.entries.lock().expect("lock poisoned").clear()
    }
}

#[async_trait::async_trait]
impl Middleware for HistoryMiddleware {
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response> {
        let request = req.clone();
        let result = next.run(req).await;

        let outcome = match &result {
            Ok(resp) => HistoryOutcome::Response(resp.clone()),
            Err(err) => HistoryOutcome::Failure(Failure::from(err)),
        };
        self.entries
            .lock()
            .expect("lock poisoned")
            .push(HistoryEntry {
                request,
                outcome,
                timestamp: now(),
            });

        result
    }
}
