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

//! Middleware pipeline wrapping every outgoing call.

use std::fmt::Debug;
use std::sync::Arc;

use http::HeaderValue;
use log::debug;

use crate::constants::{X_MS_CLIENT_REQUEST_ID, X_MS_DATE};
use crate::time::{format_http_date, now};
use crate::{Context, Error, Request, Response, Result};

/// Middleware is one stage of the [`Pipeline`].
///
/// A stage may inspect or rewrite the request, call `next.run(req)` zero or
/// more times, and inspect or rewrite what comes back. Not calling `next`
/// short-circuits the rest of the chain.
///
/// ```
/// use async_trait::async_trait;
/// use reqstore_core::{Middleware, Next, Request, Response, Result};
///
/// #[derive(Debug)]
/// struct UserAgent;
///
/// #[async_trait]
/// impl Middleware for UserAgent {
///     async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response> {
///         let req = req.with_header(
///             http::header::USER_AGENT,
///             http::HeaderValue::from_static("reqstore/0.1"),
///         );
///         next.run(req).await
///     }
/// }
/// ```
#[async_trait::async_trait]
pub trait Middleware: Debug + Send + Sync + 'static {
    /// Handle the request, delegating to `next` for the rest of the chain.
    async fn handle(&self, req: Request, next: Next<'_>) -> Result<Response>;
}

/// Next is the remainder of the chain after the current stage.
///
/// It's `Copy`, so a stage can run the remainder as many times as it needs.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    ctx: &'a Context,
    stages: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    /// Run the remaining stages, ending with one exchange on the transport.
    pub async fn run(self, req: Request) -> Result<Response> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                stage
                    .handle(
                        req,
                        Next {
                            ctx: self.ctx,
                            stages: rest,
                        },
                    )
                    .await
            }
            None => transport(self.ctx, req).await,
        }
    }
}

/// The innermost step: one physical HTTP exchange.
///
/// Non-2xx responses are turned into service errors here, so every stage
/// sees the same failure shape for bad statuses and broken connections.
/// An exchange still running at the request deadline fails with
/// [`ErrorKind::Timeout`](crate::ErrorKind::Timeout).
async fn transport(ctx: &Context, mut req: Request) -> Result<Response> {
    req.headers_mut()
        .insert(X_MS_DATE, HeaderValue::from_str(&format_http_date(now()))?);

    let location = req.location();
    let http_req = req.to_http()?;
    debug!(
        "sending {} {} (attempt {}, {location})",
        http_req.method(),
        http_req.uri(),
        req.attempt() + 1
    );

    let sent = match req.deadline() {
        None => ctx.http_send(http_req).await,
        Some(deadline) => {
            match tokio::time::timeout_at(deadline, ctx.http_send(http_req)).await {
                Ok(sent) => sent,
                Err(_) => Err(Error::timeout(format!(
                    "attempt on {location} abandoned at operation deadline"
                ))),
            }
        }
    };
    let resp = sent.map_err(|err| err.with_location(location))?;
    debug!("got response {} from {location}", resp.status());

    Response::from_http(resp, location).error_for_status()
}

/// Pipeline is an ordered chain of middlewares in front of the transport.
///
/// The order is exactly the order of `stages`: the first stage sees the
/// request first and the response last. The usual setup puts the retry
/// stage first and the history stage last, so history records every
/// physical attempt:
///
/// ```
/// use std::sync::Arc;
/// use reqstore_core::{Context, HistoryMiddleware, Pipeline, RetryMiddleware, RetryPolicy};
///
/// let history = HistoryMiddleware::new();
/// let pipeline = Pipeline::new(
///     Context::new(),
///     vec![
///         Arc::new(RetryMiddleware::new(RetryPolicy::default())),
///         Arc::new(history.clone()),
///     ],
/// );
/// ```
#[derive(Clone, Debug)]
pub struct Pipeline {
    ctx: Context,
    stages: Arc<[Arc<dyn Middleware>]>,
}

impl Pipeline {
    /// Create a new pipeline with the given stages in order.
    pub fn new(ctx: Context, stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self {
            ctx,
            stages: stages.into(),
        }
    }

    /// Get the context used by the transport.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Get the stages in order.
    pub fn stages(&self) -> &[Arc<dyn Middleware>] {
        &self.stages
    }

    /// Send a request through all stages.
    ///
    /// A `x-ms-client-request-id` is assigned if the request has none, and
    /// kept for every retry of this operation.
    pub async fn send(&self, mut req: Request) -> Result<Response> {
        if !req.headers().contains_key(X_MS_CLIENT_REQUEST_ID) {
            req.headers_mut().insert(
                X_MS_CLIENT_REQUEST_ID,
                HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())?,
            );
        }

        Next {
            ctx: &self.ctx,
            stages: &self.stages,
        }
        .run(req)
        .await
    }
}
