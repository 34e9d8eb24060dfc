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

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Method, Uri};
use log::debug;
use reqstore_core::{Config, Error, ErrorKind, LocationMode, Pipeline, Request, Response, Result};

use crate::batch::{decode_batch_response, promote_batch_error};
use crate::constants::*;
use crate::operation::entity_path;
use crate::{Batch, BatchOperation, BatchResult, Entity};

/// TableClient runs entity operations of one storage account through a
/// [`Pipeline`].
///
/// ```no_run
/// use std::sync::Arc;
/// use reqstore_azure_table::{Batch, BatchOperation, Entity, TableClient};
/// use reqstore_core::{Context, Pipeline, RetryMiddleware, RetryPolicy};
///
/// # async fn example() -> reqstore_core::Result<()> {
/// let pipeline = Pipeline::new(
///     Context::new(),
///     vec![Arc::new(RetryMiddleware::new(RetryPolicy::default()))],
/// );
/// let client = TableClient::new("https://acct.table.core.windows.net", pipeline)?;
///
/// let batch = Batch::new()
///     .with(BatchOperation::insert("tasks", Entity::new("p", "1")))
///     .with(BatchOperation::delete("tasks", "p", "2", None));
/// let results = client.submit_batch(&batch).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct TableClient {
    endpoint: Uri,
    pipeline: Pipeline,
    location_mode: LocationMode,
}

impl TableClient {
    /// Create a client for the account at `endpoint`.
    ///
    /// `endpoint` is the primary endpoint, like
    /// `https://acct.table.core.windows.net` or
    /// `http://127.0.0.1:10002/devstoreaccount1` for the emulator.
    pub fn new(endpoint: &str, pipeline: Pipeline) -> Result<Self> {
        let endpoint: Uri = endpoint.trim_end_matches('/').parse()?;
        if endpoint.scheme().is_none() || endpoint.authority().is_none() {
            return Err(Error::config_invalid(format!(
                "table endpoint must be an absolute uri: {endpoint}"
            )));
        }

        Ok(Self {
            endpoint,
            pipeline,
            location_mode: LocationMode::PrimaryOnly,
        })
    }

    /// Set the location mode used by reads. Writes always go to the primary.
    pub fn with_location_mode(mut self, mode: LocationMode) -> Self {
        self.location_mode = mode;
        self
    }

    /// Apply the location mode of `cfg`.
    ///
    /// Retry settings belong to the pipeline, see
    /// [`RetryMiddleware::from_config`](reqstore_core::RetryMiddleware::from_config).
    pub fn with_config(self, cfg: &Config) -> Self {
        self.with_location_mode(cfg.location_mode)
    }

    /// The location mode used by reads.
    pub fn location_mode(&self) -> LocationMode {
        self.location_mode
    }

    /// The primary endpoint.
    pub fn endpoint(&self) -> &Uri {
        &self.endpoint
    }

    /// Run a single operation.
    pub async fn execute(&self, operation: BatchOperation) -> Result<BatchResult> {
        let sub = operation.to_sub_request(self.endpoint.path())?;

        let mut req = self
            .request(sub.method, &sub.path)?
            .with_body(sub.body)
            .with_location_mode(self.location_mode);
        req.headers_mut().extend(sub.headers);

        debug!("executing {} on {}", operation.name(), sub.path);
        let resp = self.pipeline.send(req).await?;
        operation
            .to_result(resp.status(), resp.headers(), resp.body())
            .map_err(|err| with_diagnostics(err, &resp))
    }

    /// Read one entity.
    pub async fn get_entity(
        &self,
        table: &str,
        partition_key: &str,
        row_key: &str,
    ) -> Result<Entity> {
        let path = format!(
            "{}/{}",
            self.endpoint.path().trim_end_matches('/'),
            entity_path(table, partition_key, row_key)
        );
        let req = self
            .request(Method::GET, &path)?
            .with_header(ACCEPT, HeaderValue::from_static(ACCEPT_JSON))
            .with_location_mode(self.location_mode);

        let resp = self.pipeline.send(req).await?;
        let entity = Entity::from_json(resp.body()).map_err(|err| with_diagnostics(err, &resp))?;
        match (entity.etag().is_none(), resp.etag()?) {
            (true, Some(etag)) => Ok(entity.with_etag(etag)),
            _ => Ok(entity),
        }
    }

    /// Submit a batch as one atomic request.
    ///
    /// The batch is validated before anything is sent. When any operation
    /// fails, none is applied and the error is a
    /// [`ErrorKind::BatchPartialFailure`] naming the first failing one.
    pub async fn submit_batch(&self, batch: &Batch) -> Result<Vec<BatchResult>> {
        let encoded = batch.encode(self.endpoint.path())?;

        let path = format!(
            "{}/{BATCH_PATH}",
            self.endpoint.path().trim_end_matches('/')
        );
        let req = self
            .request(Method::POST, &path)?
            .with_header(CONTENT_TYPE, HeaderValue::from_str(&encoded.content_type)?)
            .with_body(encoded.body);

        debug!("submitting batch of {} operations", batch.len());
        let resp: Response = match self.pipeline.send(req).await {
            Ok(resp) => resp,
            Err(err) if err.kind() == ErrorKind::Service => return Err(promote_batch_error(err)),
            Err(err) => return Err(err),
        };

        decode_batch_response(
            batch.operations(),
            resp.status(),
            resp.headers(),
            resp.body(),
        )
        .map_err(|err| with_diagnostics(err, &resp))
    }

    fn request(&self, method: Method, path: &str) -> Result<Request> {
        let mut parts = self.endpoint.clone().into_parts();
        parts.path_and_query = Some(path.parse()?);
        let uri = Uri::from_parts(parts)?;

        Ok(Request::new(method, uri)
            .with_header(
                HeaderName::from_static(X_MS_VERSION),
                HeaderValue::from_static(STORAGE_VERSION),
            )
            .with_header(
                HeaderName::from_static(DATA_SERVICE_VERSION),
                HeaderValue::from_static(DATA_SERVICE_VERSION_3),
            )
            .with_header(
                HeaderName::from_static(MAX_DATA_SERVICE_VERSION),
                HeaderValue::from_static(DATA_SERVICE_VERSION_3),
            ))
    }
}

/// Attach the attempt count and serving endpoint of `resp` to an error
/// found while reading it.
fn with_diagnostics(err: Error, resp: &Response) -> Error {
    err.with_attempts(resp.attempts()).with_location(resp.location())
}
