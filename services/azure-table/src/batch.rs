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

use std::collections::HashSet;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use log::debug;
use reqstore_core::{parse_service_error, Error, ErrorKind, Result};

use crate::constants::*;
use crate::multipart::{
    boundary_from_content_type, multipart_content_type, parse_http_response, parse_multipart,
    write_batch, SubResponse,
};
use crate::{BatchOperation, BatchResult};

/// Batch is an ordered set of operations applied all or nothing.
///
/// Every operation must target the same table and partition, and a row key
/// may appear only once.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    operations: Vec<BatchOperation>,
}

/// A batch serialized for the wire.
#[derive(Clone, Debug)]
pub struct EncodedBatch {
    /// Value of the outer `Content-Type`, naming the batch boundary.
    pub content_type: String,
    /// The multipart body.
    pub body: Bytes,
}

impl Batch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation.
    pub fn add(&mut self, operation: BatchOperation) -> &mut Self {
        self.operations.push(operation);
        self
    }

    /// Append an operation, builder style.
    pub fn with(mut self, operation: BatchOperation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Operations in submission order.
    pub fn operations(&self) -> &[BatchOperation] {
        &self.operations
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if the batch has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Check the batch invariants without sending anything.
    pub fn validate(&self) -> Result<()> {
        let Some(first) = self.operations.first() else {
            return Err(Error::validation("batch has no operations"));
        };
        if self.operations.len() > MAX_BATCH_OPERATIONS {
            return Err(Error::validation(format!(
                "batch has {} operations, at most {MAX_BATCH_OPERATIONS} are allowed",
                self.operations.len()
            )));
        }

        let mut row_keys = HashSet::with_capacity(self.operations.len());
        for (idx, op) in self.operations.iter().enumerate() {
            if op.partition_key() != first.partition_key() {
                return Err(Error::validation(format!(
                    "operation {idx} targets partition {:?}, batch is bound to {:?}",
                    op.partition_key(),
                    first.partition_key()
                )));
            }
            if op.table() != first.table() {
                return Err(Error::validation(format!(
                    "operation {idx} targets table {:?}, batch is bound to {:?}",
                    op.table(),
                    first.table()
                )));
            }
            if !row_keys.insert(op.row_key()) {
                return Err(Error::validation(format!(
                    "operation {idx} repeats row key {:?}",
                    op.row_key()
                )));
            }
        }

        Ok(())
    }

    /// Validate and serialize with random boundaries.
    pub fn encode(&self, base_path: &str) -> Result<EncodedBatch> {
        let id = uuid::Uuid::new_v4();
        self.encode_with_boundaries(
            base_path,
            &format!("batch_{id}"),
            &format!("changeset_{id}"),
        )
    }

    /// Validate and serialize with the given boundaries.
    ///
    /// Sub-requests get `Content-ID` 1 to n in submission order.
    pub fn encode_with_boundaries(
        &self,
        base_path: &str,
        batch_boundary: &str,
        changeset_boundary: &str,
    ) -> Result<EncodedBatch> {
        self.validate()?;

        let mut messages = Vec::with_capacity(self.operations.len());
        for (idx, op) in self.operations.iter().enumerate() {
            let mut req = op.to_sub_request(base_path)?;
            req.headers
                .insert(CONTENT_ID, HeaderValue::from(idx as u64 + 1));
            messages.push(req.to_bytes()?);
        }

        let mut body = Vec::new();
        write_batch(&mut body, batch_boundary, changeset_boundary, &messages);
        if body.len() > MAX_BATCH_SIZE {
            return Err(Error::validation(format!(
                "batch body is {} bytes, at most {MAX_BATCH_SIZE} are allowed",
                body.len()
            )));
        }

        debug!(
            "encoded batch of {} operations into {} bytes",
            self.operations.len(),
            body.len()
        );
        Ok(EncodedBatch {
            content_type: multipart_content_type(batch_boundary),
            body: body.into(),
        })
    }
}

/// Decode the response of a batch into one result per operation.
///
/// Any failing sub-operation fails the whole batch with
/// [`ErrorKind::BatchPartialFailure`] pointing at the first failing
/// operation; nothing in the batch was applied in that case.
pub fn decode_batch_response(
    operations: &[BatchOperation],
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Vec<BatchResult>> {
    if !status.is_success() {
        return Err(promote_batch_error(parse_service_error(
            status, headers, body,
        )));
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .ok_or_else(|| Error::unexpected("batch response has no content type"))?
        .to_str()?;
    let responses = parse_sub_responses(body, &boundary_from_content_type(content_type)?)?;

    let in_range = |index: usize| (index < operations.len()).then_some(index);
    // Content-ID is 1-based, positions are 0-based.
    let index_of = |pos: usize, resp: &SubResponse| -> usize {
        content_id(resp)
            .and_then(|id| id.checked_sub(1))
            .and_then(in_range)
            .unwrap_or(pos)
    };

    for (pos, resp) in responses.iter().enumerate() {
        if resp.status.is_success() {
            continue;
        }

        let err = parse_service_error(resp.status, &resp.headers, &resp.body);
        let index = content_id(resp)
            .and_then(|id| id.checked_sub(1))
            .and_then(in_range)
            .or_else(|| message_index(err.message()).and_then(in_range))
            .unwrap_or(pos);
        return Err(into_batch_failure(index, err));
    }

    if responses.len() != operations.len() {
        return Err(Error::unexpected(format!(
            "batch of {} operations got {} responses",
            operations.len(),
            responses.len()
        )));
    }

    let mut results: Vec<Option<BatchResult>> = vec![None; operations.len()];
    for (pos, resp) in responses.iter().enumerate() {
        let index = index_of(pos, resp);
        let op = operations.get(index).ok_or_else(|| {
            Error::unexpected(format!("batch response refers to unknown operation {index}"))
        })?;
        if results[index].is_some() {
            return Err(Error::unexpected(format!(
                "batch response answers operation {index} twice"
            )));
        }
        results[index] = Some(op.to_result(resp.status, &resp.headers, &resp.body)?);
    }

    Ok(results.into_iter().flatten().collect())
}

/// Turn a failure of the whole batch request into a batch failure when the
/// service names the failing operation, like `1:The specified entity already exists.`.
pub fn promote_batch_error(err: Error) -> Error {
    if err.kind() != ErrorKind::Service {
        return err;
    }
    match message_index(err.message()) {
        Some(index) => into_batch_failure(index, err),
        None => err,
    }
}

fn into_batch_failure(index: usize, err: Error) -> Error {
    let status = err.status().unwrap_or(StatusCode::BAD_REQUEST);
    let mut failure = Error::batch_partial_failure(
        index,
        status,
        format!("batch operation {index} failed: {}", err.message()),
    )
    .with_attempts(err.attempts());
    if let Some(code) = err.code() {
        failure = failure.with_code(code);
    }
    if let Some(location) = err.location() {
        failure = failure.with_location(location);
    }
    failure.with_source(err)
}

/// Collect inner responses, whether wrapped in a changeset or not.
fn parse_sub_responses(body: &[u8], boundary: &str) -> Result<Vec<SubResponse>> {
    let mut responses = Vec::new();
    for part in parse_multipart(body, boundary)? {
        let content_type = part.content_type();
        if content_type
            .to_ascii_lowercase()
            .starts_with(CONTENT_TYPE_MULTIPART)
        {
            let changeset = boundary_from_content_type(content_type)?;
            for inner in parse_multipart(&part.body, &changeset)? {
                responses.push(parse_http_response(&inner.body)?);
            }
        } else {
            responses.push(parse_http_response(&part.body)?);
        }
    }
    Ok(responses)
}

fn content_id(resp: &SubResponse) -> Option<usize> {
    resp.headers
        .get(CONTENT_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Parse the `N:` prefix the service puts on batch error messages.
fn message_index(message: &str) -> Option<usize> {
    let (prefix, _) = message.split_once(':')?;
    prefix.trim().parse().ok()
}
