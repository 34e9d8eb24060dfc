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

//! Requests flowing through the pipeline.

use std::fmt::{Debug, Formatter};

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, Uri};
use tokio::time::Instant;

use crate::utils::RedactHeaders;
use crate::{LocationMode, Result, StorageLocation};

/// Request is an immutable description of one storage operation.
///
/// The uri always points at the primary endpoint; the endpoint of each
/// physical attempt is derived from [`Request::location`] when the request
/// is handed to the transport. The body is a precomputed buffer so that
/// every retry sends the same bytes.
#[derive(Clone)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    attempt: u32,
    location_mode: LocationMode,
    location: StorageLocation,
    deadline: Option<Instant>,
}

impl Debug for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("headers", &RedactHeaders(&self.headers))
            .field("body", &self.body.len())
            .field("attempt", &self.attempt)
            .field("location_mode", &self.location_mode)
            .field("location", &self.location)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Request {
    /// Create a new request against the primary endpoint.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            attempt: 0,
            location_mode: LocationMode::PrimaryOnly,
            location: StorageLocation::Primary,
            deadline: None,
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set the location mode inherited from the calling operation.
    ///
    /// Requests that may mutate state are always pinned to
    /// [`LocationMode::PrimaryOnly`], whatever is passed in.
    pub fn with_location_mode(mut self, mode: LocationMode) -> Self {
        self.location_mode = mode.effective_for(&self.method);
        self.location = self.location_mode.initial_location();
        self
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Uri resolved against the primary endpoint.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// HTTP headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable HTTP headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Number of attempts made before this one, `0` for the first try.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The effective location mode.
    pub fn location_mode(&self) -> LocationMode {
        self.location_mode
    }

    /// Endpoint this attempt targets.
    pub fn location(&self) -> StorageLocation {
        self.location
    }

    /// Instant after which the exchange is abandoned, set by the retry
    /// stage when the operation has a timeout.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The uri this attempt is sent to.
    pub fn target_uri(&self) -> Result<Uri> {
        self.location.resolve(&self.uri)
    }

    pub(crate) fn set_attempt(&mut self, attempt: u32) {
        self.attempt = attempt;
    }

    pub(crate) fn set_location(&mut self, location: StorageLocation) {
        self.location = location;
    }

    pub(crate) fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Build the `http::Request` for the transport.
    pub fn to_http(&self) -> Result<http::Request<Bytes>> {
        let mut req = http::Request::builder()
            .method(self.method.clone())
            .uri(self.target_uri()?)
            .body(self.body.clone())?;
        *req.headers_mut() = self.headers.clone();
        Ok(req)
    }
}
