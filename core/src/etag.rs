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

use std::fmt;

use http::header::ETAG;
use http::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::Result;

/// ETag is an opaque version token of a stored resource.
///
/// Two ETags are equal iff their bytes are equal, weak validators like
/// `W/"..."` are not interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ETag(String);

impl ETag {
    /// Create a new etag from raw value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The wildcard etag `*` that matches any stored version.
    pub fn wildcard() -> Self {
        Self("*".to_string())
    }

    /// Check if this is the wildcard etag.
    pub fn is_wildcard(&self) -> bool {
        self.0 == "*"
    }

    /// Get the raw value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the `ETag` header of a response.
    pub fn from_headers(headers: &HeaderMap) -> Result<Option<Self>> {
        match headers.get(ETAG) {
            Some(v) => Ok(Some(Self(v.to_str()?.to_string()))),
            None => Ok(None),
        }
    }

    /// Convert into a header value for `If-Match`.
    pub fn to_header_value(&self) -> Result<HeaderValue> {
        Ok(HeaderValue::from_str(&self.0)?)
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ETag {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ETag {
    fn from(value: String) -> Self {
        Self(value)
    }
}
