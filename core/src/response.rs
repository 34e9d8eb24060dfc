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

use std::fmt::{Debug, Formatter};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use log::debug;
use serde::Deserialize;

use crate::constants::X_MS_ERROR_CODE;
use crate::{ETag, Error, Result, StorageLocation};

/// Response received for one physical attempt.
#[derive(Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    location: StorageLocation,
    attempts: u32,
}

impl Debug for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body.len())
            .field("location", &self.location)
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl Response {
    /// Create a new response.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            location: StorageLocation::Primary,
            attempts: 1,
        }
    }

    /// Build from the transport's response, remembering which endpoint served it.
    pub fn from_http(resp: http::Response<Bytes>, location: StorageLocation) -> Self {
        let (parts, body) = resp.into_parts();
        Self {
            status: parts.status,
            headers: parts.headers,
            body,
            location,
            attempts: 1,
        }
    }

    /// Set the number of attempts it took to get this response.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Number of attempts it took to get this response, `1` unless a retry
    /// stage ran.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// HTTP headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume the response and take the body.
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Endpoint that served this response.
    pub fn location(&self) -> StorageLocation {
        self.location
    }

    /// The `ETag` header, if any.
    pub fn etag(&self) -> Result<Option<ETag>> {
        ETag::from_headers(&self.headers)
    }

    /// Check if the status is 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turn non-2xx responses into a service error.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(parse_service_error(
                self.status,
                &self.headers,
                &self.body,
            )
            .with_location(self.location))
        }
    }
}

/// Build a service error from a failed response.
///
/// The error code is taken from the `x-ms-error-code` header, or from the
/// body in either the table JSON format:
///
/// ```json
/// {"odata.error":{"code":"EntityAlreadyExists","message":{"lang":"en-US","value":"..."}}}
/// ```
///
/// or the blob/file/queue XML format:
///
/// ```xml
/// <Error><Code>BlobNotFound</Code><Message>...</Message></Error>
/// ```
pub fn parse_service_error(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Error {
    let (body_code, body_message) = parse_error_body(body).unwrap_or_default();

    let code = headers
        .get(X_MS_ERROR_CODE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .or(body_code);
    let message = body_message.unwrap_or_else(|| {
        format!(
            "service responded with {}",
            status.canonical_reason().unwrap_or(status.as_str())
        )
    });

    let err = Error::service(status, message);
    match code {
        Some(code) => err.with_code(code),
        None => err,
    }
}

type ErrorDetail = (Option<String>, Option<String>);

fn parse_error_body(body: &[u8]) -> Option<ErrorDetail> {
    let text = std::str::from_utf8(body).ok()?.trim();
    if text.starts_with('{') {
        parse_json_error(text)
    } else if text.starts_with('<') {
        parse_xml_error(text)
    } else {
        None
    }
}

#[derive(Deserialize)]
struct JsonErrorEnvelope {
    #[serde(rename = "odata.error")]
    error: JsonError,
}

#[derive(Deserialize)]
struct JsonError {
    code: Option<String>,
    message: Option<JsonErrorMessage>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonErrorMessage {
    Value { value: String },
    Plain(String),
}

fn parse_json_error(text: &str) -> Option<ErrorDetail> {
    let envelope: JsonErrorEnvelope = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(err) => {
            debug!("error body is not a table error document: {err}");
            return None;
        }
    };

    let message = envelope.error.message.map(|m| match m {
        JsonErrorMessage::Value { value } => value,
        JsonErrorMessage::Plain(v) => v,
    });
    Some((envelope.error.code, message))
}

#[derive(Deserialize)]
struct XmlError {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

fn parse_xml_error(text: &str) -> Option<ErrorDetail> {
    match quick_xml::de::from_str::<XmlError>(text) {
        Ok(v) => Some((v.code, v.message.map(|m| m.trim().to_string()))),
        Err(err) => {
            debug!("error body is not a storage error document: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use http::HeaderValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_error() {
        let body = r#"{"odata.error":{"code":"EntityAlreadyExists","message":{"lang":"en-US","value":"The specified entity already exists."}}}"#;
        let err = parse_service_error(StatusCode::CONFLICT, &HeaderMap::new(), body.as_bytes());

        assert_eq!(err.kind(), ErrorKind::Service);
        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(err.code(), Some("EntityAlreadyExists"));
        assert_eq!(err.message(), "The specified entity already exists.");
    }

    #[test]
    fn test_xml_error() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<Error><Code>BlobNotFound</Code><Message>The specified blob does not exist.
RequestId:0f1c</Message></Error>"#;
        let err = parse_service_error(StatusCode::NOT_FOUND, &HeaderMap::new(), body.as_bytes());

        assert_eq!(err.code(), Some("BlobNotFound"));
        assert!(err.message().starts_with("The specified blob does not exist."));
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_header_code_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(X_MS_ERROR_CODE, HeaderValue::from_static("ServerBusy"));

        let err = parse_service_error(StatusCode::SERVICE_UNAVAILABLE, &headers, b"");
        assert_eq!(err.code(), Some("ServerBusy"));
        assert_eq!(err.message(), "service responded with Service Unavailable");
        assert!(err.is_transient());
    }

    #[test]
    fn test_error_for_status() {
        let resp = Response::new(StatusCode::NO_CONTENT, HeaderMap::new(), Bytes::new());
        assert!(resp.error_for_status().is_ok());

        let resp = Response::from_http(
            http::Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Bytes::from_static(b"oops"))
                .unwrap(),
            StorageLocation::Secondary,
        );
        let err = resp.error_for_status().unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert_eq!(err.location(), Some(StorageLocation::Secondary));
        assert_eq!(err.code(), None);
    }
}
