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

use http::StatusCode;
use thiserror::Error;

use crate::StorageLocation;

/// The error type for reqstore operations.
///
/// Besides the kind and message, an error carries the diagnostics collected
/// while the operation ran: the HTTP status and service error code of the
/// last response, how many attempts were made and which endpoint served the
/// last one.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: Option<StatusCode>,
    code: Option<String>,
    attempts: u32,
    location: Option<StorageLocation>,
    batch_index: Option<usize>,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection or timeout failure below the HTTP layer.
    ///
    /// Always retryable.
    Transport,

    /// The service answered with a non-2xx status.
    ///
    /// Retryable iff the status is 408 or 5xx.
    Service,

    /// A local contract violation detected before anything was sent.
    Validation,

    /// A sub-operation of a batch failed, so the whole batch was not applied.
    ///
    /// The failing operation is given by [`Error::batch_index`], counted
    /// from `0`, and by [`Error::batch_content_id`], counted from `1` like
    /// the `Content-ID` it was sent with. The second of three operations has
    /// index `1` and content id `2`.
    BatchPartialFailure,

    /// The configured operation timeout elapsed.
    Timeout,

    /// Request cannot be built (invalid uri, header, etc.)
    RequestInvalid,

    /// Configuration error (missing fields, invalid values)
    ConfigInvalid,

    /// Unexpected errors (malformed responses, I/O, etc.)
    Unexpected,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
            attempts: 0,
            location: None,
            batch_index: None,
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach the HTTP status code.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach the service provided error code, like `EntityAlreadyExists`.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach the number of attempts made before this error surfaced.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Attach the endpoint used by the last attempt.
    pub fn with_location(mut self, location: StorageLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status of the failed response, if any.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Service error code, if the service returned one.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Number of attempts made, `0` if the error happened before sending.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Endpoint used by the last attempt.
    pub fn location(&self) -> Option<StorageLocation> {
        self.location
    }

    /// Zero-based position of the first failing operation in a batch.
    pub fn batch_index(&self) -> Option<usize> {
        self.batch_index
    }

    /// One-based `Content-ID` of the first failing operation in a batch.
    pub fn batch_content_id(&self) -> Option<usize> {
        self.batch_index.map(|idx| idx + 1)
    }

    /// Check if this error may succeed when retried.
    ///
    /// - Transport errors are always transient.
    /// - Service errors are transient iff the status is 408 or 5xx.
    /// - Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            ErrorKind::Transport => true,
            ErrorKind::Service => self.status.is_some_and(crate::is_retryable_status),
            _ => false,
        }
    }

    /// Check if the service rejected a conditional request (`412`).
    pub fn is_precondition_failed(&self) -> bool {
        self.status == Some(StatusCode::PRECONDITION_FAILED)
    }

    /// Check if the target resource does not exist (`404`).
    pub fn is_not_found(&self) -> bool {
        self.status == Some(StatusCode::NOT_FOUND)
    }
}

// Convenience constructors
impl Error {
    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create a service error for the given status
    pub fn service(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Service, message).with_status(status)
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a batch failure pointing at the zero-based `index` of the
    /// first failing sub-operation.
    pub fn batch_partial_failure(
        index: usize,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        let mut err = Self::new(ErrorKind::BatchPartialFailure, message).with_status(status);
        err.batch_index = Some(index);
        err
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create a request invalid error
    pub fn request_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestInvalid, message)
    }

    /// Create a config invalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport error"),
            ErrorKind::Service => write!(f, "service error"),
            ErrorKind::Validation => write!(f, "validation error"),
            ErrorKind::BatchPartialFailure => write!(f, "batch not applied"),
            ErrorKind::Timeout => write!(f, "operation timed out"),
            ErrorKind::RequestInvalid => write!(f, "invalid request"),
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUriParts> for Error {
    fn from(err: http::uri::InvalidUriParts) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::method::InvalidMethod> for Error {
    fn from(err: http::method::InvalidMethod) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Error::transport("connection reset"), true; "transport")]
    #[test_case(Error::service(StatusCode::REQUEST_TIMEOUT, "timeout"), true; "service 408")]
    #[test_case(Error::service(StatusCode::INTERNAL_SERVER_ERROR, "boom"), true; "service 500")]
    #[test_case(Error::service(StatusCode::SERVICE_UNAVAILABLE, "busy"), true; "service 503")]
    #[test_case(Error::service(StatusCode::NOT_FOUND, "missing"), false; "service 404")]
    #[test_case(Error::service(StatusCode::CONFLICT, "exists"), false; "service 409")]
    #[test_case(Error::validation("bad batch"), false; "validation")]
    #[test_case(Error::timeout("too slow"), false; "timeout")]
    #[test_case(
        Error::batch_partial_failure(1, StatusCode::INTERNAL_SERVER_ERROR, "inner"),
        false;
        "batch failure"
    )]
    fn test_is_transient(err: Error, expected: bool) {
        assert_eq!(err.is_transient(), expected, "{err:?}");
    }

    #[test]
    fn test_batch_index() {
        let err = Error::batch_partial_failure(1, StatusCode::PRECONDITION_FAILED, "mismatch");

        assert_eq!(err.kind(), ErrorKind::BatchPartialFailure);
        assert_eq!(err.batch_index(), Some(1));
        assert_eq!(err.batch_content_id(), Some(2));
        assert!(err.is_precondition_failed());
    }

    #[test]
    fn test_diagnostics() {
        let err = Error::service(StatusCode::BAD_GATEWAY, "bad gateway")
            .with_code("ServerBusy")
            .with_attempts(4)
            .with_location(StorageLocation::Secondary);

        assert_eq!(err.to_string(), "bad gateway");
        assert_eq!(err.code(), Some("ServerBusy"));
        assert_eq!(err.attempts(), 4);
        assert_eq!(err.location(), Some(StorageLocation::Secondary));
    }
}
