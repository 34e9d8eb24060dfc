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

//! `multipart/mixed` framing used by table batches.
//!
//! A batch body nests two levels of parts: the outer `batch` part carries one
//! `changeset`, whose parts each hold a raw HTTP message:
//!
//! ```text
//! --batch_1
//! Content-Type: multipart/mixed; boundary=changeset_1
//!
//! --changeset_1
//! Content-Type: application/http
//! Content-Transfer-Encoding: binary
//!
//! POST /mytable HTTP/1.1
//! Content-ID: 1
//!
//! {"PartitionKey":"p","RowKey":"r"}
//! --changeset_1--
//!
//! --batch_1--
//! ```

use std::fmt::Write;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use reqstore_core::{Error, Result};

use crate::constants::*;

const CRLF: &str = "\r\n";

/// One part of a multipart body.
#[derive(Clone, Debug, Default)]
pub struct Part {
    /// Part headers.
    pub headers: HeaderMap,
    /// Part content.
    pub body: Bytes,
}

impl Part {
    /// The `Content-Type` of this part, empty if absent.
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

/// An HTTP request carried inside a changeset.
#[derive(Clone, Debug)]
pub struct SubRequest {
    /// Request method.
    pub method: Method,
    /// Origin form target, like `/mytable(PartitionKey='p',RowKey='r')`.
    pub path: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl SubRequest {
    /// Serialize as a raw HTTP/1.1 message.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut s = String::new();
        write!(s, "{} {} HTTP/1.1{CRLF}", self.method, self.path)?;
        write_headers(&mut s, &self.headers)?;
        s.push_str(CRLF);

        let mut buf = s.into_bytes();
        buf.extend_from_slice(&self.body);
        Ok(buf)
    }
}

/// An HTTP response carried inside a changeset.
#[derive(Clone, Debug)]
pub struct SubResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

impl SubResponse {
    /// Serialize as a raw HTTP/1.1 message.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut s = String::new();
        write!(
            s,
            "HTTP/1.1 {} {}{CRLF}",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or_default()
        )?;
        write_headers(&mut s, &self.headers)?;
        s.push_str(CRLF);

        let mut buf = s.into_bytes();
        buf.extend_from_slice(&self.body);
        Ok(buf)
    }
}

fn write_headers(s: &mut String, headers: &HeaderMap) -> Result<()> {
    for (name, value) in headers {
        write!(s, "{}: {}{CRLF}", name, value.to_str()?)?;
    }
    Ok(())
}

/// Write a changeset wrapping every message as an `application/http` part.
pub fn write_changeset(buf: &mut Vec<u8>, boundary: &str, messages: &[Vec<u8>]) {
    for message in messages {
        buf.extend_from_slice(format!("--{boundary}{CRLF}").as_bytes());
        buf.extend_from_slice(format!("Content-Type: {CONTENT_TYPE_HTTP}{CRLF}").as_bytes());
        buf.extend_from_slice(
            format!("Content-Transfer-Encoding: {BINARY}{CRLF}{CRLF}").as_bytes(),
        );
        buf.extend_from_slice(message);
        buf.extend_from_slice(CRLF.as_bytes());
    }
    buf.extend_from_slice(format!("--{boundary}--{CRLF}").as_bytes());
}

/// Write a batch holding exactly one changeset.
pub fn write_batch(
    buf: &mut Vec<u8>,
    batch_boundary: &str,
    changeset_boundary: &str,
    messages: &[Vec<u8>],
) {
    buf.extend_from_slice(format!("--{batch_boundary}{CRLF}").as_bytes());
    let content_type = format!("{CONTENT_TYPE_MULTIPART}; boundary={changeset_boundary}");
    buf.extend_from_slice(format!("Content-Type: {content_type}{CRLF}{CRLF}").as_bytes());
    write_changeset(buf, changeset_boundary, messages);
    buf.extend_from_slice(CRLF.as_bytes());
    buf.extend_from_slice(format!("--{batch_boundary}--{CRLF}").as_bytes());
}

/// Build the `Content-Type` value of a multipart body.
pub fn multipart_content_type(boundary: &str) -> String {
    format!("{CONTENT_TYPE_MULTIPART}; boundary={boundary}")
}

/// Extract the boundary parameter from a `multipart/mixed` content type.
pub fn boundary_from_content_type(content_type: &str) -> Result<String> {
    let mut params = content_type.split(';');
    let mime = params.next().unwrap_or_default().trim();
    if !mime.eq_ignore_ascii_case(CONTENT_TYPE_MULTIPART) {
        return Err(Error::unexpected(format!(
            "expected {CONTENT_TYPE_MULTIPART}, got {content_type}"
        )));
    }

    params
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::unexpected(format!("no boundary in {content_type}")))
}

/// Split a multipart body into its parts.
///
/// Anything before the first delimiter and after the close delimiter is
/// ignored. Both CRLF and bare LF line endings are accepted.
pub fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut pos = find_delimiter(body, delimiter, 0)
        .ok_or_else(|| Error::unexpected(format!("multipart body has no boundary {boundary}")))?;

    loop {
        let after = pos + delimiter.len();
        if body[after..].starts_with(b"--") {
            return Ok(parts);
        }

        let start = match find(body, b"\n", after) {
            Some(idx) => idx + 1,
            None => break,
        };
        let next = match find_delimiter(body, delimiter, start) {
            Some(idx) => idx,
            None => break,
        };

        let mut raw = &body[start..next];
        raw = raw.strip_suffix(b"\n").unwrap_or(raw);
        raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        parts.push(parse_part(raw)?);

        pos = next;
    }

    Err(Error::unexpected(format!(
        "multipart body is not closed by boundary {boundary}"
    )))
}

/// Parse a raw HTTP/1.1 response message.
pub fn parse_http_response(raw: &[u8]) -> Result<SubResponse> {
    let (start_line, headers, body) = parse_message(raw)?;

    let mut fields = start_line.splitn(3, ' ');
    let version = fields.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(Error::unexpected(format!(
            "invalid status line: {start_line}"
        )));
    }
    let status = fields
        .next()
        .and_then(|v| v.parse::<u16>().ok())
        .and_then(|v| StatusCode::from_u16(v).ok())
        .ok_or_else(|| Error::unexpected(format!("invalid status line: {start_line}")))?;

    Ok(SubResponse {
        status,
        headers,
        body,
    })
}

/// Parse a raw HTTP/1.1 request message.
pub fn parse_http_request(raw: &[u8]) -> Result<SubRequest> {
    let (start_line, headers, body) = parse_message(raw)?;

    let mut fields = start_line.split(' ');
    let (Some(method), Some(path), Some(version)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(Error::unexpected(format!(
            "invalid request line: {start_line}"
        )));
    };
    if !version.starts_with("HTTP/") {
        return Err(Error::unexpected(format!(
            "invalid request line: {start_line}"
        )));
    }

    Ok(SubRequest {
        method: Method::from_bytes(method.as_bytes())?,
        path: path.to_string(),
        headers,
        body,
    })
}

fn parse_part(raw: &[u8]) -> Result<Part> {
    let (head, body) = split_head(raw);
    Ok(Part {
        headers: parse_headers(head)?,
        body: Bytes::copy_from_slice(body),
    })
}

fn parse_message(raw: &[u8]) -> Result<(String, HeaderMap, Bytes)> {
    let (head, body) = split_head(raw);
    let head = std::str::from_utf8(head)
        .map_err(|e| Error::unexpected("http message head is not utf-8").with_source(e))?;

    let (start_line, fields) = head.split_once('\n').unwrap_or((head, ""));
    let start_line = start_line.trim_end_matches('\r').to_string();
    if start_line.is_empty() {
        return Err(Error::unexpected("http message has no start line"));
    }

    Ok((
        start_line,
        parse_headers(fields.as_bytes())?,
        Bytes::copy_from_slice(body),
    ))
}

fn parse_headers(head: &[u8]) -> Result<HeaderMap> {
    let head = std::str::from_utf8(head)
        .map_err(|e| Error::unexpected("part headers are not utf-8").with_source(e))?;

    let mut headers = HeaderMap::new();
    for line in head.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::unexpected(format!("invalid header line: {line}")))?;
        headers.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(headers)
}

/// Split at the first empty line; everything is head if there is none.
fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    let crlf = find(raw, b"\r\n\r\n", 0).map(|idx| (idx, idx + 4));
    let lf = find(raw, b"\n\n", 0).map(|idx| (idx, idx + 2));

    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };
    match split {
        Some((end, start)) => (&raw[..end], &raw[start..]),
        None => (raw, &[]),
    }
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|idx| idx + from)
}

/// Find a delimiter that starts a line.
fn find_delimiter(body: &[u8], delimiter: &[u8], from: usize) -> Option<usize> {
    let mut from = from;
    while let Some(idx) = find(body, delimiter, from) {
        if idx == 0 || body[idx - 1] == b'\n' {
            return Some(idx);
        }
        from = idx + 1;
    }
    None
}
