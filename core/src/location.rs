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

//! Geo-redundant endpoint selection.

use std::fmt;
use std::fmt::Write;
use std::net::IpAddr;
use std::str::FromStr;

use http::{Method, Uri};
use serde::{Deserialize, Serialize};

use crate::constants::SECONDARY_SUFFIX;
use crate::{Error, Result};

/// The endpoint an attempt is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageLocation {
    /// The primary endpoint of the account.
    Primary,
    /// The read-only replica, `<account>-secondary`.
    Secondary,
}

impl StorageLocation {
    /// The opposite endpoint.
    pub fn other(self) -> Self {
        match self {
            StorageLocation::Primary => StorageLocation::Secondary,
            StorageLocation::Secondary => StorageLocation::Primary,
        }
    }

    /// Resolve the primary uri against this endpoint.
    pub fn resolve(self, primary: &Uri) -> Result<Uri> {
        match self {
            StorageLocation::Primary => Ok(primary.clone()),
            StorageLocation::Secondary => secondary_uri(primary),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageLocation::Primary => f.write_str("primary"),
            StorageLocation::Secondary => f.write_str("secondary"),
        }
    }
}

/// LocationMode governs which endpoints an operation may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationMode {
    /// Always use the primary endpoint.
    #[default]
    PrimaryOnly,
    /// Always use the secondary endpoint.
    SecondaryOnly,
    /// Start on the primary, alternate on every transient failure.
    PrimaryThenSecondary,
    /// Start on the secondary, alternate on every transient failure.
    SecondaryThenPrimary,
}

impl LocationMode {
    /// Endpoint used by the first attempt.
    pub fn initial_location(self) -> StorageLocation {
        match self {
            LocationMode::PrimaryOnly | LocationMode::PrimaryThenSecondary => {
                StorageLocation::Primary
            }
            LocationMode::SecondaryOnly | LocationMode::SecondaryThenPrimary => {
                StorageLocation::Secondary
            }
        }
    }

    /// Endpoint used by the attempt following a transient failure on `current`.
    ///
    /// Failover modes switch on every retry, so repeated failures ping-pong
    /// between the endpoints.
    pub fn next_location(self, current: StorageLocation) -> StorageLocation {
        match self {
            LocationMode::PrimaryOnly => StorageLocation::Primary,
            LocationMode::SecondaryOnly => StorageLocation::Secondary,
            LocationMode::PrimaryThenSecondary | LocationMode::SecondaryThenPrimary => {
                current.other()
            }
        }
    }

    /// Whether this mode alternates between endpoints.
    pub fn can_failover(self) -> bool {
        matches!(
            self,
            LocationMode::PrimaryThenSecondary | LocationMode::SecondaryThenPrimary
        )
    }

    /// The mode actually applied to a request with `method`.
    ///
    /// Only reads may touch the secondary; every other method is pinned to
    /// the primary endpoint.
    pub fn effective_for(self, method: &Method) -> Self {
        if is_read_only(method) {
            self
        } else {
            LocationMode::PrimaryOnly
        }
    }
}

impl FromStr for LocationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "primaryonly" => Ok(LocationMode::PrimaryOnly),
            "secondaryonly" => Ok(LocationMode::SecondaryOnly),
            "primarythensecondary" => Ok(LocationMode::PrimaryThenSecondary),
            "secondarythenprimary" => Ok(LocationMode::SecondaryThenPrimary),
            _ => Err(Error::config_invalid(format!(
                "unknown location mode: {s}"
            ))),
        }
    }
}

/// Check if `method` never mutates the remote state.
pub fn is_read_only(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}

/// Build the secondary uri for a primary uri.
///
/// The account name gets the `-secondary` suffix, everything else is kept:
///
/// - `https://acct.table.core.windows.net/t` => `https://acct-secondary.table.core.windows.net/t`
/// - `http://127.0.0.1:10002/acct/t` => `http://127.0.0.1:10002/acct-secondary/t`
///
/// Hosts that are IP addresses or `localhost` carry the account in the first
/// path segment (emulator style), all others in the first host label.
pub fn secondary_uri(primary: &Uri) -> Result<Uri> {
    let mut parts = primary.clone().into_parts();
    let authority = parts.authority.take().ok_or_else(|| {
        Error::request_invalid("uri without authority can't be resolved to secondary")
    })?;
    let host = authority.host();

    if is_path_style(host) {
        let paq = parts
            .path_and_query
            .as_ref()
            .map(|v| v.as_str())
            .unwrap_or("/");
        let rest = paq.strip_prefix('/').unwrap_or(paq);
        let (account, tail) = match rest.find(|c: char| c == '/' || c == '?') {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        if account.is_empty() {
            return Err(Error::request_invalid(format!(
                "uri {primary} has no account segment"
            )));
        }

        parts.path_and_query = Some(format!("/{}{tail}", with_suffix(account)).parse()?);
        parts.authority = Some(authority);
    } else {
        let (account, domain) = host.split_once('.').unwrap_or((host, ""));

        let mut s = with_suffix(account);
        if !domain.is_empty() {
            s.push('.');
            s.push_str(domain);
        }
        if let Some(port) = authority.port_u16() {
            write!(s, ":{port}")?;
        }
        parts.authority = Some(s.parse()?);
    }

    Ok(Uri::from_parts(parts)?)
}

fn with_suffix(account: &str) -> String {
    if account.ends_with(SECONDARY_SUFFIX) {
        account.to_string()
    } else {
        format!("{account}{SECONDARY_SUFFIX}")
    }
}

fn is_path_style(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost") || host.parse::<IpAddr>().is_ok()
}
