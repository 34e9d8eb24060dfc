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

//! Constants shared by reqstore crates.

// Headers used by storage services.

/// Request timestamp, stamped on every attempt.
pub const X_MS_DATE: &str = "x-ms-date";
/// Caller provided id, kept across retries of one operation.
pub const X_MS_CLIENT_REQUEST_ID: &str = "x-ms-client-request-id";
/// Service error code of a failed response.
pub const X_MS_ERROR_CODE: &str = "x-ms-error-code";
/// Service assigned id of a request.
pub const X_MS_REQUEST_ID: &str = "x-ms-request-id";

/// Suffix appended to the account name to reach the secondary endpoint.
pub const SECONDARY_SUFFIX: &str = "-secondary";

/// Retries allowed beyond the first try by default.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default base retry interval in milliseconds.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1000;

// Env values used to build the config.

/// Env key of `Config::max_retries`.
pub const REQSTORE_MAX_RETRIES: &str = "REQSTORE_MAX_RETRIES";
/// Env key of `Config::retry_interval`.
pub const REQSTORE_RETRY_INTERVAL: &str = "REQSTORE_RETRY_INTERVAL";
/// Env key of `Config::retry_interval_unit`.
pub const REQSTORE_RETRY_INTERVAL_UNIT: &str = "REQSTORE_RETRY_INTERVAL_UNIT";
/// Env key of `Config::retry_policy`.
pub const REQSTORE_RETRY_POLICY: &str = "REQSTORE_RETRY_POLICY";
/// Env key of `Config::location_mode`.
pub const REQSTORE_LOCATION_MODE: &str = "REQSTORE_LOCATION_MODE";
/// Env key of `Config::timeout_ms`.
pub const REQSTORE_TIMEOUT_MS: &str = "REQSTORE_TIMEOUT_MS";
/// Env key of `Config::retry_secondary_not_found`.
pub const REQSTORE_RETRY_SECONDARY_NOT_FOUND: &str = "REQSTORE_RETRY_SECONDARY_NOT_FOUND";
