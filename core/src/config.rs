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

//! Retry and failover settings.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::{Context, Error, LocationMode, Result, RetryKind, RetryPolicy};

/// Config carries the retry and failover settings consumed by the pipeline.
///
/// ```toml
/// max_retries = 5
/// retry_interval = 2
/// retry_interval_unit = "seconds"
/// retry_policy = "linear"
/// location_mode = "primary_then_secondary"
/// timeout_ms = 30000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Retries allowed beyond the first try.
    ///
    /// - env value: [`REQSTORE_MAX_RETRIES`]
    pub max_retries: u32,
    /// Base retry interval, counted in `retry_interval_unit`.
    ///
    /// - env value: [`REQSTORE_RETRY_INTERVAL`]
    pub retry_interval: u64,
    /// Unit of `retry_interval`.
    ///
    /// - env value: [`REQSTORE_RETRY_INTERVAL_UNIT`]
    pub retry_interval_unit: TimeUnit,
    /// How the wait grows between attempts.
    ///
    /// - env value: [`REQSTORE_RETRY_POLICY`]
    pub retry_policy: RetryKind,
    /// Endpoints read operations may use.
    ///
    /// - env value: [`REQSTORE_LOCATION_MODE`]
    pub location_mode: LocationMode,
    /// Bound on the total time spent on one operation, across all attempts.
    ///
    /// - env value: [`REQSTORE_TIMEOUT_MS`]
    pub timeout_ms: Option<u64>,
    /// Treat `404` from the secondary as transient while failing over.
    ///
    /// - env value: [`REQSTORE_RETRY_SECONDARY_NOT_FOUND`]
    pub retry_secondary_not_found: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_interval: DEFAULT_RETRY_INTERVAL_MS,
            retry_interval_unit: TimeUnit::Milliseconds,
            retry_policy: RetryKind::Exponential,
            location_mode: LocationMode::PrimaryOnly,
            timeout_ms: None,
            retry_secondary_not_found: false,
        }
    }
}

/// Unit of the configured retry interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    /// Milliseconds
    #[default]
    Milliseconds,
    /// Seconds
    Seconds,
}

impl TimeUnit {
    /// Convert `value` counted in this unit into a duration.
    pub fn to_duration(self, value: u64) -> Duration {
        match self {
            TimeUnit::Milliseconds => Duration::from_millis(value),
            TimeUnit::Seconds => Duration::from_secs(value),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ms" | "millis" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "s" | "secs" | "seconds" => Ok(TimeUnit::Seconds),
            _ => Err(Error::config_invalid(format!("unknown time unit: {s}"))),
        }
    }
}

impl Config {
    /// Load config from env.
    ///
    /// Values present in env override the current ones.
    pub fn from_env(mut self, ctx: &Context) -> Result<Self> {
        let envs = ctx.env_vars();

        if let Some(v) = envs.get(REQSTORE_MAX_RETRIES) {
            self.max_retries = parse_env(REQSTORE_MAX_RETRIES, v)?;
        }
        if let Some(v) = envs.get(REQSTORE_RETRY_INTERVAL) {
            self.retry_interval = parse_env(REQSTORE_RETRY_INTERVAL, v)?;
        }
        if let Some(v) = envs.get(REQSTORE_RETRY_INTERVAL_UNIT) {
            self.retry_interval_unit = v.parse()?;
        }
        if let Some(v) = envs.get(REQSTORE_RETRY_POLICY) {
            self.retry_policy = v.parse()?;
        }
        if let Some(v) = envs.get(REQSTORE_LOCATION_MODE) {
            self.location_mode = v.parse()?;
        }
        if let Some(v) = envs.get(REQSTORE_TIMEOUT_MS) {
            self.timeout_ms = Some(parse_env(REQSTORE_TIMEOUT_MS, v)?);
        }
        if let Some(v) = envs.get(REQSTORE_RETRY_SECONDARY_NOT_FOUND) {
            self.retry_secondary_not_found = parse_env(REQSTORE_RETRY_SECONDARY_NOT_FOUND, v)?;
        }

        Ok(self)
    }

    /// Parse config from a toml document.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            Error::config_invalid("failed to parse config").with_source(anyhow::Error::new(e))
        })
    }

    /// The retry policy described by this config.
    pub fn retry_policy(&self) -> RetryPolicy {
        let interval = self.retry_interval_unit.to_duration(self.retry_interval);
        let policy = match self.retry_policy {
            RetryKind::Linear => RetryPolicy::linear(self.max_retries, interval),
            RetryKind::Exponential => RetryPolicy::exponential(self.max_retries, interval),
        };
        policy.with_retry_secondary_not_found(self.retry_secondary_not_found)
    }

    /// The operation timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value.trim().parse().map_err(|e| {
        Error::config_invalid(format!("invalid value for {key}: {value}"))
            .with_source(anyhow::Error::new(e))
    })
}
