//! Core components of the reqstore request pipeline.
//!
//! This crate provides the building blocks every storage service client is
//! made of: a [`Pipeline`] of [`Middleware`] stages in front of a pluggable
//! [`HttpSend`] transport, a retry and failover engine, and an attempt
//! history for diagnostics.
//!
//! ## Overview
//!
//! - **Context**: holds the HTTP transport and environment access
//! - **Pipeline**: an ordered chain of middlewares ending in one HTTP exchange
//! - **RetryMiddleware**: re-runs the rest of the chain on transient failures,
//!   alternating between primary and secondary endpoints when allowed
//! - **HistoryMiddleware**: records every physical attempt
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use http::Method;
//! use reqstore_core::{
//!     Context, HistoryMiddleware, LocationMode, Pipeline, Request, RetryMiddleware, RetryPolicy,
//! };
//!
//! # async fn example() -> reqstore_core::Result<()> {
//! let history = HistoryMiddleware::new();
//! let pipeline = Pipeline::new(
//!     Context::new(),
//!     vec![
//!         Arc::new(RetryMiddleware::new(RetryPolicy::linear(3, Duration::from_secs(1)))),
//!         Arc::new(history.clone()),
//!     ],
//! );
//!
//! let req = Request::new(
//!     Method::GET,
//!     "https://acct.table.core.windows.net/Tables".parse()?,
//! )
//! .with_location_mode(LocationMode::PrimaryThenSecondary);
//!
//! let resp = pipeline.send(req).await?;
//! println!("served by {} after {} attempts", resp.location(), history.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Utilities
//!
//! - [`constants`]: header names, defaults and env keys
//! - [`time`]: Time manipulation utilities
//! - [`utils`]: General utilities including data redaction

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod constants;
pub mod time;
pub mod utils;

mod context;
pub use context::{Context, Env, HttpSend, NoopEnv, NoopHttpSend, OsEnv, StaticEnv};
mod error;
pub use error::{Error, ErrorKind, Result};
mod etag;
pub use etag::ETag;
mod location;
pub use location::{is_read_only, secondary_uri, LocationMode, StorageLocation};
mod config;
pub use config::{Config, TimeUnit};

mod request;
pub use request::Request;
mod response;
pub use response::{parse_service_error, Response};

mod pipeline;
pub use pipeline::{Middleware, Next, Pipeline};
mod retry;
pub use retry::{
    is_retryable_status, Classification, RetryContext, RetryDecision, RetryKind,
    RetryMiddleware, RetryPolicy,
};
mod history;
pub use history::{Failure, HistoryEntry, HistoryMiddleware, HistoryOutcome};
