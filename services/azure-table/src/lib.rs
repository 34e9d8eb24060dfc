//! Azure Table storage on top of the reqstore pipeline.
//!
//! This crate provides:
//! - The [`Entity`] model and single entity operations ([`BatchOperation`])
//! - Atomic batches ([`Batch`]) and their multipart wire codec
//! - [`TableClient`], which drives both through a [`reqstore_core::Pipeline`]
//!
//! # Example
//!
//! ```rust,no_run
//! use reqstore_azure_table::{Batch, BatchOperation, Entity};
//!
//! let batch = Batch::new()
//!     .with(BatchOperation::insert("tasks", Entity::new("p", "1").with_property("Done", false)))
//!     .with(BatchOperation::insert("tasks", Entity::new("p", "2").with_property("Done", true)));
//!
//! let encoded = batch.encode("").expect("batch must be valid");
//! assert!(encoded.content_type.starts_with("multipart/mixed; boundary=batch_"));
//! ```

mod constants;

mod entity;
pub use entity::Entity;

mod operation;
pub use operation::{entity_path, BatchOperation, BatchResult};

mod batch;
pub use batch::{decode_batch_response, promote_batch_error, Batch, EncodedBatch};

pub mod multipart;
pub use multipart::{parse_http_request, parse_http_response, parse_multipart, write_changeset};

mod client;
pub use client::TableClient;

pub use reqstore_core::ETag;
