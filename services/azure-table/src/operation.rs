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

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE, IF_MATCH};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqstore_core::{ETag, Error, Result};

use crate::constants::*;
use crate::multipart::SubRequest;
use crate::Entity;

/// Characters escaped in entity keys, everything but `A-Za-z0-9-_.~`.
static KEY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One write against a table, on its own or inside a batch.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchOperation {
    /// Create the entity, fails if it exists.
    Insert {
        /// Target table.
        table: String,
        /// Entity to create.
        entity: Entity,
    },
    /// Replace the entity, fails if it does not exist or its ETag differs.
    Update {
        /// Target table.
        table: String,
        /// New content; its ETag, if any, is the required version.
        entity: Entity,
    },
    /// Merge properties into the entity, same conditions as `Update`.
    Merge {
        /// Target table.
        table: String,
        /// Properties to merge; its ETag, if any, is the required version.
        entity: Entity,
    },
    /// Merge properties, creating the entity if needed.
    InsertOrMerge {
        /// Target table.
        table: String,
        /// Properties to merge.
        entity: Entity,
    },
    /// Replace the entity, creating it if needed.
    InsertOrReplace {
        /// Target table.
        table: String,
        /// New content.
        entity: Entity,
    },
    /// Delete the entity.
    Delete {
        /// Target table.
        table: String,
        /// Partition key.
        partition_key: String,
        /// Row key.
        row_key: String,
        /// Required version, `None` deletes whatever is stored.
        etag: Option<ETag>,
    },
}

impl BatchOperation {
    /// Build an insert.
    pub fn insert(table: impl Into<String>, entity: Entity) -> Self {
        Self::Insert {
            table: table.into(),
            entity,
        }
    }

    /// Build an update.
    pub fn update(table: impl Into<String>, entity: Entity) -> Self {
        Self::Update {
            table: table.into(),
            entity,
        }
    }

    /// Build a merge.
    pub fn merge(table: impl Into<String>, entity: Entity) -> Self {
        Self::Merge {
            table: table.into(),
            entity,
        }
    }

    /// Build an insert-or-merge.
    pub fn insert_or_merge(table: impl Into<String>, entity: Entity) -> Self {
        Self::InsertOrMerge {
            table: table.into(),
            entity,
        }
    }

    /// Build an insert-or-replace.
    pub fn insert_or_replace(table: impl Into<String>, entity: Entity) -> Self {
        Self::InsertOrReplace {
            table: table.into(),
            entity,
        }
    }

    /// Build a delete.
    pub fn delete(
        table: impl Into<String>,
        partition_key: impl Into<String>,
        row_key: impl Into<String>,
        etag: Option<ETag>,
    ) -> Self {
        Self::Delete {
            table: table.into(),
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            etag,
        }
    }

    /// Target table.
    pub fn table(&self) -> &str {
        match self {
            Self::Insert { table, .. }
            | Self::Update { table, .. }
            | Self::Merge { table, .. }
            | Self::InsertOrMerge { table, .. }
            | Self::InsertOrReplace { table, .. }
            | Self::Delete { table, .. } => table,
        }
    }

    /// The entity payload, `None` for deletes.
    pub fn entity(&self) -> Option<&Entity> {
        match self {
            Self::Insert { entity, .. }
            | Self::Update { entity, .. }
            | Self::Merge { entity, .. }
            | Self::InsertOrMerge { entity, .. }
            | Self::InsertOrReplace { entity, .. } => Some(entity),
            Self::Delete { .. } => None,
        }
    }

    /// Partition key of the target entity.
    pub fn partition_key(&self) -> &str {
        match self {
            Self::Delete { partition_key, .. } => partition_key,
            _ => self.entity().map(|e| e.partition_key()).unwrap_or_default(),
        }
    }

    /// Row key of the target entity.
    pub fn row_key(&self) -> &str {
        match self {
            Self::Delete { row_key, .. } => row_key,
            _ => self.entity().map(|e| e.row_key()).unwrap_or_default(),
        }
    }

    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Merge { .. } => "merge",
            Self::InsertOrMerge { .. } => "insert_or_merge",
            Self::InsertOrReplace { .. } => "insert_or_replace",
            Self::Delete { .. } => "delete",
        }
    }

    /// HTTP method of this operation.
    pub fn method(&self) -> Result<Method> {
        Ok(match self {
            Self::Insert { .. } => Method::POST,
            Self::Update { .. } | Self::InsertOrReplace { .. } => Method::PUT,
            Self::Merge { .. } | Self::InsertOrMerge { .. } => {
                Method::from_bytes(MERGE.as_bytes())?
            }
            Self::Delete { .. } => Method::DELETE,
        })
    }

    /// Value of `If-Match`, `None` for unconditional operations.
    ///
    /// Update, merge and delete require a version and fall back to `*`.
    pub fn if_match(&self) -> Option<ETag> {
        match self {
            Self::Update { entity, .. } | Self::Merge { entity, .. } => {
                Some(entity.etag().cloned().unwrap_or_else(ETag::wildcard))
            }
            Self::Delete { etag, .. } => Some(etag.clone().unwrap_or_else(ETag::wildcard)),
            Self::Insert { .. } | Self::InsertOrMerge { .. } | Self::InsertOrReplace { .. } => {
                None
            }
        }
    }

    /// Path relative to the account, like `mytable(PartitionKey='p',RowKey='r')`.
    pub fn path(&self) -> String {
        match self {
            Self::Insert { table, .. } => table.clone(),
            _ => entity_path(self.table(), self.partition_key(), self.row_key()),
        }
    }

    /// Build the HTTP request of this operation.
    ///
    /// `base_path` is the path of the account endpoint, empty for virtual
    /// host endpoints and `/<account>` for emulator ones.
    pub fn to_sub_request(&self, base_path: &str) -> Result<SubRequest> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_JSON));
        if let Some(etag) = self.if_match() {
            headers.insert(IF_MATCH, etag.to_header_value()?);
        }

        let body = match self.entity() {
            Some(entity) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
                Bytes::from(entity.to_json()?)
            }
            None => Bytes::new(),
        };
        if matches!(self, Self::Insert { .. }) {
            headers.insert(PREFER, HeaderValue::from_static(RETURN_CONTENT));
        }

        Ok(SubRequest {
            method: self.method()?,
            path: format!("{}/{}", base_path.trim_end_matches('/'), self.path()),
            headers,
            body,
        })
    }

    /// Build the result of this operation from a successful response.
    pub fn to_result(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<BatchResult> {
        let etag = ETag::from_headers(headers)?;

        match self {
            Self::Insert { entity, .. } => {
                if status != StatusCode::NO_CONTENT && !body.is_empty() {
                    let mut inserted = Entity::from_json(body)?;
                    if inserted.etag().is_none() {
                        if let Some(etag) = etag {
                            inserted = inserted.with_etag(etag);
                        }
                    }
                    return Ok(BatchResult::InsertResult(inserted));
                }

                let mut inserted = entity.clone();
                if let Some(etag) = etag {
                    inserted = inserted.with_etag(etag);
                }
                Ok(BatchResult::InsertResult(inserted))
            }
            Self::Update { .. }
            | Self::Merge { .. }
            | Self::InsertOrMerge { .. }
            | Self::InsertOrReplace { .. } => {
                let etag = etag.ok_or_else(|| {
                    Error::unexpected(format!("{} response has no etag", self.name()))
                })?;
                Ok(BatchResult::UpdateResult(etag))
            }
            Self::Delete { row_key, .. } => Ok(BatchResult::DeletedRowKey(row_key.clone())),
        }
    }
}

/// The outcome of one successful operation.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchResult {
    /// The entity as stored by an insert.
    InsertResult(Entity),
    /// The new ETag after an update, merge or upsert.
    UpdateResult(ETag),
    /// Row key of the deleted entity.
    DeletedRowKey(String),
}

/// Path addressing one entity.
///
/// Single quotes in keys are doubled, then the keys are percent encoded.
pub fn entity_path(table: &str, partition_key: &str, row_key: &str) -> String {
    format!(
        "{table}(PartitionKey='{}',RowKey='{}')",
        encode_key(partition_key),
        encode_key(row_key)
    )
}

fn encode_key(key: &str) -> String {
    utf8_percent_encode(&key.replace('\'', "''"), &KEY_ENCODE_SET).to_string()
}
