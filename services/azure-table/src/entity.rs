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

use reqstore_core::{ETag, Error, Result};
use serde_json::{Map, Value};

use crate::constants::*;

/// Entity is one row of a table.
///
/// Properties are kept as JSON values, so typed properties are written the
/// way the service expects them:
///
/// ```
/// use reqstore_azure_table::Entity;
///
/// let entity = Entity::new("tasks", "001")
///     .with_property("Description", "take out the trash")
///     .with_property("DueDate", "2024-05-01T00:00:00Z")
///     .with_property("DueDate@odata.type", "Edm.DateTime");
/// assert_eq!(entity.row_key(), "001");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entity {
    partition_key: String,
    row_key: String,
    etag: Option<ETag>,
    properties: Map<String, Value>,
}

impl Entity {
    /// Create an entity without properties.
    pub fn new(partition_key: impl Into<String>, row_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            row_key: row_key.into(),
            etag: None,
            properties: Map::new(),
        }
    }

    /// Set a property, replacing any previous value.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set the version this entity was read at.
    pub fn with_etag(mut self, etag: ETag) -> Self {
        self.etag = Some(etag);
        self
    }

    /// Partition key.
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Row key.
    pub fn row_key(&self) -> &str {
        &self.row_key
    }

    /// ETag, if known.
    pub fn etag(&self) -> Option<&ETag> {
        self.etag.as_ref()
    }

    /// Get a property.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// All properties except the keys.
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Serialize into a request body.
    ///
    /// The ETag is not part of the body, it travels in `If-Match`.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let mut object = Map::with_capacity(self.properties.len() + 2);
        object.insert(
            PARTITION_KEY.to_string(),
            Value::String(self.partition_key.clone()),
        );
        object.insert(ROW_KEY.to_string(), Value::String(self.row_key.clone()));
        for (k, v) in &self.properties {
            if k != PARTITION_KEY && k != ROW_KEY {
                object.insert(k.clone(), v.clone());
            }
        }
        Ok(serde_json::to_vec(&Value::Object(object))?)
    }

    /// Parse an entity returned by the service.
    ///
    /// `odata.*` annotations are dropped except `odata.etag`, which becomes
    /// the entity ETag.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(body)?;
        let Value::Object(mut object) = value else {
            return Err(Error::unexpected("entity body is not a json object"));
        };

        let partition_key = take_key(&mut object, PARTITION_KEY)?;
        let row_key = take_key(&mut object, ROW_KEY)?;
        let etag = match object.remove(ODATA_ETAG) {
            Some(Value::String(v)) => Some(ETag::new(v)),
            _ => None,
        };
        object.retain(|k, _| !k.starts_with(ODATA_PREFIX));

        Ok(Self {
            partition_key,
            row_key,
            etag,
            properties: object,
        })
    }
}

fn take_key(object: &mut Map<String, Value>, key: &str) -> Result<String> {
    match object.remove(key) {
        Some(Value::String(v)) => Ok(v),
        _ => Err(Error::unexpected(format!("entity body has no {key}"))),
    }
}
