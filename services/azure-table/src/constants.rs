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

// Headers used by the table service.
pub const X_MS_VERSION: &str = "x-ms-version";
pub const DATA_SERVICE_VERSION: &str = "dataserviceversion";
pub const MAX_DATA_SERVICE_VERSION: &str = "maxdataserviceversion";
pub const CONTENT_ID: &str = "content-id";
pub const CONTENT_TRANSFER_ENCODING: &str = "content-transfer-encoding";
pub const PREFER: &str = "prefer";

// Header values.
pub const STORAGE_VERSION: &str = "2019-02-02";
pub const DATA_SERVICE_VERSION_3: &str = "3.0;NetFx";
pub const ACCEPT_JSON: &str = "application/json;odata=minimalmetadata";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_HTTP: &str = "application/http";
pub const CONTENT_TYPE_MULTIPART: &str = "multipart/mixed";
pub const RETURN_CONTENT: &str = "return-content";
pub const BINARY: &str = "binary";

// Entity body keys.
pub const PARTITION_KEY: &str = "PartitionKey";
pub const ROW_KEY: &str = "RowKey";
pub const ODATA_ETAG: &str = "odata.etag";
pub const ODATA_PREFIX: &str = "odata.";

/// Method used for merge operations.
pub const MERGE: &str = "MERGE";

/// Limits of one batch.
pub const MAX_BATCH_OPERATIONS: usize = 100;
pub const MAX_BATCH_SIZE: usize = 4 * 1024 * 1024;

pub const BATCH_PATH: &str = "$batch";
