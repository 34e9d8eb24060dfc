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

use std::collections::HashMap;

use reqstore_core::{Context, Env, HttpSend, OsEnv, Result};
use reqstore_http_send_reqwest::ReqwestHttpSend;
use reqwest::Client;

/// DefaultContext sends requests with [`reqwest`] and reads the process
/// environment.
#[derive(Debug, Default, Clone)]
pub struct DefaultContext {
    http: ReqwestHttpSend,
}

impl DefaultContext {
    /// Create a default context with a fresh [`Client`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a default context sending through `client`.
    pub fn with_client(client: Client) -> Self {
        Self {
            http: ReqwestHttpSend::new(client),
        }
    }

    /// Build a [`Context`] using this context for both transport and env.
    pub fn into_context(self) -> Context {
        Context::new().with_http_send(self.clone()).with_env(self)
    }
}

#[async_trait::async_trait]
impl HttpSend for DefaultContext {
    async fn http_send(
        &self,
        req: http::Request<bytes::Bytes>,
    ) -> Result<http::Response<bytes::Bytes>> {
        self.http.http_send(req).await
    }
}

impl Env for DefaultContext {
    fn var(&self, key: &str) -> Option<String> {
        OsEnv.var(key)
    }

    fn vars(&self) -> HashMap<String, String> {
        OsEnv.vars()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_process_env() {
        let ctx = DefaultContext::new().into_context();

        assert_eq!(ctx.env_var("PATH"), std::env::var("PATH").ok());
        assert_eq!(ctx.env_var("REQSTORE_SURELY_UNSET_VARIABLE"), None);
    }

    #[tokio::test]
    async fn test_transport_error() {
        let ctx = DefaultContext::new().into_context();
        let req = http::Request::get("http://127.0.0.1:1/")
            .body(bytes::Bytes::new())
            .unwrap();

        let err = ctx.http_send(req).await.unwrap_err();
        assert!(err.is_transient());
    }
}
