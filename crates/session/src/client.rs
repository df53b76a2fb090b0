// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated API client.
//!
//! Every call goes: augment → transport → classify. A first 401 parks the
//! call on the refresh coordinator and replays it once with the token the
//! refresh produced; a second 401 is surfaced as
//! [`SessionError::Unauthorized`]. Anything else is returned untouched.

use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::auth_api;
use crate::credential::Identity;
use crate::error::SessionError;
use crate::refresh::RefreshCoordinator;
use crate::transport::hooks::{FailureDetector, RequestAugmenter, Verdict};
use crate::transport::{ApiRequest, ApiResponse, Transport};

/// Cheap-to-clone handle for issuing authenticated requests.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    augmenter: RequestAugmenter,
    detector: FailureDetector,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        augmenter: RequestAugmenter,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self { transport, augmenter, detector: FailureDetector, coordinator }
    }

    /// Send a request through the session pipeline.
    ///
    /// Non-401 statuses (including 5xx) come back as `Ok`; use
    /// [`ApiResponse::error_for_status`] or the JSON helpers to fail on them.
    pub async fn send(&self, mut req: ApiRequest) -> Result<ApiResponse, SessionError> {
        let mut token = self.augmenter.augment(&mut req);
        loop {
            let result = self.transport.send(&req).await;
            match self.detector.classify(&req, &result) {
                Verdict::Pass => return Ok(result?),
                Verdict::Unauthorized => {
                    tracing::debug!(method = %req.method, path = %req.path, "still unauthorized after refresh");
                    return Err(SessionError::Unauthorized);
                }
                Verdict::Refresh => {
                    tracing::debug!(method = %req.method, path = %req.path, "unauthorized, awaiting refresh");
                    let fresh = self.coordinator.request_refresh(token.as_deref()).await?;
                    req.mark_retried();
                    if !req.set_bearer(&fresh) {
                        req.clear_bearer();
                    }
                    token = Some(fresh);
                }
            }
        }
    }

    /// Send and decode a JSON body, failing on non-2xx.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, SessionError> {
        let mut req = ApiRequest::new(method, path);
        req.body = body;
        self.send(req).await?.error_for_status()?.json()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SessionError> {
        self.request_json(Method::GET, path, None).await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, SessionError> {
        self.request_json(Method::POST, path, Some(body)).await
    }

    pub async fn put_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, SessionError> {
        self.request_json(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), SessionError> {
        self.send(ApiRequest::new(Method::DELETE, path)).await?.error_for_status()?;
        Ok(())
    }

    /// `GET /auth/me` through the pipeline.
    pub async fn me(&self) -> Result<Identity, SessionError> {
        let resp = self.send(ApiRequest::get(auth_api::ME_PATH)).await?.error_for_status()?;
        auth_api::decode(&resp)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
