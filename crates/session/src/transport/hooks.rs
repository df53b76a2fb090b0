// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request augmentation and response classification hooks.
//!
//! These are the two extension points any transport needs to take part in
//! the session: stamp the bearer token on the way out, and decide on the way
//! back whether a response should trigger a refresh.

use std::sync::Arc;

use crate::credential::store::CredentialStore;
use crate::error::TransportError;
use crate::transport::{ApiRequest, ApiResponse};

/// Attaches the current access token to outbound requests.
#[derive(Clone)]
pub struct RequestAugmenter {
    store: Arc<dyn CredentialStore>,
}

impl RequestAugmenter {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Set `Authorization: Bearer <token>` from the store.
    ///
    /// Returns the token that was attached. With no stored token the request
    /// goes out unauthenticated and any previous header is removed.
    pub fn augment(&self, req: &mut ApiRequest) -> Option<String> {
        match self.store.access_token() {
            Some(token) if req.set_bearer(&token) => Some(token),
            Some(_) => {
                tracing::warn!(path = %req.path, "stored access token is not a valid header value");
                req.clear_bearer();
                None
            }
            None => {
                req.clear_bearer();
                None
            }
        }
    }
}

/// What the pipeline should do with a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the result to the caller unchanged.
    Pass,
    /// First 401: refresh and replay once.
    Refresh,
    /// 401 on a replayed request: terminal auth failure.
    Unauthorized,
}

/// Classifies responses for the refresh-and-replay policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureDetector;

impl FailureDetector {
    pub fn classify(
        &self,
        req: &ApiRequest,
        result: &Result<ApiResponse, TransportError>,
    ) -> Verdict {
        match result {
            Ok(resp) if resp.is_unauthorized() => {
                if req.is_retried() {
                    Verdict::Unauthorized
                } else {
                    Verdict::Refresh
                }
            }
            _ => Verdict::Pass,
        }
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
