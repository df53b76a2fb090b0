// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types and raw calls for the portal auth endpoints.
//!
//! These calls bypass the refresh pipeline: a 401 from `/auth/login` or
//! `/auth/refresh` is an answer, not a reason to refresh.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::credential::Identity;
use crate::error::{RefreshError, SessionError, TransportErrorKind};
use crate::transport::{ApiRequest, ApiResponse, Transport};

pub const LOGIN_PATH: &str = "/auth/login";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const ME_PATH: &str = "/auth/me";
pub const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<Identity>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Refresh answer. Rotation is optional: a missing `refresh_token` means
/// the old one stays valid.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Body that may or may not be wrapped in a `{ "data": ... }` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum Enveloped<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Enveloped<T> {
    fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(inner) => inner,
        }
    }
}

/// Decode a JSON body, accepting both bare and `data`-wrapped shapes.
pub fn decode<T: DeserializeOwned>(resp: &ApiResponse) -> Result<T, SessionError> {
    serde_json::from_slice::<Enveloped<T>>(&resp.body)
        .map(Enveloped::into_inner)
        .map_err(|_| SessionError::Decode(format!("unrecognized body: {}", preview(resp))))
}

fn preview(resp: &ApiResponse) -> String {
    let text = resp.text();
    match text.char_indices().nth(200) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text,
    }
}

/// `POST /auth/login`.
pub async fn login(
    transport: &dyn Transport,
    email: &str,
    password: &str,
) -> Result<LoginResponse, SessionError> {
    let req = ApiRequest::post(LOGIN_PATH)
        .json(serde_json::json!({ "email": email, "password": password }));
    let resp = transport.send(&req).await?.error_for_status()?;
    decode(&resp)
}

/// `POST /auth/refresh`. Every failure maps onto [`RefreshError`].
pub async fn refresh(
    transport: &dyn Transport,
    refresh_token: &str,
) -> Result<RefreshResponse, RefreshError> {
    let req = ApiRequest::post(REFRESH_PATH)
        .json(serde_json::json!({ "refresh_token": refresh_token }));
    let resp = transport.send(&req).await.map_err(|e| match e.kind {
        TransportErrorKind::Timeout => RefreshError::Timeout,
        _ => RefreshError::Network(e.to_string()),
    })?;
    if !resp.is_success() {
        return Err(RefreshError::Rejected { status: resp.status, body: resp.text() });
    }
    decode(&resp).map_err(|e| RefreshError::Decode(e.to_string()))
}

/// `GET /auth/me` with an explicit token, outside the refresh pipeline.
pub async fn me(transport: &dyn Transport, access_token: &str) -> Result<Identity, SessionError> {
    let mut req = ApiRequest::get(ME_PATH);
    req.set_bearer(access_token);
    let resp = transport.send(&req).await?.error_for_status()?;
    decode(&resp)
}

/// `POST /auth/logout`. Callers treat any error as best-effort noise.
pub async fn logout(
    transport: &dyn Transport,
    access_token: Option<&str>,
    refresh_token: &str,
) -> Result<(), SessionError> {
    let mut req = ApiRequest::post(LOGOUT_PATH)
        .json(serde_json::json!({ "refresh_token": refresh_token }));
    if let Some(token) = access_token {
        req.set_bearer(token);
    }
    transport.send(&req).await?.error_for_status()?;
    Ok(())
}

#[cfg(test)]
#[path = "auth_api_tests.rs"]
mod tests;
