// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential types and storage.
//!
//! A session owns one [`CredentialPair`] and one cached [`Identity`]. Both
//! live in a [`store::CredentialStore`]; the on-disk variant is in
//! [`persist`].

pub mod persist;
pub mod store;

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Access + refresh token pair, always replaced as a whole.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch seconds when the pair was obtained.
    #[serde(default)]
    pub issued_at: u64,
    /// Epoch seconds when the access token expires (0 = unknown).
    #[serde(default)]
    pub expires_at: u64,
}

impl CredentialPair {
    /// Build a pair issued now, with an optional lifetime in seconds.
    pub fn issue(access_token: String, refresh_token: String, expires_in: Option<u64>) -> Self {
        let now = epoch_secs();
        Self {
            access_token,
            refresh_token,
            issued_at: now,
            expires_at: expires_in.filter(|s| *s > 0).map(|s| now + s).unwrap_or(0),
        }
    }

    /// Seconds until the access token expires, if the server told us.
    pub fn expires_in(&self) -> Option<u64> {
        if self.expires_at == 0 {
            return None;
        }
        Some(self.expires_at.saturating_sub(epoch_secs()))
    }
}

// Tokens never end up in logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Cached user profile as returned by `/auth/me`.
///
/// Only `id` and `email` are relied upon; everything else the backend sends
/// is kept in `extra` so nothing is lost on a round trip through the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(deserialize_with = "id_as_string")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Accept numeric or string ids.
fn id_as_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("invalid user id: {other}"))),
    }
}

/// Resolve the state directory for persisted session data.
///
/// Checks `PORTAL_SESSION_STATE_DIR`, then `$XDG_STATE_HOME/portal/session`,
/// then `$HOME/.local/state/portal/session`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PORTAL_SESSION_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("portal/session");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/portal/session");
    }
    PathBuf::from(".portal/session")
}

/// Current time as epoch seconds.
pub fn epoch_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
