// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a portal API session.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Base URL of the portal REST API.
    #[arg(long, default_value = "http://127.0.0.1:8000/api", env = "PORTAL_API_URL")]
    pub api_url: String,

    /// Directory holding the persisted session. Defaults to the XDG state dir.
    #[arg(long, env = "PORTAL_SESSION_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Timeout for ordinary API requests in milliseconds.
    #[arg(long, default_value_t = 30000, env = "PORTAL_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Timeout for the token refresh call in milliseconds. Exceeding it ends
    /// the session.
    #[arg(long, default_value_t = 10000, env = "PORTAL_REFRESH_TIMEOUT_MS")]
    pub refresh_timeout_ms: u64,

    /// Log filter (tracing `EnvFilter` syntax).
    #[arg(long, default_value = "warn", env = "PORTAL_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: `text` or `json`.
    #[arg(long, default_value = "text", env = "PORTAL_LOG_FORMAT")]
    pub log_format: String,
}

impl SessionConfig {
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(crate::credential::state_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            anyhow::bail!("--api-url must be an http(s) URL, got {:?}", self.api_url);
        }
        if self.request_timeout_ms == 0 || self.refresh_timeout_ms == 0 {
            anyhow::bail!("timeouts must be greater than zero");
        }
        match self.log_format.as_str() {
            "text" | "json" => Ok(()),
            other => anyhow::bail!("--log-format must be text or json, got {other:?}"),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
