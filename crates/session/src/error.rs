// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Transport-level failure: the request never produced an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Timeout => "timed out",
            Self::Connect => "connection failed",
            Self::Other => "transport error",
        })
    }
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    /// Timeouts and connect failures are worth retrying by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, TransportErrorKind::Timeout | TransportErrorKind::Connect)
    }
}

/// Why a refresh did not produce a new access token.
///
/// Cloned to every waiter queued on the same refresh, so all of them see
/// the identical failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The refresh endpoint answered with a non-success status.
    #[error("refresh rejected ({status}): {body}")]
    Rejected { status: u16, body: String },
    /// The refresh call exceeded its deadline.
    #[error("refresh timed out")]
    Timeout,
    #[error("refresh transport failure: {0}")]
    Network(String),
    #[error("refresh response malformed: {0}")]
    Decode(String),
    /// Nothing to refresh with: no credentials are stored.
    #[error("no active session")]
    NoSession,
    /// The refresh task went away without reporting.
    #[error("refresh abandoned")]
    Abandoned,
}

impl RefreshError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "REFRESH_REJECTED",
            Self::Timeout => "REFRESH_TIMEOUT",
            Self::Network(_) => "REFRESH_NETWORK",
            Self::Decode(_) => "REFRESH_DECODE",
            Self::NoSession => "NO_SESSION",
            Self::Abandoned => "REFRESH_ABANDONED",
        }
    }
}

/// Errors surfaced to callers of the session layer.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A request still got 401 after one refresh-and-replay.
    #[error("unauthorized")]
    Unauthorized,
    /// Refresh failed; the session has been torn down.
    #[error("session expired: {0}")]
    RefreshFailed(#[from] RefreshError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A non-success status outside the auth contract.
    #[error("request failed ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl SessionError {
    /// Machine-readable error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RefreshFailed(RefreshError::Abandoned) => "REFRESH_ABANDONED",
            Self::RefreshFailed(_) => "SESSION_EXPIRED",
            Self::Transport(_) => "TRANSPORT",
            Self::Status { .. } => "UPSTREAM_ERROR",
            Self::Decode(_) => "DECODE",
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }

    /// Whether the caller may simply try the same call again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Whether the session is gone and the user must log in again.
    ///
    /// An abandoned refresh left the credentials in place, so it does not
    /// count.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::RefreshFailed(e) if *e != RefreshError::Abandoned)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
