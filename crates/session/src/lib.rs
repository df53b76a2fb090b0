// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated HTTP session layer for the portal API.
//!
//! Attaches bearer tokens to every request, refreshes them once when many
//! requests find them expired at the same time, replays the parked requests,
//! and tears the session down (with a single [`SessionEvent::Expired`]) when
//! the refresh fails.

pub mod auth_api;
pub mod client;
pub mod command;
pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod refresh;
pub mod session;
pub mod transport;


pub use client::ApiClient;
pub use config::SessionConfig;
pub use credential::persist::FileStore;
pub use credential::store::{CredentialStore, MemoryStore};
pub use credential::{CredentialPair, Identity};
pub use error::{RefreshError, SessionError, TransportError};
pub use events::SessionEvent;
pub use refresh::RefreshCoordinator;
pub use session::Session;
pub use transport::{ApiRequest, ApiResponse, Transport};
