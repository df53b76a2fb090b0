// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the session event channel.
pub const EVENT_CAPACITY: usize = 64;

/// Session lifecycle events.
///
/// The UI layer listens for [`SessionEvent::Expired`] to send the user back
/// to the login surface; the session layer itself never navigates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn { user_id: Option<String> },
    /// A new access token was published.
    Refreshed,
    /// Refresh failed and credentials were torn down. Emitted once per teardown.
    #[serde(rename = "session:expired")]
    Expired { reason: String },
    LoggedOut,
}

pub fn channel() -> (broadcast::Sender<SessionEvent>, broadcast::Receiver<SessionEvent>) {
    broadcast::channel(EVENT_CAPACITY)
}
