// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Refresh coordinator: single-flight token refresh with waiter fan-out.
//!
//! The first caller that finds the access token rejected moves the
//! coordinator from `Idle` to `Refreshing` and starts exactly one refresh
//! call. Everyone arriving while that call is in flight is parked as a
//! waiter. When the call settles, the outcome is published to the store
//! (success) or the session is torn down (failure), and every waiter gets
//! the same result before the state returns to `Idle`.
//!
//! The refresh call runs on its own task, so a caller that gives up (its
//! future is dropped) never strands the others. The leading caller is just
//! the first waiter.
//!
//! All writes to the credential store go through this type: refresh
//! results, [`RefreshCoordinator::install`] on login and
//! [`RefreshCoordinator::teardown`] on logout/expiry. Each write bumps an
//! epoch, and a refresh result is discarded if the epoch moved while it was
//! in flight, so a late refresh can never resurrect a logged-out session or
//! clobber a fresh login.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};

use crate::auth_api::{self, RefreshResponse};
use crate::credential::store::CredentialStore;
use crate::credential::{CredentialPair, Identity};
use crate::error::RefreshError;
use crate::events::SessionEvent;
use crate::transport::Transport;

type Outcome = Result<String, RefreshError>;

/// A caller parked on an in-flight refresh.
struct Waiter {
    id: u64,
    tx: oneshot::Sender<Outcome>,
}

/// Refresh phase. Waiters only exist while refreshing.
enum RefreshState {
    Idle,
    Refreshing { waiters: Vec<Waiter> },
}

struct Inner {
    phase: RefreshState,
    /// Bumped on every install/teardown.
    epoch: u64,
}

/// Why a session is being torn down.
#[derive(Debug, Clone)]
pub enum TeardownReason {
    Logout,
    Expired(RefreshError),
}

/// Coordinates token refresh for one session.
pub struct RefreshCoordinator {
    inner: Mutex<Inner>,
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn Transport>,
    events: broadcast::Sender<SessionEvent>,
    timeout: Duration,
    next_waiter: AtomicU64,
    refresh_calls: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
        events: broadcast::Sender<SessionEvent>,
        timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner { phase: RefreshState::Idle, epoch: 0 }),
            store,
            transport,
            events,
            timeout,
            next_waiter: AtomicU64::new(0),
            refresh_calls: AtomicU64::new(0),
        })
    }

    /// Obtain a usable access token after `stale` was rejected.
    ///
    /// `stale` is the token the failed request carried (`None` if it went
    /// out unauthenticated). If the store already holds a different token,
    /// another refresh or a login got there first and that token is
    /// returned without any network call.
    pub async fn request_refresh(self: &Arc<Self>, stale: Option<&str>) -> Outcome {
        let (id, rx) = {
            let mut inner = self.inner.lock();
            let (tx, rx) = oneshot::channel();
            let id = self.next_waiter.fetch_add(1, Ordering::Relaxed);

            match &mut inner.phase {
                RefreshState::Refreshing { waiters } => {
                    tracing::debug!(waiter = id, queued = waiters.len() + 1, "joining in-flight refresh");
                    waiters.push(Waiter { id, tx });
                }
                RefreshState::Idle => {
                    let pair = self.store.get().ok_or(RefreshError::NoSession)?;
                    if stale != Some(pair.access_token.as_str()) {
                        return Ok(pair.access_token);
                    }
                    inner.phase = RefreshState::Refreshing { waiters: vec![Waiter { id, tx }] };
                    let epoch = inner.epoch;
                    drop(inner);
                    self.spawn_refresh(pair.refresh_token, epoch);
                }
            }
            (id, rx)
        };

        let mut guard = WaitGuard { coordinator: self, id, armed: true };
        let outcome = rx.await.unwrap_or(Err(RefreshError::Abandoned));
        guard.armed = false;
        outcome
    }

    fn spawn_refresh(self: &Arc<Self>, refresh_token: String, epoch: u64) {
        let this = Arc::clone(self);
        self.refresh_calls.fetch_add(1, Ordering::Relaxed);
        tokio::spawn(async move {
            let mut task = RefreshTask { coordinator: Arc::clone(&this), epoch, done: false };
            tracing::debug!("refreshing access token");
            let result = tokio::time::timeout(
                this.timeout,
                auth_api::refresh(this.transport.as_ref(), &refresh_token),
            )
            .await
            .unwrap_or(Err(RefreshError::Timeout));
            task.done = true;
            if let Ok(token) = this.finish(epoch, refresh_token, result) {
                this.backfill_identity(epoch, &token).await;
            }
        });
    }

    /// Fetch and cache the identity after a refresh if none is cached yet
    /// (e.g. `/auth/me` failed at login). Waiters are already released.
    async fn backfill_identity(&self, epoch: u64, token: &str) {
        if self.epoch() != epoch || self.store.identity().is_some() {
            return;
        }
        match auth_api::me(self.transport.as_ref(), token).await {
            Ok(user) => {
                if self.cache_identity(epoch, user) {
                    tracing::debug!("identity cached after refresh");
                }
            }
            Err(e) => tracing::debug!(err = %e, "identity still unavailable after refresh"),
        }
    }

    /// Settle the in-flight refresh: publish or tear down, then release
    /// every waiter, then go idle. Runs entirely under the state lock so no
    /// caller can enqueue between the batch being taken and the phase
    /// change.
    fn finish(
        &self,
        epoch: u64,
        old_refresh: String,
        result: Result<RefreshResponse, RefreshError>,
    ) -> Outcome {
        let mut inner = self.inner.lock();

        let outcome: Outcome = if inner.epoch != epoch {
            // Login or logout happened mid-flight; the result belongs to a
            // session that no longer exists.
            tracing::debug!("discarding refresh result from a previous session");
            self.store.access_token().ok_or(RefreshError::NoSession)
        } else {
            match result {
                Ok(resp) => {
                    let refresh_token = resp.refresh_token.unwrap_or(old_refresh);
                    let pair = CredentialPair::issue(resp.access_token, refresh_token, resp.expires_in);
                    let token = pair.access_token.clone();
                    self.store.set(pair);
                    tracing::info!("access token refreshed");
                    let _ = self.events.send(SessionEvent::Refreshed);
                    Ok(token)
                }
                // The task died (runtime shutdown or panic); the session itself
                // may still be fine, so keep the credentials.
                Err(RefreshError::Abandoned) => Err(RefreshError::Abandoned),
                Err(e) => {
                    tracing::warn!(err = %e, "token refresh failed, ending session");
                    self.teardown_locked(&mut inner, TeardownReason::Expired(e.clone()));
                    Err(e)
                }
            }
        };

        let waiters = match std::mem::replace(&mut inner.phase, RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        };
        let released = waiters.len();
        for waiter in waiters {
            let _ = waiter.tx.send(outcome.clone());
        }
        tracing::debug!(released, ok = outcome.is_ok(), "refresh settled");
        outcome
    }

    /// Install credentials from a fresh login. Returns the new epoch.
    pub fn install(&self, pair: CredentialPair, identity: Option<Identity>) -> u64 {
        let mut inner = self.inner.lock();
        // Start from a clean slate so no identity from an earlier user survives.
        self.store.clear();
        self.store.set(pair);
        if let Some(user) = identity {
            self.store.set_identity(user);
        }
        inner.epoch += 1;
        inner.epoch
    }

    /// Cache identity for the session installed at `epoch`.
    ///
    /// Ignored if the session changed since (e.g. logout raced the
    /// `/auth/me` call). Returns whether the identity was stored.
    pub fn cache_identity(&self, epoch: u64, identity: Identity) -> bool {
        let inner = self.inner.lock();
        if inner.epoch != epoch || self.store.get().is_none() {
            return false;
        }
        self.store.set_identity(identity);
        true
    }

    /// Clear credentials and identity. Returns `false` if there was nothing
    /// to clear, in which case no event is emitted.
    pub fn teardown(&self, reason: TeardownReason) -> bool {
        let mut inner = self.inner.lock();
        self.teardown_locked(&mut inner, reason)
    }

    fn teardown_locked(&self, inner: &mut Inner, reason: TeardownReason) -> bool {
        let had_session = self.store.get().is_some() || self.store.identity().is_some();
        self.store.clear();
        inner.epoch += 1;
        if !had_session {
            return false;
        }
        let event = match reason {
            TeardownReason::Logout => SessionEvent::LoggedOut,
            TeardownReason::Expired(e) => SessionEvent::Expired { reason: e.to_string() },
        };
        let _ = self.events.send(event);
        true
    }

    /// Current session epoch.
    pub fn epoch(&self) -> u64 {
        self.inner.lock().epoch
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(self.inner.lock().phase, RefreshState::Refreshing { .. })
    }

    /// Callers currently parked on the in-flight refresh.
    pub fn waiter_count(&self) -> usize {
        match &self.inner.lock().phase {
            RefreshState::Refreshing { waiters } => waiters.len(),
            RefreshState::Idle => 0,
        }
    }

    /// Total refresh calls issued since creation.
    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::Relaxed)
    }

    fn remove_waiter(&self, id: u64) {
        let mut inner = self.inner.lock();
        if let RefreshState::Refreshing { waiters } = &mut inner.phase {
            waiters.retain(|w| w.id != id);
        }
    }
}

/// Removes a waiter whose caller stopped waiting.
struct WaitGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    id: u64,
    armed: bool,
}

impl Drop for WaitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(waiter = self.id, "waiter cancelled");
            self.coordinator.remove_waiter(self.id);
        }
    }
}

/// Settles the refresh as abandoned if the task dies before finishing.
struct RefreshTask {
    coordinator: Arc<RefreshCoordinator>,
    epoch: u64,
    done: bool,
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.coordinator.finish(self.epoch, String::new(), Err(RefreshError::Abandoned));
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
