// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session facade: the surface the rest of the portal talks to.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::auth_api;
use crate::client::ApiClient;
use crate::config::SessionConfig;
use crate::credential::persist::FileStore;
use crate::credential::store::CredentialStore;
use crate::credential::{CredentialPair, Identity};
use crate::error::{RefreshError, SessionError};
use crate::events::{self, SessionEvent};
use crate::refresh::{RefreshCoordinator, TeardownReason};
use crate::transport::hooks::RequestAugmenter;
use crate::transport::http::HttpTransport;
use crate::transport::Transport;

/// One logged-in (or logged-out) user session against the portal API.
pub struct Session {
    store: Arc<dyn CredentialStore>,
    transport: Arc<dyn Transport>,
    coordinator: Arc<RefreshCoordinator>,
    client: ApiClient,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Assemble a session from its parts.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
        refresh_timeout: Duration,
    ) -> Self {
        let (events, _) = events::channel();
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            events.clone(),
            refresh_timeout,
        );
        let client = ApiClient::new(
            Arc::clone(&transport),
            RequestAugmenter::new(Arc::clone(&store)),
            Arc::clone(&coordinator),
        );
        Self { store, transport, coordinator, client, events }
    }

    /// HTTP transport with a file-backed store, as configured.
    pub fn from_config(config: &SessionConfig) -> Self {
        let store = Arc::new(FileStore::in_dir(&config.state_dir()));
        let transport = Arc::new(HttpTransport::new(&config.api_url, config.request_timeout()));
        Self::new(store, transport, config.refresh_timeout())
    }

    /// Log in with email and password.
    ///
    /// On success the credential pair is stored and the identity is fetched
    /// from `/auth/me` and cached. Failures propagate unchanged; login never
    /// triggers a refresh.
    ///
    /// Returns the cached identity: the `/auth/me` profile, or the user from
    /// the login response if that call failed. If the session did not
    /// survive until the end of login (the refresh behind `/auth/me` was
    /// rejected, or a logout raced it) the error is returned and no
    /// `LoggedIn` is emitted.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, SessionError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(SessionError::BadRequest("email and password are required".into()));
        }

        let resp = auth_api::login(self.transport.as_ref(), email, password).await?;
        let pair = CredentialPair::issue(resp.access_token, resp.refresh_token, resp.expires_in);
        let epoch = self.coordinator.install(pair, resp.user.clone());

        let identity = match self.client.me().await {
            Ok(user) => self.coordinator.cache_identity(epoch, user.clone()).then_some(user),
            // The refresh behind /auth/me failed and already tore the session down.
            Err(e) if e.is_session_expired() => return Err(e),
            Err(e) => {
                tracing::warn!(err = %e, "login succeeded but /auth/me failed");
                resp.user
            }
        };

        // A logout (or another login) won the race; this session is gone.
        if self.coordinator.epoch() != epoch || !self.is_authenticated() {
            return Err(SessionError::RefreshFailed(RefreshError::NoSession));
        }

        let user_id = identity.as_ref().map(|u| u.id.clone());
        tracing::info!(user = user_id.as_deref().unwrap_or("unknown"), "logged in");
        let _ = self.events.send(SessionEvent::LoggedIn { user_id });
        Ok(identity)
    }

    /// Log out. The server call is best-effort; local credentials are
    /// always cleared.
    pub async fn logout(&self) {
        if let Some(pair) = self.store.get() {
            if let Err(e) = auth_api::logout(
                self.transport.as_ref(),
                Some(&pair.access_token),
                &pair.refresh_token,
            )
            .await
            {
                tracing::warn!(err = %e, "logout request failed, clearing local session anyway");
            }
        }
        if self.coordinator.teardown(TeardownReason::Logout) {
            tracing::info!("logged out");
        }
    }

    /// Cached identity, or `None` when logged out.
    pub fn current_user(&self) -> Option<Identity> {
        self.store.identity()
    }

    /// Whether an access token is held. No network call and no expiry
    /// check; expiry is discovered on the first 401.
    pub fn is_authenticated(&self) -> bool {
        self.store.access_token().is_some()
    }

    /// Stored credential pair, for status displays.
    pub fn credentials(&self) -> Option<CredentialPair> {
        self.store.get()
    }

    /// Client for business API calls.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Subscribe to lifecycle events (`Expired` is the logout signal).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
