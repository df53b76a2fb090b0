// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential store contract and the in-memory implementation.

use parking_lot::Mutex;

use crate::credential::{CredentialPair, Identity};

/// Synchronous holder for the session's credentials and cached identity.
///
/// Implementations never touch the network. Writers are limited to the
/// refresh coordinator (refresh, login install, teardown); everything else
/// only reads.
pub trait CredentialStore: Send + Sync {
    /// Current credential pair, if any.
    fn get(&self) -> Option<CredentialPair>;

    /// Replace the credential pair as one unit.
    fn set(&self, pair: CredentialPair);

    /// Drop the pair and the identity. A no-op when already empty.
    fn clear(&self);

    /// Cached identity, if any.
    fn identity(&self) -> Option<Identity>;

    fn set_identity(&self, identity: Identity);

    /// Current access token. Shorthand used on every outbound request.
    fn access_token(&self) -> Option<String> {
        self.get().map(|p| p.access_token)
    }
}

/// Everything a store holds.
#[derive(Debug, Default, Clone)]
pub(crate) struct Snapshot {
    pub pair: Option<CredentialPair>,
    pub identity: Option<Identity>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.pair.is_none() && self.identity.is_none()
    }
}

/// Process-local store. Lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a pair (useful for embedding and tests).
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self { inner: Mutex::new(Snapshot { pair: Some(pair), identity: None }) }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Option<CredentialPair> {
        self.inner.lock().pair.clone()
    }

    fn set(&self, pair: CredentialPair) {
        self.inner.lock().pair = Some(pair);
    }

    fn clear(&self) {
        *self.inner.lock() = Snapshot::default();
    }

    fn identity(&self) -> Option<Identity> {
        self.inner.lock().identity.clone()
    }

    fn set_identity(&self, identity: Identity) {
        self.inner.lock().identity = Some(identity);
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
