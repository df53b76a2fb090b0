// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential persistence: JSON file with atomic writes.
//!
//! The file holds three named entries (`access_token`, `refresh_token`,
//! `user`) plus token timestamps. They are always written together and the
//! file is removed on clear, so a crash never leaves a partial session.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::credential::store::{CredentialStore, Snapshot};
use crate::credential::{CredentialPair, Identity};

/// File name used inside the state directory.
pub const SESSION_FILE: &str = "session.json";

/// On-disk layout.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub issued_at: u64,
    #[serde(default)]
    pub expires_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Identity>,
}

impl PersistedSession {
    fn from_snapshot(snap: &Snapshot) -> Self {
        let (access_token, refresh_token, issued_at, expires_at) = match &snap.pair {
            Some(p) => (
                Some(p.access_token.clone()),
                Some(p.refresh_token.clone()),
                p.issued_at,
                p.expires_at,
            ),
            None => (None, None, 0, 0),
        };
        Self { access_token, refresh_token, issued_at, expires_at, user: snap.identity.clone() }
    }

    fn into_snapshot(self) -> Snapshot {
        // A pair is only usable with both tokens present.
        let pair = match (self.access_token, self.refresh_token) {
            (Some(access_token), Some(refresh_token)) => Some(CredentialPair {
                access_token,
                refresh_token,
                issued_at: self.issued_at,
                expires_at: self.expires_at,
            }),
            _ => None,
        };
        Snapshot { pair, identity: self.user }
    }
}

/// Load a persisted session from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<PersistedSession> {
    let contents = std::fs::read_to_string(path)?;
    let session: PersistedSession = serde_json::from_str(&contents)?;
    Ok(session)
}

/// Save a persisted session atomically (write tmp + rename).
///
/// Uses a unique temp filename (PID + counter) so concurrent saves never
/// interleave bytes in the same `.tmp` file.
pub fn save(path: &Path, session: &PersistedSession) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(session)?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    write_private(&tmp_path, json.as_bytes())?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Write `bytes` to a file that is owner-only (0600 on unix) from creation.
fn write_private(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    use std::io::Write;

    let mut opts = std::fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    let mut file = opts.open(path)?;
    #[cfg(unix)]
    {
        // `mode` only applies on creation; tighten a leftover file too.
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Remove the session file. Missing file is not an error.
pub fn remove(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Store backed by a JSON file, with an in-memory view.
///
/// Reads come from memory. Every write goes to memory first and is then
/// flushed to disk while the lock is held, so the file always matches the
/// last write. Flush failures are logged; the in-memory view stays
/// authoritative for the running process.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    inner: Mutex<Snapshot>,
}

impl FileStore {
    /// Open the store at `path`, loading any existing session.
    ///
    /// A missing file yields an empty store. An unreadable file is logged
    /// and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = if path.exists() {
            match load(&path) {
                Ok(persisted) => persisted.into_snapshot(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), err = %e, "ignoring unreadable session file");
                    Snapshot::default()
                }
            }
        } else {
            Snapshot::default()
        };
        Self { path, inner: Mutex::new(snapshot) }
    }

    /// Open `session.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::open(dir.join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, snap: &Snapshot) {
        let result = if snap.is_empty() {
            remove(&self.path)
        } else {
            save(&self.path, &PersistedSession::from_snapshot(snap))
        };
        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), err = %e, "failed to persist session");
        }
    }
}

impl CredentialStore for FileStore {
    fn get(&self) -> Option<CredentialPair> {
        self.inner.lock().pair.clone()
    }

    fn set(&self, pair: CredentialPair) {
        let mut snap = self.inner.lock();
        snap.pair = Some(pair);
        self.flush(&snap);
    }

    fn clear(&self) {
        let mut snap = self.inner.lock();
        if snap.is_empty() && !self.path.exists() {
            return;
        }
        *snap = Snapshot::default();
        self.flush(&snap);
    }

    fn identity(&self) -> Option<Identity> {
        self.inner.lock().identity.clone()
    }

    fn set_identity(&self, identity: Identity) {
        let mut snap = self.inner.lock();
        snap.identity = Some(identity);
        self.flush(&snap);
    }
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
