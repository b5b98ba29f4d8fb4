//! Session state: the current credential and identity snapshot.
//!
//! The in-memory state is authoritative for the tab lifetime; every
//! mutation is mirrored to a [`SessionStore`], which is read exactly once
//! at boot. Mirror failures are logged and do not block navigation.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::nav::errors::NavError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub identity: Option<Identity>,
}

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<PersistedSession, NavError>;
    fn save(&self, session: &PersistedSession) -> Result<(), NavError>;
    fn clear(&self) -> Result<(), NavError>;
}

/// JSON file store. Corrupt content is treated as an empty session rather
/// than a fatal error, matching how a browser shrugs off bad localStorage.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<PersistedSession, NavError> {
        if !self.path.exists() {
            return Ok(PersistedSession::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str(&content) {
            Ok(session) => Ok(session),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "discarding unreadable session mirror");
                Ok(PersistedSession::default())
            }
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<(), NavError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), NavError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// In-memory store for tests and offline demos.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<PersistedSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<PersistedSession, NavError> {
        Ok(self.inner.lock().unwrap().clone())
    }

    fn save(&self, session: &PersistedSession) -> Result<(), NavError> {
        *self.inner.lock().unwrap() = session.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), NavError> {
        *self.inner.lock().unwrap() = PersistedSession::default();
        Ok(())
    }
}

/// The live session. Credential and identity move together: a replacement
/// identity swaps the whole snapshot, and clearing drops both.
pub struct SessionState {
    credential: Option<String>,
    identity: Option<Identity>,
    version: u64,
    store: Box<dyn SessionStore>,
}

impl SessionState {
    /// Read the persisted mirror once and build the live state from it.
    /// An identity without a credential is unusable and dropped.
    pub fn restore(store: Box<dyn SessionStore>) -> Self {
        let mut persisted = store.load().unwrap_or_else(|err| {
            tracing::warn!(%err, "failed to read session mirror, starting unauthenticated");
            PersistedSession::default()
        });
        if persisted.credential.is_none() && persisted.identity.is_some() {
            persisted.identity = None;
        }
        Self {
            credential: persisted.credential,
            identity: persisted.identity,
            version: 0,
            store,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Install a fresh login: credential + identity together.
    pub fn establish(&mut self, credential: String, identity: Identity) {
        self.credential = Some(credential);
        self.identity = Some(identity);
        self.version += 1;
        self.mirror();
    }

    /// Replace the identity snapshot wholesale.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
        self.version += 1;
        self.mirror();
    }

    pub fn clear(&mut self) {
        self.credential = None;
        self.identity = None;
        self.version += 1;
        if let Err(err) = self.store.clear() {
            tracing::warn!(%err, "failed to clear session mirror");
        }
    }

    fn mirror(&self) {
        let snapshot = PersistedSession {
            credential: self.credential.clone(),
            identity: self.identity.clone(),
        };
        if let Err(err) = self.store.save(&snapshot) {
            tracing::warn!(%err, "failed to mirror session to store");
        }
    }
}
