//! Correlation identifier lifecycle.
//!
//! # Responsibilities
//! - Own the session-scoped correlation identifier
//! - Create one lazily on first access and persist it
//! - Adopt identifiers returned by the server
//! - Degrade to an in-process identifier when the session store is unavailable
//!
//! # Design Decisions
//! - The create path runs under the store mutex, so concurrent first calls
//!   can never persist two different identifiers for the same session
//! - Storage failures are warnings, never errors: the caller's request must
//!   go out whether or not the identifier could be persisted

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use uuid::Uuid;

/// Session store key holding the current correlation identifier.
pub const CORRELATION_ID_KEY: &str = "obs.correlation_id";

/// Error type for session store access.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session store denied access: {0}")]
    Denied(String),
    #[error("session store I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Session-scoped key-value persistence.
///
/// Implementations decide what a "session" is: [`MemorySessionStore`] scopes
/// it to the process, [`FileSessionStore`] to a directory that outlives it.
pub trait SessionStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, SessionStoreError>;
    fn store(&self, key: &str, value: &str) -> Result<(), SessionStoreError>;
}

impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    fn load(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        (**self).load(key)
    }

    fn store(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        (**self).store(key, value)
    }
}

/// Process-scoped session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        let values = self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(values.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        let mut values = self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Session store persisting each key as a file under a directory.
///
/// Lets a session outlive the process when the host application ties the
/// directory to its own session scope.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, key: &str) -> Result<Option<String>, SessionStoreError> {
        match fs::read_to_string(self.dir.join(key)) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(key), value)?;
        Ok(())
    }
}

/// Owner of the session's correlation identifier.
///
/// Exactly one authoritative value exists at any time; it is created lazily,
/// written through to the session store, and replaced whenever the server
/// returns a different one.
pub struct CorrelationStore {
    session: Box<dyn SessionStore>,
    current: Mutex<Option<String>>,
}

impl CorrelationStore {
    pub fn new(session: Box<dyn SessionStore>) -> Self {
        Self {
            session,
            current: Mutex::new(None),
        }
    }

    /// Store backed by process memory only.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemorySessionStore::new()))
    }

    /// Returns the current identifier, creating and persisting one if none
    /// exists.
    ///
    /// Never fails: when the session store is unavailable the identifier
    /// lives in process memory only and a warning is emitted.
    pub fn get_or_create(&self) -> String {
        let mut current = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(id) = current.as_ref() {
            return id.clone();
        }

        let persisted = match self.session.load(CORRELATION_ID_KEY) {
            Ok(value) => value.filter(|id| !id.is_empty()),
            Err(error) => {
                tracing::warn!(%error, "failed to read correlation identifier from session store");
                None
            }
        };

        let id = persisted.unwrap_or_else(|| {
            let fresh = Uuid::new_v4().to_string();
            if let Err(error) = self.session.store(CORRELATION_ID_KEY, &fresh) {
                tracing::warn!(%error, "failed to persist correlation identifier; session-local only");
            }
            fresh
        });

        *current = Some(id.clone());
        id
    }

    /// Replaces the stored identifier with a server-supplied one.
    ///
    /// Empty input is a no-op.
    pub fn update(&self, new_id: &str) {
        if new_id.is_empty() {
            return;
        }
        let mut current = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Some(new_id.to_string());
        if let Err(error) = self.session.store(CORRELATION_ID_KEY, new_id) {
            tracing::warn!(%error, "failed to persist updated correlation identifier");
        }
    }

    /// Read-only peek at the current identifier; no create side effect.
    pub fn current(&self) -> Option<String> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
