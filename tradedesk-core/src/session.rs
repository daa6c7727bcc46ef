//! Explicit session context with pluggable persistence.
//!
//! The remembered login lives behind a [`SessionStore`]; nothing reads ambient
//! global state. [`FileSessionStore`] keeps a login across process restarts.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{DeskError, DeskResult};
use crate::models::UserRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub role: UserRole,
}

impl Session {
    pub fn can_manage_tickets(&self) -> bool {
        self.role == UserRole::Agent
    }
}

pub trait SessionStore: Send + Sync {
    fn read(&self) -> DeskResult<Option<Session>>;
    fn write(&self, session: &Session) -> DeskResult<()>;
    fn clear(&self) -> DeskResult<()>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn read(&self) -> DeskResult<Option<Session>> {
        Ok(self.slot.read().clone())
    }

    fn write(&self, session: &Session) -> DeskResult<()> {
        *self.slot.write() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> DeskResult<()> {
        *self.slot.write() = None;
        Ok(())
    }
}

/// Stores the session as JSON at a fixed path.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn read(&self) -> DeskResult<Option<Session>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Discarding unreadable session file");
                Ok(None)
            }
        }
    }

    fn write(&self, session: &Session) -> DeskResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(session)?)?;
        Ok(())
    }

    fn clear(&self) -> DeskResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The current login, cached in memory and mirrored to a [`SessionStore`].
pub struct SessionContext {
    store: Box<dyn SessionStore>,
    current: RwLock<Option<Session>>,
}

impl SessionContext {
    /// Build a context, restoring any session the store remembers.
    pub fn restore(store: Box<dyn SessionStore>) -> DeskResult<Self> {
        let current = store.read()?;
        if let Some(s) = &current {
            tracing::debug!(user_id = %s.user_id, "Restored session");
        }
        Ok(Self {
            store,
            current: RwLock::new(current),
        })
    }

    /// A context with nothing remembered and nothing persisted.
    pub fn in_memory() -> Self {
        Self {
            store: Box::new(MemorySessionStore::new()),
            current: RwLock::new(None),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.current.read().as_ref().map(|s| s.token.clone())
    }

    pub fn require(&self) -> DeskResult<Session> {
        self.current().ok_or(DeskError::Unauthenticated)
    }

    pub fn begin(&self, session: Session) -> DeskResult<()> {
        self.store.write(&session)?;
        tracing::info!(user_id = %session.user_id, role = ?session.role, "Session started");
        *self.current.write() = Some(session);
        Ok(())
    }

    /// Forget the session. The in-memory copy is dropped even if the store fails.
    pub fn end(&self) -> DeskResult<()> {
        *self.current.write() = None;
        self.store.clear()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("signed_in", &self.current.read().is_some())
            .finish()
    }
}
