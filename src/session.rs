//! Session persistence: bearer token plus cached user profile.
//!
//! The store is an explicit dependency injected into the gateway so the
//! HTTP layer can be exercised in tests with an in-memory fake.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::domain::User;

/// An authenticated session: created at login, destroyed at logout or on
/// any 401 response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Load/save/clear access to the persisted session
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<Session>;
    fn save(&self, session: &Session) -> io::Result<()>;
    fn clear(&self);
}

/// File-backed store used by the CLI (JSON under the data directory)
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Session> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("Discarding unreadable session file: {}", e);
                None
            }
        }
    }

    fn save(&self, session: &Session) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, contents)
    }

    fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove session file: {}", e);
            }
        }
    }
}

/// In-memory store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        self.slot.lock().expect("session lock poisoned").clone()
    }

    fn save(&self, session: &Session) -> io::Result<()> {
        *self.slot.lock().expect("session lock poisoned") = Some(session.clone());
        Ok(())
    }

    fn clear(&self) {
        *self.slot.lock().expect("session lock poisoned") = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        Session {
            token: "tok-123".to_string(),
            user: User {
                id: 1,
                username: "admin".to_string(),
                email: Some("admin@codevault.example".to_string()),
                is_admin: true,
            },
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));

        assert!(store.load().is_none());
        store.save(&test_session()).unwrap();
        assert_eq!(store.load().unwrap(), test_session());

        store.clear();
        assert!(store.load().is_none());
        // Clearing an already-clear store is a no-op
        store.clear();
    }

    #[test]
    fn test_file_store_ignores_corrupt_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileSessionStore::new(path);
        assert!(store.load().is_none());
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert!(store.load().is_none());
        store.save(&test_session()).unwrap();
        assert_eq!(store.load().unwrap().token, "tok-123");
        store.clear();
        assert!(store.load().is_none());
    }
}
