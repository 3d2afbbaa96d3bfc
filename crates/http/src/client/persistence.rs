//! Refresh-token persistence backends

use super::refresh_cookie::RefreshCookie;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::debug;

/// Errors raised by a persistence backend
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed refresh cookie: {0}")]
    Cookie(String),
}

/// Storage that survives process restarts for the refresh-token cookie
///
/// Backends report failures; the token store decides how to degrade.
pub trait TokenPersistence: Send + Sync {
    /// Replace the stored cookie
    fn save(&self, cookie: &RefreshCookie) -> Result<(), PersistenceError>;

    /// Read the stored cookie, expired or not
    fn load(&self) -> Result<Option<RefreshCookie>, PersistenceError>;

    /// Remove the stored cookie; succeeds when nothing is stored
    fn clear(&self) -> Result<(), PersistenceError>;
}

/// In-process persistence, lost when the process exits
#[derive(Default)]
pub struct MemoryPersistence {
    slot: Mutex<Option<RefreshCookie>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated persistence, as if a previous session had saved `cookie`
    pub fn with_cookie(cookie: RefreshCookie) -> Self {
        Self {
            slot: Mutex::new(Some(cookie)),
        }
    }
}

impl TokenPersistence for MemoryPersistence {
    fn save(&self, cookie: &RefreshCookie) -> Result<(), PersistenceError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(cookie.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<RefreshCookie>, PersistenceError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        Ok(())
    }
}

/// Stores the serialized cookie in a single file
///
/// The file holds exactly the `Set-Cookie` value a browser would have
/// received, so expiry and attributes survive restarts unchanged.
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenPersistence for FilePersistence {
    fn save(&self, cookie: &RefreshCookie) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, cookie.to_header_value())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %self.path.display(), "Saved refresh cookie");
        Ok(())
    }

    fn load(&self) -> Result<Option<RefreshCookie>, PersistenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => RefreshCookie::parse(&contents).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed refresh cookie");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
