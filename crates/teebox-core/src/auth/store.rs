use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::SessionToken;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Keychain service name
const SERVICE_NAME: &str = "teebox";

/// Keychain account under which the single token is kept
const TOKEN_ACCOUNT: &str = "session-token";

/// Where the session token lives between runs.
///
/// Implementations hold at most one token and replace it as a whole value.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<SessionToken>>;

    fn save(&self, token: &SessionToken) -> Result<()>;

    /// Removing an absent token is not an error.
    fn clear(&self) -> Result<()>;
}

impl<T: TokenStore + ?Sized> TokenStore for Box<T> {
    fn load(&self) -> Result<Option<SessionToken>> {
        (**self).load()
    }

    fn save(&self, token: &SessionToken) -> Result<()> {
        (**self).save(token)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

// ============================================================================
// File
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    token: SessionToken,
    saved_at: DateTime<Utc>,
}

/// Token persisted as JSON in `<dir>/session.json`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn read(path: &Path) -> Result<StoredSession> {
        let contents = std::fs::read_to_string(path).context("Failed to read session file")?;
        serde_json::from_str(&contents).context("Failed to parse session file")
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<SessionToken>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let stored = Self::read(&path)?;
        debug!(saved_at = %stored.saved_at, "Session file loaded");
        Ok(Some(stored.token))
    }

    fn save(&self, token: &SessionToken) -> Result<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let stored = StoredSession {
            token: token.clone(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)?;
        std::fs::write(&path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// Token kept in the OS keychain under a fixed entry name.
#[derive(Debug)]
pub struct KeyringTokenStore {
    entry: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self> {
        let entry =
            Entry::new(SERVICE_NAME, TOKEN_ACCOUNT).context("Failed to create keyring entry")?;
        Ok(Self { entry })
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Result<Option<SessionToken>> {
        match self.entry.get_password() {
            Ok(token) => Ok(Some(SessionToken::new(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn save(&self, token: &SessionToken) -> Result<()> {
        self.entry
            .set_password(token.as_str())
            .context("Failed to store token in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

// ============================================================================
// In memory
// ============================================================================

/// Process-local store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<SessionToken>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: SessionToken) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(token))),
        }
    }

    fn with_slot<T>(&self, f: impl FnOnce(&mut Option<SessionToken>) -> T) -> Result<T> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| anyhow!("Token store lock poisoned"))?;
        Ok(f(&mut slot))
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<SessionToken>> {
        self.with_slot(|slot| slot.clone())
    }

    fn save(&self, token: &SessionToken) -> Result<()> {
        self.with_slot(|slot| *slot = Some(token.clone()))
    }

    fn clear(&self) -> Result<()> {
        self.with_slot(|slot| *slot = None)
    }
}
