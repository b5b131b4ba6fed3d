//! Session token storage
//!
//! A process-wide key-value store addressed by two fixed keys. Reads and
//! writes are synchronous and atomic per key; callers never hold the store
//! across an await point, so a plain mutex is enough.
//!
//! `FileSessionStore` persists the map as JSON using temp-file + rename so a
//! crash mid-write never leaves a truncated session file behind.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info};

use crate::constants::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use crate::error::{Error, Result};
use crate::token::TokenPair;

/// The two credentials a session consists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKey {
    AccessToken,
    RefreshToken,
}

impl SessionKey {
    /// Storage key under which this credential is persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionKey::AccessToken => ACCESS_TOKEN_KEY,
            SessionKey::RefreshToken => REFRESH_TOKEN_KEY,
        }
    }
}

/// Key-value store for session credentials.
///
/// `get` treats an empty stored value as absent: an empty access token means
/// the caller is unauthenticated.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: SessionKey) -> Option<String>;

    fn set(&self, key: SessionKey, value: &str) -> Result<()>;

    fn remove(&self, key: SessionKey) -> Result<()>;
}

/// Remove both tokens. Attempts both removals even if the first fails.
pub fn clear_session(store: &dyn SessionStore) -> Result<()> {
    let access = store.remove(SessionKey::AccessToken);
    let refresh = store.remove(SessionKey::RefreshToken);
    access.and(refresh)
}

/// Persist a freshly minted token pair.
///
/// The access token is required. The refresh token is only replaced when the
/// server returned a new one; otherwise the stored one stays valid.
pub fn store_pair(store: &dyn SessionStore, pair: &TokenPair) -> Result<String> {
    let access = pair.access().ok_or(Error::MissingAccessToken)?.to_owned();
    store.set(SessionKey::AccessToken, &access)?;
    if let Some(refresh) = pair.refresh() {
        store.set(SessionKey::RefreshToken, refresh)?;
    }
    Ok(access)
}

fn lock(state: &Mutex<BTreeMap<String, String>>) -> MutexGuard<'_, BTreeMap<String, String>> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory session store. Each instance is independent.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    state: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with the given tokens (absent ones stay absent).
    pub fn with_tokens(access: Option<&str>, refresh: Option<&str>) -> Self {
        let mut state = BTreeMap::new();
        if let Some(access) = access {
            state.insert(ACCESS_TOKEN_KEY.to_owned(), access.to_owned());
        }
        if let Some(refresh) = refresh {
            state.insert(REFRESH_TOKEN_KEY.to_owned(), refresh.to_owned());
        }
        Self {
            state: Mutex::new(state),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        lock(&self.state)
            .get(key.as_str())
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<()> {
        lock(&self.state).insert(key.as_str().to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: SessionKey) -> Result<()> {
        lock(&self.state).remove(key.as_str());
        Ok(())
    }
}

/// Session store backed by a JSON file (`{"accessToken": "...", ...}`).
pub struct FileSessionStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, String>>,
}

impl FileSessionStore {
    /// Load the session file, creating it as `{}` if it doesn't exist.
    pub fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let state: BTreeMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::SessionParse(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), keys = state.len(), "loaded session");
            state
        } else {
            info!(path = %path.display(), "session file not found, starting logged out");
            let state = BTreeMap::new();
            write_atomic(&path, &state)?;
            state
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: SessionKey) -> Option<String> {
        lock(&self.state)
            .get(key.as_str())
            .filter(|v| !v.is_empty())
            .cloned()
    }

    fn set(&self, key: SessionKey, value: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.insert(key.as_str().to_owned(), value.to_owned());
        debug!(key = key.as_str(), "stored session token");
        write_atomic(&self.path, &state)
    }

    fn remove(&self, key: SessionKey) -> Result<()> {
        let mut state = lock(&self.state);
        if state.remove(key.as_str()).is_some() {
            debug!(key = key.as_str(), "removed session token");
            write_atomic(&self.path, &state)?;
        }
        Ok(())
    }
}

/// Write the session map atomically with 0600 permissions on unix.
fn write_atomic(path: &Path, data: &BTreeMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::SessionParse(format!("serializing session: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Io("session path has no file name".into()))?
        .to_string_lossy();
    let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

    std::fs::write(&tmp_path, json.as_bytes())
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&tmp_path, perms)
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}
