use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Key the bearer token is stored under.
pub const AUTH_TOKEN_KEY: &str = "auth-token";

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt token file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where the client keeps its bearer token between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, PersistenceError>;
    fn save(&self, token: &str) -> Result<(), PersistenceError>;
    fn clear(&self) -> Result<(), PersistenceError>;
}

impl<S: TokenStore + ?Sized> TokenStore for Arc<S> {
    fn load(&self) -> Result<Option<String>, PersistenceError> {
        (**self).load()
    }

    fn save(&self, token: &str) -> Result<(), PersistenceError> {
        (**self).save(token)
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        (**self).clear()
    }
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.slot().clone())
    }

    fn save(&self, token: &str) -> Result<(), PersistenceError> {
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        *self.slot() = None;
        Ok(())
    }
}

/// Token kept in a small JSON object on disk, e.g. `{"auth-token": "..."}`.
/// Other keys in the file are preserved.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.snapfeed/client.json`
    pub fn default_location() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(".snapfeed").join("client.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, PersistenceError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, entries: &BTreeMap<String, String>) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, PersistenceError> {
        Ok(self.read()?.remove(AUTH_TOKEN_KEY))
    }

    fn save(&self, token: &str) -> Result<(), PersistenceError> {
        let mut entries = self.read()?;
        entries.insert(AUTH_TOKEN_KEY.to_string(), token.to_string());
        self.write(&entries)
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        let mut entries = self.read()?;
        if entries.remove(AUTH_TOKEN_KEY).is_some() {
            self.write(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save("abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("client.json"));
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn file_store_uses_auth_token_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client.json");
        let store = FileTokenStore::new(&path);
        store.save("tok").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[AUTH_TOKEN_KEY], "tok");
        assert_eq!(FileTokenStore::new(&path).load().unwrap().as_deref(), Some("tok"));
    }

    #[test]
    fn file_store_clear_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, r#"{"theme":"dark","auth-token":"tok"}"#).unwrap();

        let store = FileTokenStore::new(&path);
        store.clear().unwrap();

        assert_eq!(store.load().unwrap(), None);
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
    }

    #[test]
    fn file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileTokenStore::new(&path).load(),
            Err(PersistenceError::Json(_))
        ));
    }
}
