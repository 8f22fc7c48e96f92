use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

const KEYRING_SERVICE: &str = "com.finboard.dashboard";
pub const CREDENTIALS_FILE: &str = "credentials.json";

pub const KEY_TOKEN: &str = "token";
pub const KEY_USER: &str = "user";
/// Older builds wrote the bearer token here; it is migrated into `KEY_TOKEN`.
pub const LEGACY_KEY_TOKEN: &str = "jwt_token";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage contents are not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("keyring: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Durable string key/value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Drops any cached view so the next `get` sees writes made by other processes.
    fn reload(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<Map<String, Value>, StorageError> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(Map::new()),
        Ok(text) => match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
        Err(e) => Err(e.into()),
    }
}

/// A JSON object on disk, rewritten in full on every mutation.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = read_entries(&path)?;
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn open_in_dir(dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(dir)?;
        Self::open(dir.join(CREDENTIALS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, entries: &Map<String, Value>) -> Result<(), StorageError> {
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).and_then(|v| v.as_str()).map(str::to_string))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        let mut next = entries.clone();
        next.insert(key.to_string(), Value::String(value.to_string()));
        self.save(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.save(&next)?;
        *entries = next;
        Ok(())
    }

    fn reload(&self) -> Result<(), StorageError> {
        let fresh = read_entries(&self.path)?;
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        *entries = fresh;
        Ok(())
    }
}

/// OS keychain / secret service, one entry per key.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(&self.service, key)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
struct MemoryLayer {
    // `None` marks a key removed in this process, shadowing whatever is persisted.
    entries: HashMap<String, Option<String>>,
}

/// The client's persistent credential store.
///
/// Reads go to memory first, then to the durable backend. Writes always land in
/// memory; a failing backend is logged once and then ignored for the rest of the
/// process, so the session keeps working without persistence.
#[derive(Clone)]
pub struct CredentialStore {
    durable: Option<Arc<dyn KeyValueStore>>,
    memory: Arc<Mutex<MemoryLayer>>,
    degraded: Arc<AtomicBool>,
}

impl CredentialStore {
    pub fn new(durable: Arc<dyn KeyValueStore>) -> Self {
        Self {
            durable: Some(durable),
            memory: Arc::new(Mutex::new(MemoryLayer::default())),
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            durable: None,
            memory: Arc::new(Mutex::new(MemoryLayer::default())),
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True once the durable backend has failed and only memory is in use.
    pub fn is_degraded(&self) -> bool {
        self.durable.is_none() || self.degraded.load(Ordering::Relaxed)
    }

    fn backend(&self) -> Option<&Arc<dyn KeyValueStore>> {
        if self.degraded.load(Ordering::Relaxed) {
            return None;
        }
        self.durable.as_ref()
    }

    fn degrade(&self, op: &'static str, err: &StorageError) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(op, error = %err, "durable storage unavailable; continuing in memory only");
        }
    }

    fn with_memory<T>(&self, f: impl FnOnce(&mut MemoryLayer) -> T) -> T {
        let mut guard = match self.memory.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(cached) = self.with_memory(|m| m.entries.get(key).cloned()) {
            return cached;
        }

        let backend = self.backend()?;
        match backend.get(key) {
            Ok(value) => {
                self.with_memory(|m| m.entries.insert(key.to_string(), value.clone()));
                value
            }
            Err(e) => {
                self.degrade("get", &e);
                None
            }
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        self.with_memory(|m| m.entries.insert(key.to_string(), Some(value.to_string())));
        if let Some(backend) = self.backend() {
            if let Err(e) = backend.set(key, value) {
                self.degrade("set", &e);
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.with_memory(|m| m.entries.insert(key.to_string(), None));
        if let Some(backend) = self.backend() {
            if let Err(e) = backend.remove(key) {
                self.degrade("remove", &e);
            }
        }
    }

    /// Forgets what this process cached so the next reads go to the durable
    /// backend again. Once degraded, memory is the only copy and is kept.
    pub fn reload(&self) {
        let Some(backend) = self.backend() else {
            return;
        };
        if let Err(e) = backend.reload() {
            self.degrade("reload", &e);
            return;
        }
        self.with_memory(|m| m.entries.clear());
    }

    /// Moves a token stored under the legacy key into the canonical key.
    pub fn migrate_legacy_token(&self) {
        let Some(legacy) = self.get(LEGACY_KEY_TOKEN) else {
            return;
        };
        if self.get(KEY_TOKEN).filter(|t| !t.trim().is_empty()).is_none() && !legacy.trim().is_empty() {
            tracing::info!("migrating bearer token from legacy storage key");
            self.set(KEY_TOKEN, legacy.trim());
        }
        self.remove(LEGACY_KEY_TOKEN);
    }
}
