//! Local key-value persistence.
//!
//! Every persisted concern (running totals, ledgers, history, settings) is a
//! JSON document under its own key. Keys are written independently; there is
//! no cross-key transaction, so readers default each key on their own.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SlotlineError};
use crate::serde_utils::{from_document, to_document};

/// Storage backend shared by the tracker and the sync coordinator.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Vec<String>;
    fn clear(&self) -> Result<()>;
}

pub type SharedStore = Arc<dyn KeyValueStore>;

/// Reads and decodes a document. Malformed documents are treated as absent.
pub fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match from_document(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(%key, %err, "ignoring malformed stored document");
            None
        }
    }
}

pub fn load_or_default<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    load(store, key).unwrap_or_default()
}

pub fn save<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    store.set(key, to_document(value)?)
}

/// In-memory store used by tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStore {
        Arc::new(Self::new())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// Store persisted as one JSON file per key under a directory.
///
/// Reads always go to disk and a write replaces only its own key (temporary
/// file, then rename), so several processes can share one directory.
pub struct FileStore {
    dir: PathBuf,
}

const DOCUMENT_EXTENSION: &str = ".json";

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(path = %dir.display(), "opened file store");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}{DOCUMENT_EXTENSION}", encode_key(key)))
    }
}

/// File name for a key: ASCII alphanumerics, `-` and `_` are kept, every other
/// byte becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("%{byte:02X}"));
        }
    }
    encoded
}

fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.document_path(key);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(%key, %err, "failed to read stored document");
                return None;
            }
        };
        match serde_json::from_slice(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%key, %err, "stored document is not valid JSON");
                None
            }
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let path = self.document_path(key);
        let serialized = serde_json::to_vec_pretty(&value)
            .map_err(|err| SlotlineError::SerializationError(err.to_string()))?;
        // dot-prefixed and process-unique, so `keys` never lists it
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", encode_key(key), std::process::id()));
        fs::write(&tmp, serialized)?;
        fs::rename(&tmp, &path)
            .map_err(|err| SlotlineError::StoreError(format!("failed to replace {key}: {err}")))
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.document_path(key)) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn keys(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %self.dir.display(), %err, "failed to list store");
                return Vec::new();
            }
        };
        let mut keys: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                if name.starts_with('.') {
                    return None;
                }
                decode_key(name.strip_suffix(DOCUMENT_EXTENSION)?)
            })
            .collect();
        keys.sort();
        keys
    }

    fn clear(&self) -> Result<()> {
        for key in self.keys() {
            self.remove(&key)?;
        }
        Ok(())
    }
}
