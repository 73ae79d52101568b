//! Durable key/value storage.
//!
//! State is stored as JSON documents under a fixed set of keys, one document
//! per concern (see [`keys`]). [`Database`] is the SQLite-backed store used by
//! the CLI and the native-messaging host; [`MemoryStore`] backs tests.

mod config;
pub mod database;
pub mod memory;
mod settings;

pub use config::{default_sites, GovernorConfig};
pub use database::Database;
pub use memory::MemoryStore;
pub use settings::RuntimeSettings;

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// Keys of the persisted state layout.
pub mod keys {
    pub const CONFIG: &str = "config";
    pub const PASSES: &str = "passes";
    pub const RATION_USAGE: &str = "rationUsage";
    pub const RATION_OVERTIME: &str = "rationOvertime";
    pub const FEELINGS_LOG: &str = "feelingsLog";
    pub const ANALYTICS_HISTORY: &str = "analyticsHistory";
}

/// Raw string key/value storage.
pub trait StateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON document. Missing keys yield `Ok(None)`.
pub fn load_json<T, S>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    T: DeserializeOwned,
    S: StateStore + ?Sized,
{
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Encode and write a JSON document.
pub fn save_json<T, S>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
    S: StateStore + ?Sized,
{
    let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}

/// Returns `~/.config/lockd[-dev]/`.
///
/// `LOCKD_DATA_DIR` overrides the location entirely; otherwise
/// `LOCKD_ENV=dev` selects the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("LOCKD_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("LOCKD_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("lockd-dev")
            } else {
                base_dir.join("lockd")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
