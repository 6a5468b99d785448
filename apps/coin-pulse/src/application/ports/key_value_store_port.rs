//! Key-Value Store Port (Driven Port)
//!
//! Durable string-keyed storage for the icon cache and bookmarks. Values are
//! JSON documents. A missing or corrupt value always reads as empty.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Storage failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded.
    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key contains characters the backend cannot store.
    #[error("Invalid store key: {key}")]
    InvalidKey {
        /// The key.
        key: String,
    },
}

/// Port for durable string-keyed storage.
pub trait KeyValueStore: Send + Sync {
    /// Raw value for `key`, `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Decode the JSON value under `key`, or `T::default()` when it is absent,
/// unreadable or corrupt.
pub fn load_json_or_default<T>(store: &dyn KeyValueStore, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(e) => {
            tracing::warn!(key, error = %e, "Store read failed, treating as empty");
            return T::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(key, error = %e, "Corrupt stored value, treating as empty");
        T::default()
    })
}

/// Encode `value` as JSON under `key`.
///
/// # Errors
///
/// Returns `StoreError` when encoding or writing fails.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}
