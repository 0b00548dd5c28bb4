//! Storage area — the key → JSON-text map every service persists into.
//!
//! DESIGN
//! ======
//! The storage area plays the role a browser's local storage plays for a
//! single-page app: string keys, string values, whole-value writes. Services
//! always read-modify-write the complete value under a key, so the last write
//! wins. Two backends implement `StorageArea`: `MemoryStorage` (with a byte
//! quota) and `PgStorage` (one row per key).
//!
//! Values written by this service are wrapped in a versioned envelope
//! `{"version": N, "data": ...}`. Bare values without an envelope are read as
//! version 0 so data written before the envelope existed stays readable.
//!
//! ERROR HANDLING
//! ==============
//! A value that fails to parse is reported as `StorageError::Corrupt` and the
//! caller picks the fallback (reseed, empty, or surface). Nothing here
//! silently swallows a parse failure.

pub mod keys;
pub mod memory;
pub mod postgres;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Envelope version written by this service.
pub const SCHEMA_VERSION: u32 = 1;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded writing {key}: {needed} bytes needed, quota is {quota}")]
    QuotaExceeded { key: String, needed: usize, quota: usize },
    #[error("corrupt value under {key}: {source}")]
    Corrupt { key: String, source: serde_json::Error },
    #[error("failed to encode value for {key}: {source}")]
    Encode { key: String, source: serde_json::Error },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::QuotaExceeded { .. } => "E_STORAGE_QUOTA",
            Self::Corrupt { .. } => "E_STORAGE_CORRUPT",
            Self::Encode { .. } => "E_STORAGE_ENCODE",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// A decoded value together with the envelope version it was stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u32,
    pub value: T,
}

/// String key → string value store shared by every view.
#[async_trait::async_trait]
pub trait StorageArea: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Keys starting with `prefix`, sorted.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

// =============================================================================
// ENVELOPE
// =============================================================================

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

/// Encode `value` inside the current envelope.
///
/// # Errors
///
/// Returns `StorageError::Encode` if serialization fails.
pub fn encode<T: Serialize>(key: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(&EnvelopeRef { version: SCHEMA_VERSION, data: value })
        .map_err(|source| StorageError::Encode { key: key.to_owned(), source })
}

/// Decode a stored string, accepting both enveloped and bare legacy values.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` if the text is not JSON or does not match `T`.
pub fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<Versioned<T>, StorageError> {
    let corrupt = |source| StorageError::Corrupt { key: key.to_owned(), source };
    let parsed: serde_json::Value = serde_json::from_str(raw).map_err(corrupt)?;
    let (version, data) = split_envelope(parsed);
    let value = serde_json::from_value(data).map_err(corrupt)?;
    Ok(Versioned { version, value })
}

fn split_envelope(parsed: serde_json::Value) -> (u32, serde_json::Value) {
    let mut map = match parsed {
        serde_json::Value::Object(map) => map,
        other => return (0, other),
    };
    let version = map
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| u32::try_from(v).ok());
    match (version, map.len()) {
        (Some(version), 2) if map.contains_key("data") => {
            let data = map.remove("data").unwrap_or_default();
            (version, data)
        }
        _ => (0, serde_json::Value::Object(map)),
    }
}

// =============================================================================
// TYPED HELPERS
// =============================================================================

/// Read and decode the value under `key`. `Ok(None)` when absent.
///
/// # Errors
///
/// Returns a backend error, or `StorageError::Corrupt` for unparsable data.
pub async fn read_json<T: DeserializeOwned>(storage: &dyn StorageArea, key: &str) -> Result<Option<T>, StorageError> {
    Ok(read_versioned(storage, key).await?.map(|v| v.value))
}

/// Like `read_json`, also returning the envelope version.
///
/// # Errors
///
/// Returns a backend error, or `StorageError::Corrupt` for unparsable data.
pub async fn read_versioned<T: DeserializeOwned>(
    storage: &dyn StorageArea,
    key: &str,
) -> Result<Option<Versioned<T>>, StorageError> {
    let Some(raw) = storage.get(key).await? else {
        return Ok(None);
    };
    decode(key, &raw).map(Some)
}

/// Encode `value` and write it under `key`, replacing whatever was there.
///
/// # Errors
///
/// Returns an encode error or the backend's write error.
pub async fn write_json<T: Serialize + Sync>(storage: &dyn StorageArea, key: &str, value: &T) -> Result<(), StorageError> {
    let encoded = encode(key, value)?;
    storage.set(key, encoded).await
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
