//! In-memory backend implementation
//!
//! This module provides an in-memory implementation of the [`Backend`] trait,
//! suitable for testing, development, or single-process nodes that persist
//! their whole state to a JSON file on shutdown.

use std::any::Any;
use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;

use super::{Backend, BackendError};
use crate::{Error, Result};

/// The current persistence file format version.
/// v0 indicates this is an unstable format subject to breaking changes.
const PERSISTENCE_VERSION: u8 = 0;

/// Helper to check if version is default (0) for serde skip_serializing_if
fn is_v0(v: &u8) -> bool {
    *v == 0
}

/// Validates the persistence version during deserialization.
fn validate_persistence_version<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let version = u8::deserialize(deserializer)?;
    if version != PERSISTENCE_VERSION {
        return Err(serde::de::Error::custom(format!(
            "unsupported persistence version {version}; only version {PERSISTENCE_VERSION} is supported"
        )));
    }
    Ok(version)
}

/// On-disk shape of an [`InMemory`] backend; records are base64 encoded.
#[derive(Serialize, Deserialize)]
struct SerializableRecords {
    #[serde(
        rename = "_v",
        default,
        skip_serializing_if = "is_v0",
        deserialize_with = "validate_persistence_version"
    )]
    version: u8,
    records: HashMap<String, String>,
}

/// A simple in-memory backend using a `HashMap` for storage.
///
/// It provides basic persistence via `save_to_file` and `load_from_file`,
/// serializing every record to a single JSON document.
#[derive(Debug, Default)]
pub struct InMemory {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemory {
    /// Creates a new, empty `InMemory` backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tags of all stored records.
    pub async fn all_tags(&self) -> Vec<String> {
        self.records.read().await.keys().cloned().collect()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns true if no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Saves every record to `path` as JSON.
    ///
    /// # Returns
    /// A `Result` indicating success or an I/O or serialization error.
    pub async fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let records = self
            .records
            .read()
            .await
            .iter()
            .map(|(tag, bytes)| (tag.clone(), Base64::encode_string(bytes)))
            .collect();

        let serializable = SerializableRecords {
            version: PERSISTENCE_VERSION,
            records,
        };

        let json = serde_json::to_string_pretty(&serializable)
            .map_err(|e| -> Error { BackendError::SerializationFailed { source: e }.into() })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| -> Error { BackendError::FileIo { source: e }.into() })
    }

    /// Loads a backend previously written by [`InMemory::save_to_file`].
    ///
    /// If the file does not exist, a new, empty backend is returned.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(BackendError::FileIo { source: e }.into()),
        };

        let serializable: SerializableRecords = serde_json::from_str(&json)
            .map_err(|e| -> Error { BackendError::DeserializationFailed { source: e }.into() })?;

        let mut records = HashMap::with_capacity(serializable.records.len());
        for (tag, encoded) in serializable.records {
            let bytes = Base64::decode_vec(&encoded).map_err(|e| BackendError::CorruptRecord {
                tag: tag.clone(),
                reason: e.to_string(),
            })?;
            records.insert(tag, bytes);
        }

        Ok(Self {
            records: RwLock::new(records),
        })
    }
}

#[async_trait]
impl Backend for InMemory {
    async fn get(&self, tag: &str) -> Result<Vec<u8>> {
        self.records
            .read()
            .await
            .get(tag)
            .cloned()
            .ok_or_else(|| BackendError::NotFound { tag: tag.to_string() }.into())
    }

    async fn set(&self, tag: &str, bytes: Vec<u8>) -> Result<()> {
        self.records.write().await.insert(tag.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, tag: &str) -> Result<()> {
        match self.records.write().await.remove(tag) {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound { tag: tag.to_string() }.into()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
