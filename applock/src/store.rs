//! Key-value persistence for the last authentication timestamp

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DbError(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] bincode::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Process-wide preferences holding integer values
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    fn put(&self, key: &str, value: i64) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: i64) -> Result<(), StoreError> {
        (**self).put(key, value)
    }
}

/// In-memory store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(values.get(key).copied())
    }

    fn put(&self, key: &str, value: i64) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::Poisoned)?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// On-disk store backed by sled
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        match self.db.get(key.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &str, value: i64) -> Result<(), StoreError> {
        let encoded = bincode::serialize(&value)?;
        self.db.insert(key.as_bytes(), encoded)?;
        self.db.flush()?;
        Ok(())
    }
}
