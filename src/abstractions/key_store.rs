//! Key-value store abstraction
//!
//! Bots keep auxiliary per-game state in a Redis hash scoped by
//! `{botId}-{replayId}`. The recorder snapshots that hash after each turn and
//! the replay engine writes the snapshots back.

use crate::error::{Error, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Trait for key snapshot operations
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Read every field stored under `scope` as a JSON object
    async fn list_keys(&self, scope: &str) -> Result<Value>;

    /// Write every field of a JSON object under `scope`
    async fn set_keys(&self, scope: &str, keys: &Value) -> Result<()>;
}

/// Redis hash implementation of [`KeyStore`]
pub struct RedisKeyStore {
    connection: ConnectionManager,
}

impl RedisKeyStore {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }
}

/// Flatten a snapshot object into hash field/value pairs
fn hash_fields(keys: &Value) -> Result<Vec<(String, String)>> {
    match keys {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(field, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (field.clone(), value)
            })
            .collect()),
        other => Err(Error::key_write(format!(
            "expected an object snapshot, found {other}"
        ))),
    }
}

#[async_trait]
impl KeyStore for RedisKeyStore {
    async fn list_keys(&self, scope: &str) -> Result<Value> {
        let mut conn = self.connection.clone();
        let fields: HashMap<String, String> =
            conn.hgetall(scope).await.map_err(Error::key_lookup)?;

        let map: Map<String, Value> = fields
            .into_iter()
            .map(|(field, value)| (field, Value::String(value)))
            .collect();
        Ok(Value::Object(map))
    }

    async fn set_keys(&self, scope: &str, keys: &Value) -> Result<()> {
        let items = hash_fields(keys)?;
        if items.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        let _: () = conn
            .hset_multiple(scope, &items)
            .await
            .map_err(Error::key_write)?;
        Ok(())
    }
}

/// Mock implementation of [`KeyStore`] for testing
#[derive(Default)]
pub struct MockKeyStore {
    /// Current hash contents per scope
    pub hashes: Arc<Mutex<HashMap<String, Map<String, Value>>>>,
    /// Every `set_keys` call, in order
    pub writes: Arc<Mutex<Vec<(String, Value)>>>,
    /// Number of `list_keys` calls
    pub lookups: Arc<Mutex<usize>>,
    fail_lookups: Arc<Mutex<bool>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MockKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field returned by later lookups
    pub async fn insert(&self, scope: &str, field: &str, value: &str) {
        self.hashes
            .lock()
            .await
            .entry(scope.to_string())
            .or_default()
            .insert(field.to_string(), Value::String(value.to_string()));
    }

    pub async fn set_fail_lookups(&self, fail: bool) {
        *self.fail_lookups.lock().await = fail;
    }

    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().await = fail;
    }

    pub async fn get_writes(&self) -> Vec<(String, Value)> {
        self.writes.lock().await.clone()
    }

    pub async fn lookup_count(&self) -> usize {
        *self.lookups.lock().await
    }
}

#[async_trait]
impl KeyStore for MockKeyStore {
    async fn list_keys(&self, scope: &str) -> Result<Value> {
        *self.lookups.lock().await += 1;
        if *self.fail_lookups.lock().await {
            return Err(Error::key_lookup(format!("lookup of {scope} refused")));
        }
        let map = self
            .hashes
            .lock()
            .await
            .get(scope)
            .cloned()
            .unwrap_or_default();
        Ok(Value::Object(map))
    }

    async fn set_keys(&self, scope: &str, keys: &Value) -> Result<()> {
        if *self.fail_writes.lock().await {
            return Err(Error::key_write(format!("write of {scope} refused")));
        }
        let items = hash_fields(keys)?;
        {
            let mut hashes = self.hashes.lock().await;
            let hash = hashes.entry(scope.to_string()).or_default();
            for (field, value) in items {
                hash.insert(field, Value::String(value));
            }
        }
        self.writes
            .lock()
            .await
            .push((scope.to_string(), keys.clone()));
        Ok(())
    }
}
