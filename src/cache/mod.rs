//! Ephemeral TTL key-value cache.
//!
//! Backs the two-phase signup flow: one-time codes and pending signup
//! payloads are staged here with a fixed time-to-live and read back during
//! verification. Expired entries are treated as absent on read and reaped
//! by a periodic sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::Value;
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: SystemTime,
}

impl Entry {
    fn is_expired(&self) -> bool {
        SystemTime::now() >= self.expires_at
    }
}

/// In-process keyed store with per-entry expiry.
#[derive(Debug, Clone, Default)]
pub struct TtlCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Stores a value under `key` for `ttl`. An existing entry is replaced
    /// and its clock restarts.
    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: SystemTime::now() + ttl,
        };
        self.entries.lock().await.insert(key.to_string(), entry);
    }

    /// Returns the value under `key`, or `None` if it was never set or its
    /// TTL has elapsed. Expired entries are removed on the way out.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Removes the entry under `key`, if any.
    pub async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    /// Drops every expired entry. Intended to run on a timer so abandoned
    /// signups do not accumulate.
    pub async fn sweep_expired(&self) {
        self.entries
            .lock()
            .await
            .retain(|_, entry| !entry.is_expired());
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
