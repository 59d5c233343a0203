//! Key-Value Store
//!
//! The arbitrator's only state: a flat string-to-string mapping guarded by
//! a single mutex. Cluster nodes use it as a neutral witness, so the
//! operation set is the classic coordination minimum: unconditional writes,
//! write-once registration (`create`), compare-and-swap (`set_if_prev`),
//! and a liveness beacon (`heartbeat`).
//!
//! Every operation is fully serialized against every other one: the lock
//! covers the whole mapping, not individual keys. Critical sections are one
//! map access (plus a clock read for `heartbeat`), so the coarse lock costs
//! nothing at arbitrator call volumes and keeps `set_if_prev` trivially
//! consistent with concurrent writes and deletes.
//!
//! Absence of a key is never an error: every operation reports it through
//! its return value.

use std::collections::HashMap;

use tokio::sync::Mutex;

/// The arbitrator's shared key-value state.
///
/// Constructed once at startup and shared via `Arc`; tests construct their
/// own independent instances.
#[derive(Debug, Default)]
pub struct KvStore {
    /// All entries, heartbeat timestamps included. A heartbeat value is
    /// just the decimal rendering of the epoch-seconds timestamp; nothing
    /// distinguishes it from a client-supplied value.
    entries: Mutex<HashMap<String, String>>,
}

impl KvStore {
    /// Create a new, empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a liveness beacon for `key`.
    ///
    /// Writes the current wall-clock time (epoch seconds) as the value,
    /// unconditionally overwriting any prior value, and returns the
    /// timestamp written.
    pub async fn heartbeat(&self, key: &str) -> i64 {
        let timestamp = chrono::Utc::now().timestamp();
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), timestamp.to_string());
        timestamp
    }

    /// Unconditionally set `key` to `value`, creating it if absent.
    ///
    /// Always returns `true`; the signature mirrors the conditional writes
    /// so all mutating calls answer with a flag.
    pub async fn set(&self, key: &str, value: &str) -> bool {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value.to_string());
        true
    }

    /// Look up `key`, returning `None` if absent.
    pub async fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries.get(key).cloned()
    }

    /// Write-once registration: set `key` to `value` only if absent.
    ///
    /// Returns `true` if the entry was written, `false` if the key already
    /// existed (the existing value is left untouched). Nodes claim locks or
    /// leadership by `create`-ing a key holding their own identity.
    pub async fn create(&self, key: &str, value: &str) -> bool {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(key) {
            return false;
        }
        entries.insert(key.to_string(), value.to_string());
        true
    }

    /// Compare-and-swap: set `key` to `new` only if it currently holds
    /// exactly `prev`.
    ///
    /// Returns `false` without writing when the key is absent or the value
    /// mismatches. Callers own the retry policy; a `false` here is a normal
    /// outcome of optimistic concurrency, not a failure.
    pub async fn set_if_prev(&self, key: &str, prev: &str, new: &str) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(value) if value == prev => {
                *value = new.to_string();
                true
            }
            _ => false,
        }
    }

    /// Remove `key` if present, returning whether it existed.
    pub async fn delete(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        entries.remove(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_get_on_empty_store() {
        let store = KvStore::new();
        assert_eq!(store.get("nonexistent").await, None);
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = KvStore::new();
        assert!(store.set("k", "v1").await);
        assert!(store.set("k", "v2").await);
        assert_eq!(store.get("k").await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_create_is_write_once() {
        let store = KvStore::new();
        assert!(store.create("k", "first").await);
        assert_eq!(store.get("k").await.as_deref(), Some("first"));

        // Second create refuses and leaves the value unchanged
        assert!(!store.create("k", "second").await);
        assert_eq!(store.get("k").await.as_deref(), Some("first"));

        // After delete the key can be created again
        assert!(store.delete("k").await);
        assert!(store.create("k", "second").await);
        assert_eq!(store.get("k").await.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_compare_and_swap() {
        let store = KvStore::new();

        // CAS on an absent key never writes
        assert!(!store.set_if_prev("k", "v", "v2").await);
        assert_eq!(store.get("k").await, None);

        store.set("k", "v").await;
        assert!(store.set_if_prev("k", "v", "v2").await);
        assert_eq!(store.get("k").await.as_deref(), Some("v2"));

        // Stale expectation leaves the value untouched
        assert!(!store.set_if_prev("k", "v", "v3").await);
        assert_eq!(store.get("k").await.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_delete_idempotent_on_absence() {
        let store = KvStore::new();
        assert!(!store.delete("k").await);

        store.create("k", "v").await;
        assert!(store.delete("k").await);
        assert!(!store.delete("k").await);
    }

    #[tokio::test]
    async fn test_heartbeat_monotonic() {
        let store = KvStore::new();
        let t1 = store.heartbeat("node-1").await;
        assert_eq!(store.get("node-1").await.as_deref(), Some(t1.to_string().as_str()));

        let t2 = store.heartbeat("node-1").await;
        assert!(t2 >= t1);
        assert_eq!(store.get("node-1").await.as_deref(), Some(t2.to_string().as_str()));
    }

    #[tokio::test]
    async fn test_heartbeat_overwrites_plain_value() {
        let store = KvStore::new();
        store.set("node-1", "anything").await;
        let ts = store.heartbeat("node-1").await;
        assert_eq!(store.get("node-1").await.as_deref(), Some(ts.to_string().as_str()));
    }

    #[tokio::test]
    async fn test_concurrent_cas_increments_serialize() {
        // N tasks each perform M CAS-retry increments on one key. With the
        // whole-map lock serializing every read-modify-write, no update can
        // be lost: the final value must be exactly N * M.
        const TASKS: u64 = 8;
        const INCREMENTS: u64 = 25;

        let store = Arc::new(KvStore::new());
        assert!(store.create("counter", "0").await);

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for _ in 0..INCREMENTS {
                    loop {
                        let current = store.get("counter").await.unwrap();
                        let next = (current.parse::<u64>().unwrap() + 1).to_string();
                        if store.set_if_prev("counter", &current, &next).await {
                            break;
                        }
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let final_value = store.get("counter").await.unwrap();
        assert_eq!(final_value.parse::<u64>().unwrap(), TASKS * INCREMENTS);
    }

    #[tokio::test]
    async fn test_lock_handoff_scenario() {
        // A node claims a lock, a rival fails to claim it, the holder hands
        // it off via CAS, and the new holder releases it.
        let store = KvStore::new();

        assert!(store.create("lock", "nodeA").await);
        assert_eq!(store.get("lock").await.as_deref(), Some("nodeA"));

        assert!(!store.create("lock", "nodeB").await);

        assert!(store.set_if_prev("lock", "nodeA", "nodeB").await);
        assert_eq!(store.get("lock").await.as_deref(), Some("nodeB"));

        assert!(store.delete("lock").await);
        assert_eq!(store.get("lock").await, None);
        assert!(!store.delete("lock").await);
    }
}
