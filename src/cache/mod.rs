//! In-process TTL cache (spec §4.4).
//!
//! Deliberately not built on `moka` even though the teacher reaches for it in
//! `server/yjs.rs` (`moka::sync::Cache`): moka's eviction is driven by an
//! internal maintenance pass, not guaranteed to run synchronously on `get`,
//! and spec §4.4/§8 invariant 4 require `get` on an expired entry to remove
//! it and report a miss within the same call. A hand-rolled mutex-guarded map
//! gives that guarantee directly.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::Result;

#[derive(Clone)]
struct CacheEntry {
    value: Value,
    expires_at: DateTime<Utc>,
}

/// Mutex-guarded fingerprint → value map with lazy-on-read expiry.
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl TtlCache {
    pub fn new(default_ttl_seconds: i64) -> Self {
        TtlCache {
            entries: Mutex::new(HashMap::new()),
            default_ttl: Duration::from_secs(default_ttl_seconds.max(0) as u64),
        }
    }

    /// Returns `None` on miss or on an expired hit; an expired hit is removed
    /// before returning (spec §8 invariant 4).
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        self.entries
            .lock()
            .await
            .insert(key.to_string(), CacheEntry { value, expires_at });
    }

    pub async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn clear_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, v| v.expires_at > now);
        before - entries.len()
    }

    /// Returns the cached value if present and live; otherwise calls `factory`,
    /// stores its result, and returns that.
    pub async fn get_or_set<F, Fut>(&self, key: &str, ttl: Option<Duration>, factory: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }
        let value = factory().await?;
        self.set(key, value.clone(), ttl).await;
        Ok(value)
    }
}

/// Canonical-JSON-encodes `params` with sorted keys and hashes with a 96-bit
/// MD5 prefix (spec §4.4). Bit-exact only within one process's lifetime.
fn fingerprint<T: Serialize>(params: &T) -> String {
    let value = serde_json::to_value(params).unwrap_or(Value::Null);
    let canonical = canonicalize(&value);
    let mut hasher = Md5::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    digest[..12].iter().map(|b| format!("{b:02x}")).collect()
}

/// Recursively sorts object keys before compact-encoding, so semantically
/// identical parameter maps always hash the same regardless of insertion order.
fn canonicalize(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{:?}:{}", k, canonicalize(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonicalize).collect();
            format!("[{}]", parts.join(","))
        }
        other => other.to_string(),
    }
}

/// `search:<hex12>` fingerprint for catalog queries.
pub fn make_search_key<T: Serialize>(params: &T) -> String {
    format!("search:{}", fingerprint(params))
}

/// `rec:{intent}:{session}:` fingerprint for orchestrator/agent outputs.
pub fn make_recommendation_key<T: Serialize>(intent: &str, session_id: &str, params: &T) -> String {
    format!("rec:{intent}:{session_id}:{}", fingerprint(params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn expired_entry_is_evicted_on_read() {
        let cache = TtlCache::new(3600);
        cache
            .set("k", json!("v"), Some(Duration::from_millis(1)))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.entries.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn get_or_set_only_calls_factory_on_miss() {
        let cache = TtlCache::new(3600);
        let mut calls = 0;
        let _ = cache
            .get_or_set("k", None, || async { Ok(json!(1)) })
            .await
            .unwrap();
        calls += 1;
        let v = cache
            .get_or_set("k", None, || async { panic!("should not run") })
            .await
            .unwrap();
        assert_eq!(v, json!(1));
        assert_eq!(calls, 1);
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn search_key_has_stable_prefix() {
        let key = make_search_key(&json!({"query": "노트북"}));
        assert!(key.starts_with("search:"));
        assert_eq!(key.len(), "search:".len() + 24);
    }
}
