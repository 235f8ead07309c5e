//! TTL result cache in front of a capability.
//!
//! Keys are the SHA-256 of the capability id and its canonical argument
//! JSON. Only successful payloads are stored, so a transient upstream
//! failure is never replayed. The cache knows nothing about agent loops.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use wayfarer_core::capability::{Arguments, Capability, CapabilityId};
use wayfarer_core::error::CapabilityError;

/// Wraps a capability and memoizes successful calls for `ttl`.
///
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
pub struct CachedCapability {
    inner: Box<dyn Capability>,
    ttl: Duration,
    entries: std::sync::Mutex<HashMap<String, (Instant, serde_json::Value)>>,
}

impl CachedCapability {
    pub fn new(inner: Box<dyn Capability>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, payload)| payload.clone())
    }

    fn store(&self, key: String, payload: serde_json::Value) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let ttl = self.ttl;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        entries.insert(key, (Instant::now(), payload));
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .values()
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stable cache key for a capability call.
pub fn cache_key(id: CapabilityId, arguments: &Arguments) -> String {
    let canonical = serde_json::to_string(arguments).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(id.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl Capability for CachedCapability {
    fn id(&self) -> CapabilityId {
        self.inner.id()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.inner.parameters_schema()
    }

    fn validate(&self, arguments: &Arguments) -> Result<(), CapabilityError> {
        self.inner.validate(arguments)
    }

    async fn call(&self, arguments: &Arguments) -> Result<serde_json::Value, CapabilityError> {
        let key = cache_key(self.id(), arguments);

        if let Some(payload) = self.lookup(&key) {
            debug!(capability = %self.id(), "Capability cache hit");
            return Ok(payload);
        }

        let payload = self.inner.call(arguments).await?;
        self.store(key, payload.clone());
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Capability for Counting {
        fn id(&self) -> CapabilityId {
            CapabilityId::Weather
        }
        fn description(&self) -> &str {
            "counts"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        fn validate(&self, _arguments: &Arguments) -> Result<(), CapabilityError> {
            Ok(())
        }
        async fn call(&self, arguments: &Arguments) -> Result<serde_json::Value, CapabilityError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if arguments.get("city").and_then(|c| c.as_str()) == Some("Nowhere") {
                return Err(CapabilityError::Upstream("no location found".into()));
            }
            Ok(serde_json::json!({ "call": n }))
        }
    }

    fn cached(ttl: Duration) -> (CachedCapability, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cap = CachedCapability::new(
            Box::new(Counting {
                calls: calls.clone(),
            }),
            ttl,
        );
        (cap, calls)
    }

    fn args(value: serde_json::Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn key_is_stable_and_order_independent() {
        let a: Arguments = serde_json::from_str(r#"{"amount":1,"from":"EUR","to":"USD"}"#).unwrap();
        let b: Arguments = serde_json::from_str(r#"{"to":"USD","amount":1,"from":"EUR"}"#).unwrap();
        assert_eq!(
            cache_key(CapabilityId::CurrencyConvert, &a),
            cache_key(CapabilityId::CurrencyConvert, &b)
        );
        assert_ne!(
            cache_key(CapabilityId::CurrencyConvert, &a),
            cache_key(CapabilityId::Weather, &a)
        );
        assert_eq!(cache_key(CapabilityId::Weather, &a).len(), 64);
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let (cap, calls) = cached(Duration::from_secs(300));
        let first = cap.call(&args(serde_json::json!({"city": "Paris"}))).await.unwrap();
        let second = cap.call(&args(serde_json::json!({"city": "Paris"}))).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cap.len(), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let (cap, calls) = cached(Duration::from_secs(300));
        let nowhere = args(serde_json::json!({"city": "Nowhere"}));
        assert!(cap.call(&nowhere).await.is_err());
        assert!(cap.call(&nowhere).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cap.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire() {
        let (cap, calls) = cached(Duration::from_secs(60));
        let paris = args(serde_json::json!({"city": "Paris"}));
        cap.call(&paris).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;

        let payload = cap.call(&paris).await.unwrap();
        assert_eq!(payload["call"], 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
