//! Per-unit outcome cache.
//!
//! Identical turns evaluated twice cost tokens twice; the cache keeps
//! successful unit payloads keyed by conversation, model, and unit.
//! Degraded and failed outcomes are never cached, so a transient outage
//! does not pin bad results.

use moka::future::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use verdict_core::{EvaluationRequest, UnitName};

/// Cache key: hashed transcript + hashed model + unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    transcript_hash: u64,
    model_hash: u64,
    unit: UnitName,
}

impl CacheKey {
    pub fn new(request: &EvaluationRequest, unit: UnitName) -> Self {
        Self {
            transcript_hash: hash_str(&request.transcript()),
            model_hash: hash_str(&request.model),
            unit,
        }
    }
}

fn hash_str(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Moka-backed cache of successful unit payloads. Payloads are stored as
/// JSON values so one cache serves every unit's payload type.
pub struct OutcomeCache {
    cache: Cache<CacheKey, serde_json::Value>,
}

impl OutcomeCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Fetch a cached payload, deserialized into the unit's payload type.
    pub async fn get<P: DeserializeOwned>(&self, key: &CacheKey) -> Option<P> {
        let value = self.cache.get(key).await?;
        match serde_json::from_value(value) {
            Ok(payload) => Some(payload),
            Err(e) => {
                // Stale shape after an upgrade; treat as a miss.
                tracing::debug!(unit = %key.unit, error = %e, "cached payload unreadable");
                self.cache.invalidate(key).await;
                None
            }
        }
    }

    /// Store a successful payload.
    pub async fn insert<P: Serialize>(&self, key: CacheKey, payload: &P) {
        match serde_json::to_value(payload) {
            Ok(value) => self.cache.insert(key, value).await,
            Err(e) => tracing::debug!(unit = %key.unit, error = %e, "payload not cacheable"),
        }
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for OutcomeCache {
    fn default() -> Self {
        Self::new(10_000, Duration::from_secs(3600))
    }
}
