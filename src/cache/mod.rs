pub mod keys;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;

use crate::assessment::config::CacheConfig;

struct Entry<V> {
    value: V,
    expires_at: Instant,
    last_access: u64,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    tick: u64,
}

/// Bounded in-process cache with per-entry TTL and least-recently-used
/// eviction. Constructed by the owner and passed in; never global.
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    ttl: Duration,
    jitter_ratio: f64,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize, ttl: Duration, jitter_ratio: f64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                tick: 0,
            }),
            capacity,
            ttl,
            jitter_ratio: jitter_ratio.clamp(0.0, 0.5),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.capacity, config.ttl(), config.jitter_ratio)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        inner.tick += 1;
        let tick = inner.tick;

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                entry.last_access = tick;
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_if(key, value, |_| true);
    }

    /// Stores `value` unless a live entry exists and `replace` rejects it.
    /// The check runs under the cache lock, so a slower writer cannot
    /// clobber a newer value written in between. Returns whether it stored.
    pub fn set_if(
        &self,
        key: impl Into<String>,
        value: V,
        replace: impl FnOnce(&V) -> bool,
    ) -> bool {
        if self.capacity == 0 || self.ttl.is_zero() {
            return false;
        }
        let key = key.into();
        let now = Instant::now();
        let expires_at = now + apply_ttl_jitter(self.ttl, self.jitter_ratio);

        let mut inner = self.inner.lock();
        if let Some(existing) = inner.entries.get(&key) {
            if existing.expires_at > now && !replace(&existing.value) {
                return false;
            }
        }
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            inner.entries.retain(|_, e| e.expires_at > now);
            if inner.entries.len() >= self.capacity {
                let victim = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_access)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    inner.entries.remove(&victim);
                }
            }
        }

        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at,
                last_access: tick,
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn apply_ttl_jitter(ttl: Duration, ratio: f64) -> Duration {
    if ratio <= 0.0 {
        return ttl;
    }
    let base_ms = ttl.as_millis() as f64;
    let mut rng = rand::rng();
    let factor = rng.random_range(1.0 - ratio..=1.0 + ratio);
    let jittered_ms = (base_ms * factor).round().max(1.0);
    Duration::from_millis(jittered_ms as u64)
}
