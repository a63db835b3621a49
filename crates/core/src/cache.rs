//! Content-addressed memoization for expensive fetch/parse calls.
//!
//! Keys are SHA-256 digests of a function name plus its serialized
//! arguments. Entries are written at most once per key and never evicted;
//! failed calls are not stored. Two callers racing on the same missing key
//! both compute the value and the second write wins with an identical value.

use crate::error::Result;
use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Digest identifying one (function, arguments) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Key for a call whose arguments serialize with serde.
    pub fn for_args<A: Serialize + ?Sized>(function: &str, args: &A) -> Result<Self> {
        let encoded = serde_json::to_vec(args)?;
        Ok(Self::digest(function, &encoded))
    }

    /// Key for a call over raw bytes.
    pub fn for_bytes(function: &str, bytes: &[u8]) -> Self {
        Self::digest(function, bytes)
    }

    fn digest(function: &str, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(function.as_bytes());
        hasher.update([0u8]);
        hasher.update(payload);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        CacheKey(out)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Process-lifetime memoization cache.
pub struct MemoCache<V> {
    entries: RwLock<HashMap<CacheKey, V>>,
}

impl<V: Clone> MemoCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, value: V) {
        self.entries.write().insert(key, value);
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// success. The lock is not held while `compute` runs.
    pub fn get_or_try_insert_with<F>(&self, key: CacheKey, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(hit) = self.get(&key) {
            debug!(key = %key, "memo cache hit");
            return Ok(hit);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl<V: Clone> Default for MemoCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::Cell;

    #[test]
    fn test_key_depends_on_function_and_args() {
        let a = CacheKey::for_args("fetch", &("AAPL", 1)).unwrap();
        let b = CacheKey::for_args("fetch", &("AAPL", 1)).unwrap();
        let c = CacheKey::for_args("fetch", &("MSFT", 1)).unwrap();
        let d = CacheKey::for_args("parse", &("AAPL", 1)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(CacheKey::for_bytes("x", b"abc"), CacheKey::for_bytes("x", b"abd"));
    }

    #[test]
    fn test_second_call_is_served_from_cache() {
        let cache: MemoCache<u32> = MemoCache::new();
        let calls = Cell::new(0);
        let key = CacheKey::for_bytes("count", b"input");

        for _ in 0..3 {
            let v = cache
                .get_or_try_insert_with(key, || {
                    calls.set(calls.get() + 1);
                    Ok(42)
                })
                .unwrap();
            assert_eq!(v, 42);
        }
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache: MemoCache<u32> = MemoCache::new();
        let key = CacheKey::for_bytes("flaky", b"input");

        let first = cache.get_or_try_insert_with(key, || Err(Error::ingest("down")));
        assert!(first.is_err());
        assert!(cache.is_empty());

        let second = cache.get_or_try_insert_with(key, || Ok(7)).unwrap();
        assert_eq!(second, 7);
        assert_eq!(cache.get(&key), Some(7));
    }
}
