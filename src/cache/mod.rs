//! Bounded cache primitives shared by the sampler.
//!
//! The signature cache memoizes `compute_signature` for raw strings that
//! recur within a short window. It is bounded both by entry count and by an
//! approximate byte budget over the cached keys, so a flood of unique
//! messages cannot grow it without limit.

use crate::core::{CacheConfig, Signature};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Snapshot of cache effectiveness counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that required computing the signature.
    pub misses: u64,
    /// Entries currently resident.
    pub entries: usize,
    /// Approximate bytes held by cached keys and values.
    pub bytes: usize,
}

impl CacheStats {
    /// Hit ratio in [0, 1]; 0 when the cache is untouched.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// Thread-safe LRU cache from raw message to computed signature.
pub struct SignatureCache {
    inner: Mutex<LruCache<String, Signature>>,
    max_bytes: usize,
    bytes: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

// Signatures are fixed-width; only the key length varies per entry.
const SIGNATURE_WIDTH: usize = 32;

impl SignatureCache {
    /// Create a cache bounded by the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries.max(1))
            .unwrap_or(NonZeroUsize::new(1).unwrap());
        SignatureCache {
            inner: Mutex::new(LruCache::new(capacity)),
            max_bytes: config.max_bytes,
            bytes: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a signature, promoting the entry to most recently used.
    pub fn get(&self, message: &str) -> Option<Signature> {
        let mut inner = self.inner.lock();
        match inner.get(message) {
            Some(signature) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(signature.clone())
            },
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            },
        }
    }

    /// Insert a signature, evicting least-recently-used entries until both
    /// the entry bound and the byte bound hold.
    pub fn put(&self, message: String, signature: Signature) {
        let entry_bytes = Self::entry_size(&message);
        // A single oversized key would evict the whole cache for nothing.
        if entry_bytes > self.max_bytes {
            return;
        }

        let mut inner = self.inner.lock();
        // push returns the replaced entry, or the LRU entry once at capacity.
        if let Some((evicted_key, _)) = inner.push(message, signature) {
            self.bytes
                .fetch_sub(Self::entry_size(&evicted_key), Ordering::Relaxed);
        }
        self.bytes.fetch_add(entry_bytes, Ordering::Relaxed);

        while self.bytes.load(Ordering::Relaxed) > self.max_bytes {
            match inner.pop_lru() {
                Some((key, _)) => {
                    self.bytes
                        .fetch_sub(Self::entry_size(&key), Ordering::Relaxed);
                },
                None => break,
            }
        }
    }

    /// Fetch the signature for a message, computing and caching it on miss.
    pub fn get_or_compute<F>(&self, message: &str, compute: F) -> Signature
    where
        F: FnOnce(&str) -> Signature,
    {
        if let Some(signature) = self.get(message) {
            return signature;
        }
        let signature = compute(message);
        self.put(message.to_owned(), signature.clone());
        signature
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.inner.lock().len(),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }

    fn entry_size(key: &str) -> usize {
        key.len() + SIGNATURE_WIDTH
    }
}
