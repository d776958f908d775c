//! Quote verification.
//!
//! Exact byte equality is too strict for whitespace and case noise, so
//! quotes are compared by the hash of their normalized form. The diff is
//! only computed on mismatch.
//!
//! ```text
//! normalize(t) = trim(collapse_whitespace(lowercase(t)))
//! hash(t)      = SHA256(normalize(t))
//! ```
//!
//! ## Cached Verification
//!
//! [`CachedVerifier`] memoises results in an LRU keyed by an xxh64 digest of
//! both raw inputs, for services that check the same quotes repeatedly.

use lru::LruCache;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::Arc;
use xxhash_rust::xxh64::Xxh64;

use crate::canonical::sha256_hex;
use crate::types::Atom;

/// Default LRU capacity.
const DEFAULT_CACHE_ENTRIES: usize = 10_000;

/// Lowercase, collapse every whitespace run to one space, trim.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `SHA256(normalize(text))` as lowercase hex.
pub fn hash(text: &str) -> String {
    sha256_hex(normalize(text).as_bytes())
}

/// Outcome of comparing a quotation with its claimed original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteVerificationResult {
    /// Normalized hashes are equal.
    #[serde(rename = "match")]
    pub matched: bool,
    /// Diff markup from original to quote; present only on mismatch.
    pub diff: Option<String>,
}

/// Compare `quote` against `original`.
///
/// # Example
///
/// ```rust
/// use thread_forensics::verification::verify_quote;
///
/// let result = verify_quote("The deadline is Friday.", "the   deadline is friday.");
/// assert!(result.matched);
/// assert!(result.diff.is_none());
/// ```
pub fn verify_quote(quote: &str, original: &str) -> QuoteVerificationResult {
    if hash(quote) == hash(original) {
        return QuoteVerificationResult {
            matched: true,
            diff: None,
        };
    }

    QuoteVerificationResult {
        matched: false,
        diff: Some(crate::diff::diff(original, quote)),
    }
}

/// Semantic diff markup from `a` to `b`.
pub fn diff(a: &str, b: &str) -> String {
    crate::diff::diff(a, b)
}

/// Atoms whose normalized content matches `quote`, in sequence order.
pub fn locate_quote<'a>(quote: &str, atoms: &'a [Atom]) -> Vec<&'a Atom> {
    let target = hash(quote);
    atoms
        .iter()
        .filter(|atom| hash(atom.content()) == target)
        .collect()
}

/// Configuration for the verification cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_ENTRIES,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VerificationCacheKey(u64);

impl VerificationCacheKey {
    fn compute(quote: &str, original: &str) -> Self {
        let mut hasher = Xxh64::new(0);
        hasher.write(&(quote.len() as u64).to_le_bytes());
        hasher.write(quote.as_bytes());
        hasher.write(original.as_bytes());
        Self(hasher.finish())
    }
}

/// Result of a cached verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedVerification {
    /// Verification outcome.
    #[serde(flatten)]
    pub result: QuoteVerificationResult,
    /// Whether this result came from cache.
    pub cache_hit: bool,
}

/// Quote verifier with optional LRU caching.
///
/// Thread-safe and suitable for use in async services.
#[derive(Clone)]
pub struct CachedVerifier {
    cache: Option<Arc<RwLock<LruCache<VerificationCacheKey, QuoteVerificationResult>>>>,
}

impl Default for CachedVerifier {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CachedVerifier {
    /// Create a verifier.
    pub fn new(config: CacheConfig) -> Self {
        let cache = if config.enabled {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
            Some(Arc::new(RwLock::new(LruCache::new(size))))
        } else {
            None
        };
        Self { cache }
    }

    /// Verify, consulting the cache first.
    pub fn verify(&self, quote: &str, original: &str) -> CachedVerification {
        let key = VerificationCacheKey::compute(quote, original);

        if let Some(cache) = &self.cache {
            if let Some(result) = cache.read().peek(&key) {
                return CachedVerification {
                    result: result.clone(),
                    cache_hit: true,
                };
            }
        }

        let result = verify_quote(quote, original);

        if let Some(cache) = &self.cache {
            cache.write().put(key, result.clone());
        }

        CachedVerification {
            result,
            cache_hit: false,
        }
    }

    /// Cache statistics, `None` if caching is disabled.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| {
            let cache = cache.read();
            CacheStats {
                len: cache.len(),
                cap: cache.cap().get(),
            }
        })
    }

    /// Clear the cache.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
}
