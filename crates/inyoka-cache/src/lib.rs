//! Cache abstraction for compiled wiki output.
//!
//! The engine stores compiled instruction streams and other derived data
//! through the [`Cache`] trait, keyed by strings such as
//! `wiki/text/{hash}/{format}`.
//!
//! # Implementations
//!
//! - [`NullCache`]: No-op implementation (always misses)
//! - [`MemoryCache`]: In-process map with per-entry time to live
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use inyoka_cache::{Cache, CacheExt, MemoryCache};
//!
//! let cache = MemoryCache::new();
//! cache.set_string("wiki/text/abc/html", "<p>hi</p>", Some(Duration::from_secs(60)));
//! assert_eq!(cache.get_string("wiki/text/abc/html").as_deref(), Some("<p>hi</p>"));
//! cache.delete("wiki/text/abc/html");
//! assert_eq!(cache.get("wiki/text/abc/html"), None);
//! ```

mod ext;
mod memory;

use std::time::Duration;

pub use ext::CacheExt;
pub use memory::MemoryCache;

/// Key-value store with optional expiry.
pub trait Cache: Send + Sync {
    /// Retrieve a cached value, `None` on miss or after expiry.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a value, replacing any previous entry. Without a `ttl` the
    /// entry does not expire.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>);

    /// Remove an entry. Missing keys are ignored.
    fn delete(&self, key: &str);

    /// Remove several entries.
    fn delete_many(&self, keys: &[String]) {
        for key in keys {
            self.delete(key);
        }
    }
}

/// No-op [`Cache`] that never stores or retrieves data.
///
/// Use when caching is disabled.
pub struct NullCache;

impl Cache for NullCache {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) {}

    fn delete(&self, _key: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_cache_always_misses() {
        let cache = NullCache;
        assert_eq!(cache.get("key"), None);

        cache.set("key", b"hello", None);
        assert_eq!(cache.get("key"), None);
        cache.delete_many(&["key".to_owned()]);
    }
}
