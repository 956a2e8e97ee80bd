//! Extension trait for [`Cache`] with typed convenience methods.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Cache;

/// Typed convenience methods for [`Cache`].
///
/// Provides `get_json`/`set_json` for serde-serializable types and
/// `get_string`/`set_string` for UTF-8 strings, so [`Cache`] itself stays
/// object-safe and byte oriented.
pub trait CacheExt: Cache {
    /// Retrieve a JSON-deserialized value.
    ///
    /// Returns `None` on cache miss or deserialization failure.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Dropping undecodable cache entry");
                self.delete(key);
                None
            }
        }
    }

    /// Store a value as JSON.
    ///
    /// Silently does nothing if serialization fails.
    fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            self.set(key, &bytes, ttl);
        }
    }

    /// Retrieve a cached UTF-8 string.
    fn get_string(&self, key: &str) -> Option<String> {
        let bytes = self.get(key)?;
        String::from_utf8(bytes).ok()
    }

    fn set_string(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.set(key, value.as_bytes(), ttl);
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryCache;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_round_trip_through_trait_object() {
        let cache: Box<dyn Cache> = Box::new(MemoryCache::new());
        cache.set_json("numbers", &vec![1, 2, 3], None);
        assert_eq!(cache.get_json::<Vec<i32>>("numbers"), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_undecodable_entry_is_dropped() {
        let cache = MemoryCache::new();
        cache.set("broken", b"{not json", None);
        assert_eq!(cache.get_json::<Vec<i32>>("broken"), None);
        assert_eq!(cache.get("broken"), None);
    }
}
