use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

/// Read cache with tag-based invalidation: every entry is filed under a tag,
/// and a successful mutation of the tagged entity drops all of its entries.
pub struct TaggedCache {
    ttl: Duration,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    tag_index: HashMap<String, Vec<String>>,
}

struct CacheEntry {
    tag: String,
    stored_at: Instant,
    value: Value,
}

impl TaggedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.lock().unwrap();

        let expired = match inner.entries.get(key) {
            Some(entry) => entry.stored_at.elapsed() > self.ttl,
            None => return None,
        };

        if expired {
            if let Some(entry) = inner.entries.remove(key) {
                if let Some(keys) = inner.tag_index.get_mut(&entry.tag) {
                    keys.retain(|k| k != key);
                }
            }
            return None;
        }

        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn put(&self, tag: &str, key: &str, value: Value) {
        let mut inner = self.inner.lock().unwrap();

        inner.entries.insert(key.to_string(), CacheEntry {
            tag: tag.to_string(),
            stored_at: Instant::now(),
            value,
        });
        inner.tag_index
            .entry(tag.to_string())
            .or_default()
            .push(key.to_string());
    }

    /// Drop every entry filed under the tag
    pub fn invalidate_tag(&self, tag: &str) {
        let mut inner = self.inner.lock().unwrap();

        if let Some(keys) = inner.tag_index.remove(tag) {
            debug!("Invalidating {} cached entries for tag {}", keys.len(), tag);
            for key in keys {
                inner.entries.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide cache for therapist schedule reads (availability slots and
/// appointment lists), tagged by therapist id
pub fn schedule_cache() -> &'static TaggedCache {
    static SCHEDULE_CACHE: OnceLock<TaggedCache> = OnceLock::new();
    SCHEDULE_CACHE.get_or_init(|| TaggedCache::new(Duration::from_secs(30)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_and_get() {
        let cache = TaggedCache::new(Duration::from_secs(60));
        cache.put("therapist-1", "availability:1:mon", json!([{"id": 1}]));

        assert_eq!(cache.get("availability:1:mon"), Some(json!([{"id": 1}])));
        assert_eq!(cache.get("availability:1:tue"), None);
    }

    #[test]
    fn test_invalidate_tag_drops_all_entries_for_tag() {
        let cache = TaggedCache::new(Duration::from_secs(60));
        cache.put("therapist-1", "availability:1:mon", json!(1));
        cache.put("therapist-1", "appointments:1", json!(2));
        cache.put("therapist-2", "appointments:2", json!(3));

        cache.invalidate_tag("therapist-1");

        assert_eq!(cache.get("availability:1:mon"), None);
        assert_eq!(cache.get("appointments:1"), None);
        assert_eq!(cache.get("appointments:2"), Some(json!(3)));
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = TaggedCache::new(Duration::from_millis(0));
        cache.put("therapist-1", "appointments:1", json!(1));

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("appointments:1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overwrite_keeps_latest_value() {
        let cache = TaggedCache::new(Duration::from_secs(60));
        cache.put("therapist-1", "appointments:1", json!(1));
        cache.put("therapist-1", "appointments:1", json!(2));

        assert_eq!(cache.get("appointments:1"), Some(json!(2)));
    }
}
