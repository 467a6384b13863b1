use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::pipeline::PipelineResult;

/// How long a completed pipeline result satisfies repeat submissions.
const RESULT_TTL_HOURS: i64 = 24;

/// Time-boxed memoization of completed pipeline runs, keyed by
/// (url, target language). A hit short-circuits the whole pipeline.
pub struct ResultCache {
    entries: Mutex<HashMap<(String, String), CachedResult>>,
}

struct CachedResult {
    result: PipelineResult,
    stored_at: DateTime<Utc>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A fresh result for this (url, target language), if one exists.
    /// Expired entries are dropped on the way out.
    pub fn get(&self, url: &str, target_lang: &str) -> Option<PipelineResult> {
        let key = (url.to_string(), target_lang.to_string());
        let mut entries = self.entries.lock().unwrap();

        let fresh = entries
            .get(&key)
            .map(|cached| Utc::now() - cached.stored_at < Duration::hours(RESULT_TTL_HOURS));

        match fresh {
            Some(true) => entries.get(&key).map(|cached| cached.result.clone()),
            Some(false) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Store a completed result. Concurrent identical requests race here;
    /// last writer wins, which costs at most one redundant pipeline run.
    pub fn insert(&self, url: &str, target_lang: &str, result: PipelineResult) {
        let key = (url.to_string(), target_lang.to_string());
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key,
            CachedResult {
                result,
                stored_at: Utc::now(),
            },
        );
    }

    #[cfg(test)]
    fn insert_with_age(&self, url: &str, target_lang: &str, result: PipelineResult, age: Duration) {
        let key = (url.to_string(), target_lang.to_string());
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key,
            CachedResult {
                result,
                stored_at: Utc::now() - age,
            },
        );
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Stats snapshot of the resource cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size: usize,
    pub max_size: usize,
}

struct ResourceEntry {
    data: Value,
    size: usize,
    timestamp: DateTime<Utc>,
    importance: u8,
}

/// Bounded in-memory cache for intermediate artifacts, evicting by
/// importance first and age second until an incoming entry fits.
pub struct ResourceCache {
    entries: Mutex<HashMap<String, ResourceEntry>>,
    max_size: usize,
    ttl: Duration,
}

impl ResourceCache {
    pub fn new(max_size: usize, ttl_hours: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Insert `data` under `key`. Evicts lowest-importance, then oldest,
    /// entries until the new item fits. Returns false (and stores nothing)
    /// when the item alone exceeds the cache bound.
    pub fn insert(&self, key: &str, data: Value, importance: u8) -> bool {
        // Size is estimated by serialized length; close enough to bound
        // memory without tracking allocations.
        let size = data.to_string().len();
        if size > self.max_size {
            tracing::warn!(
                "Cache item '{}' ({} bytes) exceeds cache capacity ({} bytes), skipping",
                key,
                size,
                self.max_size
            );
            return false;
        }

        let mut entries = self.entries.lock().unwrap();

        let occupied = |entries: &HashMap<String, ResourceEntry>| -> usize {
            entries.values().map(|e| e.size).sum()
        };

        // Replacing a key frees its old footprint first.
        entries.remove(key);

        while occupied(&entries) + size > self.max_size {
            let victim = entries
                .iter()
                .min_by(|(_, a), (_, b)| {
                    a.importance
                        .cmp(&b.importance)
                        .then(a.timestamp.cmp(&b.timestamp))
                })
                .map(|(k, _)| k.clone());

            match victim {
                Some(k) => {
                    tracing::debug!("Evicting cache entry '{}'", k);
                    entries.remove(&k);
                }
                None => break,
            }
        }

        entries.insert(
            key.to_string(),
            ResourceEntry {
                data,
                size,
                timestamp: Utc::now(),
                importance,
            },
        );
        true
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).map(|e| e.data.clone())
    }

    pub fn remove(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key).is_some()
    }

    /// Drop entries older than the TTL. Best effort; called opportunistically.
    pub fn sweep(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| e.timestamp >= cutoff);
        before - entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock().unwrap();
        CacheStats {
            entries: entries.len(),
            total_size: entries.values().map(|e| e.size).sum(),
            max_size: self.max_size,
        }
    }

    #[cfg(test)]
    fn backdate(&self, key: &str, age: Duration) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.timestamp = Utc::now() - age;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(url: &str) -> PipelineResult {
        PipelineResult {
            success: true,
            request_id: "req-1-test".to_string(),
            video_id: "vid1".to_string(),
            url: url.to_string(),
            title: "t".to_string(),
            transcript: "hello".to_string(),
            translation: "שלום".to_string(),
            detected_language: "en".to_string(),
            target_language: "he".to_string(),
            audio_path: None,
            is_fallback_transcript: false,
            error: None,
        }
    }

    #[test]
    fn test_result_cache_hit_within_window() {
        let cache = ResultCache::new();
        cache.insert("https://u", "he", result("https://u"));

        assert!(cache.get("https://u", "he").is_some());
        assert!(cache.get("https://u", "ar").is_none());
        assert!(cache.get("https://other", "he").is_none());
    }

    #[test]
    fn test_result_cache_expires() {
        let cache = ResultCache::new();
        cache.insert_with_age("https://u", "he", result("https://u"), Duration::hours(25));
        assert!(cache.get("https://u", "he").is_none());
    }

    #[test]
    fn test_resource_cache_evicts_least_important_oldest_first() {
        let cache = ResourceCache::new(100, 24);

        // Three entries of 28 serialized bytes each.
        assert!(cache.insert("low", json!({"pad": "aaaaaaaaaaaaaaaaaa"}), 1));
        assert!(cache.insert("mid", json!({"pad": "bbbbbbbbbbbbbbbbbb"}), 5));
        assert!(cache.insert("high", json!({"pad": "cccccccccccccccccc"}), 9));

        // Forcing an insert that does not fit evicts "low" first.
        assert!(cache.insert("new", json!({"pad": "dddddddddddddddddd"}), 5));
        assert!(cache.get("low").is_none());
        assert!(cache.get("high").is_some());
        assert!(cache.stats().total_size <= cache.stats().max_size);
    }

    #[test]
    fn test_resource_cache_evicts_oldest_within_same_importance() {
        let cache = ResourceCache::new(100, 24);
        assert!(cache.insert("older", json!({"pad": "aaaaaaaaaaaaaaaaaa"}), 5));
        cache.backdate("older", Duration::hours(2));
        assert!(cache.insert("newer", json!({"pad": "bbbbbbbbbbbbbbbbbb"}), 5));
        assert!(cache.insert("third", json!({"pad": "cccccccccccccccccc"}), 5));

        assert!(cache.insert("incoming", json!({"pad": "dddddddddddddddddd"}), 5));
        assert!(cache.get("older").is_none());
        assert!(cache.get("newer").is_some());
    }

    #[test]
    fn test_resource_cache_rejects_oversized_item() {
        let cache = ResourceCache::new(10, 24);
        assert!(!cache.insert("big", json!({"pad": "way too large for this cache"}), 9));
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_resource_cache_size_bound_holds() {
        let cache = ResourceCache::new(100, 24);
        for i in 0..20 {
            cache.insert(&format!("k{}", i), json!({"pad": "eeeeeeeeeeeeeeeeee"}), (i % 7) as u8);
            let stats = cache.stats();
            assert!(
                stats.total_size <= stats.max_size,
                "size bound violated at insert {}",
                i
            );
        }
    }

    #[test]
    fn test_resource_cache_ttl_sweep() {
        let cache = ResourceCache::new(1000, 24);
        cache.insert("stale", json!("x"), 5);
        cache.backdate("stale", Duration::hours(25));
        cache.insert("fresh", json!("y"), 5);

        assert_eq!(cache.sweep(), 1);
        assert!(cache.get("stale").is_none());
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn test_resource_cache_remove() {
        let cache = ResourceCache::new(1000, 24);
        cache.insert("k", json!("v"), 5);
        assert!(cache.remove("k"));
        assert!(!cache.remove("k"));
    }
}
