use lru::LruCache;
use rand::Rng;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: f64,
    expires_at: Instant,
}

/// Per-process price cache: bounded, TTL'd, LRU-evicted. TTLs carry a small
/// jitter so a fleet of positions on the same mint doesn't re-quote in
/// lockstep.
pub struct PriceCache {
    entries: Mutex<LruCache<String, CachedPrice>>,
    ttl: Duration,
}

impl PriceCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap(),
            )),
            ttl,
        }
    }

    pub fn get(&self, mint: &str) -> Option<f64> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(mint) {
            Some(cached) if cached.expires_at > Instant::now() => Some(cached.price),
            Some(_) => {
                entries.pop(mint);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, mint: &str, price: f64) {
        let jitter_ms = rand::thread_rng().gen_range(0..=self.ttl.as_millis().max(1) as u64 / 10);
        let expires_at = Instant::now() + self.ttl + Duration::from_millis(jitter_ms);
        self.entries
            .lock()
            .unwrap()
            .put(mint.to_string(), CachedPrice { price, expires_at });
    }

    /// Drop expired entries. Size-based LRU eviction already bounds the map;
    /// this sweep keeps dead entries from occupying live slots.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, v)| v.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl_miss_after() {
        let cache = PriceCache::new(10, Duration::from_millis(50));
        cache.put("mint-a", 0.001);
        assert_eq!(cache.get("mint-a"), Some(0.001));
        std::thread::sleep(Duration::from_millis(70));
        assert_eq!(cache.get("mint-a"), None);
    }

    #[test]
    fn capacity_is_bounded_by_lru_eviction() {
        let cache = PriceCache::new(2, Duration::from_secs(60));
        cache.put("a", 1.0);
        cache.put("b", 2.0);
        cache.put("c", 3.0);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some(3.0));
    }

    #[test]
    fn evict_expired_clears_dead_entries() {
        let cache = PriceCache::new(10, Duration::from_millis(10));
        cache.put("a", 1.0);
        cache.put("b", 2.0);
        std::thread::sleep(Duration::from_millis(30));
        let evicted = cache.evict_expired();
        assert_eq!(evicted, 2);
        assert!(cache.is_empty());
    }
}
