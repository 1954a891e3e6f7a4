use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Bounded FIFO-by-recency dedup for inbound WebSocket events, keyed by
/// transaction signature.
pub struct SignatureDedup {
    seen: Mutex<LruCache<String, ()>>,
}

impl SignatureDedup {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: Mutex::new(LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap())),
        }
    }

    /// Returns true the first time a signature is seen.
    pub fn insert(&self, signature: &str) -> bool {
        let mut seen = self.seen.lock().unwrap();
        if seen.contains(signature) {
            return false;
        }
        seen.put(signature.to_string(), ());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_wins_replay_loses() {
        let dedup = SignatureDedup::new(4);
        assert!(dedup.insert("sig-1"));
        assert!(!dedup.insert("sig-1"));
    }

    #[test]
    fn eviction_is_bounded() {
        let dedup = SignatureDedup::new(2);
        assert!(dedup.insert("a"));
        assert!(dedup.insert("b"));
        assert!(dedup.insert("c"));
        // "a" was evicted by capacity, so it reads as new again
        assert!(dedup.insert("a"));
    }
}
