use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Small TTL cache in front of the gateway's read endpoints. Capacity is
/// enforced by evicting the oldest entry once full; entries older than
/// `ttl` are treated as absent on lookup.
pub struct TtlCache<V> {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<String, (Instant, V)>,
    order: Vec<String>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let (inserted, value) = self.entries.get(key)?;
        if inserted.elapsed() > self.ttl {
            return None;
        }
        Some(value.clone())
    }

    pub fn put(&mut self, key: String, value: V) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.first().cloned() {
                self.entries.remove(&oldest);
                self.order.remove(0);
            }
        }
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, (Instant::now(), value));
    }

    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_entry_once_over_capacity() {
        let mut cache = TtlCache::new(2, Duration::from_secs(60));
        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        cache.put("c".into(), 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let mut cache = TtlCache::new(4, Duration::from_millis(0));
        cache.put("a".into(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("a"), None);
    }
}
