//! Small in-process TTL cache fronting the RPC client.
//!
//! A real deployment backs this with Redis so multiple profiler workers
//! share one cache; this in-process version gives the same read-through
//! semantics for a single-process deployment and is swappable later.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct Entry {
    value: String,
    expires_at: Instant,
}

pub struct TtlCache {
    entries: Mutex<HashMap<String, Entry>>,
    default_ttl: Duration,
}

impl TtlCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: String, value: String, ttl: Option<Duration>) {
        let expires_at = Instant::now() + ttl.unwrap_or(self.default_ttl);
        self.entries.lock().insert(key, Entry { value, expires_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("k".into(), "v".into(), None);
        assert_eq!(cache.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn expired_entry_is_gone() {
        let cache = TtlCache::new(Duration::from_millis(0));
        cache.set("k".into(), "v".into(), Some(Duration::from_millis(0)));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k"), None);
    }
}
