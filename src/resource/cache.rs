use std::{
    num::NonZeroUsize,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use lru::LruCache;

use super::BinaryContent;

/// Default time an entry stays valid after it was fetched
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default number of entries kept before the least recently used one is evicted
pub const DEFAULT_CAPACITY: usize = 1024;

/// Time-expiring cache of fetched remote content, keyed by URL
///
/// Shared by every resolution using the same [`Resolver`](super::Resolver).
/// `get` and `insert` are each atomic; two concurrent misses on the same URL
/// may both fetch it, in which case the last insert wins.
#[derive(Debug)]
pub struct ContentCache {
    ttl: Duration,
    entries: Mutex<LruCache<String, Entry>>,
}

#[derive(Debug)]
struct Entry {
    created: Instant,
    content: BinaryContent,
}

impl ContentCache {
    pub fn new(ttl: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns true for URLs which are never cached: `file:` and `mem:`, or a
    /// `jar:` wrapping one of those
    pub fn is_local(url: &str) -> bool {
        let lower = url.trim_start().to_ascii_lowercase();
        let inner = lower.strip_prefix("jar:").unwrap_or(&lower);
        if inner.len() != lower.len() {
            return inner.starts_with("file:") || inner.starts_with("mem:");
        }
        lower.starts_with("file:") || lower.starts_with("mem:")
    }

    /// The content cached for `url`, unless missing or expired
    pub fn get(&self, url: &str) -> Option<BinaryContent> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(url) {
            Some(entry) if entry.created.elapsed() < self.ttl => Some(entry.content.clone()),
            Some(_) => {
                entries.pop(url);
                None
            }
            None => None,
        }
    }

    /// Caches `content` for `url`, unless `url` is local
    pub fn insert(&self, url: &str, content: BinaryContent) {
        if Self::is_local(url) {
            return;
        }
        let entry = Entry {
            created: Instant::now(),
            content,
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(url.to_owned(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for ContentCache {
    fn default() -> Self {
        Self::new(
            DEFAULT_TTL,
            NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN),
        )
    }
}
