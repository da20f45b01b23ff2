//! Time-bounded whole-response store.
//!
//! Entries are never invalidated by writes to posts, groups or comments. A
//! stored page is served until its time window elapses or the store is cleared.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use lru::LruCache;
use metrics::counter;

use super::config::PageCacheConfig;
use super::keys::PageKey;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";

/// Buffered response, replayed byte for byte on a hit.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: &HeaderMap, body: Bytes) -> Self {
        let stored_headers = headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self {
            status,
            headers: stored_headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        headers.clear();
        for (name, value) in self.headers {
            headers.append(name, value);
        }

        response
    }
}

struct Entry {
    response: CachedResponse,
    stored_at: Instant,
}

/// LRU page store whose entries expire after a fixed time window.
pub struct PageCache {
    entries: Mutex<LruCache<PageKey, Entry>>,
    ttl: Duration,
}

impl PageCache {
    pub fn new(config: &PageCacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.capacity_non_zero())),
            ttl: config.ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &PageKey) -> Option<CachedResponse> {
        self.get_at(key, Instant::now())
    }

    /// Look up `key` as of `now`. An expired entry counts as a miss and is dropped.
    pub fn get_at(&self, key: &PageKey, now: Instant) -> Option<CachedResponse> {
        let mut entries = mutex_lock(&self.entries, SOURCE, "get");
        let fresh = entries
            .get(key)
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < self.ttl)
            .map(|entry| entry.response.clone());
        if fresh.is_none() {
            entries.pop(key);
        }
        drop(entries);

        if fresh.is_some() {
            counter!("yatube_page_cache_hit_total").increment(1);
        } else {
            counter!("yatube_page_cache_miss_total").increment(1);
        }
        fresh
    }

    pub fn insert(&self, key: PageKey, response: CachedResponse) {
        self.insert_at(key, response, Instant::now());
    }

    pub fn insert_at(&self, key: PageKey, response: CachedResponse, now: Instant) {
        let evicted = mutex_lock(&self.entries, SOURCE, "insert").push(
            key.clone(),
            Entry {
                response,
                stored_at: now,
            },
        );
        // `push` hands back the old value when the key was already present.
        if matches!(evicted, Some((evicted_key, _)) if evicted_key != key) {
            counter!("yatube_page_cache_evict_total").increment(1);
        }
    }

    /// Drop every stored page.
    pub fn clear(&self) {
        mutex_lock(&self.entries, SOURCE, "clear").clear();
    }

    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "purge_expired");
        let expired: Vec<PageKey> = entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.stored_at) >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
