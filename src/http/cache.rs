//! Edge cache for third-party script fetches.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{Method, StatusCode};
use dashmap::DashMap;
use futures_util::future::BoxFuture;

use crate::http::origin::{Fetch, FetchError};
use crate::http::{EdgeRequest, EdgeResponse};
use crate::observability::metrics;

#[derive(Debug, Clone)]
struct CachedResponse {
    response: EdgeResponse,
    expires_at: Instant,
}

/// Entry cap applied by `EdgeCache::new`.
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// TTL cache in front of another fetcher, keyed by the normalized URL.
///
/// Only successful GET responses are stored. Keys carry the client's query
/// string, so the entry count is capped; once full, new keys are served
/// uncached until expired entries are purged.
#[derive(Clone)]
pub struct EdgeCache {
    inner: Arc<dyn Fetch>,
    entries: Arc<DashMap<String, CachedResponse>>,
    default_ttl: Duration,
    max_entries: usize,
}

impl EdgeCache {
    pub fn new(inner: Arc<dyn Fetch>, default_ttl: Duration) -> Self {
        Self {
            inner,
            entries: Arc::new(DashMap::new()),
            default_ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Fetch through the cache with an explicit TTL.
    pub async fn fetch_with_ttl(
        &self,
        request: EdgeRequest,
        ttl: Duration,
    ) -> Result<EdgeResponse, FetchError> {
        let cacheable = request.method() == Method::GET;
        let key = request.url().as_str().to_string();

        if cacheable {
            if let Some(entry) = self.entries.get(&key) {
                if entry.expires_at > Instant::now() {
                    metrics::record_cache_lookup(true);
                    tracing::debug!(key = %key, "Edge cache hit");
                    return Ok(entry.response.clone());
                }
            }
            metrics::record_cache_lookup(false);
        }

        let response = self.inner.fetch(request).await?;

        if cacheable && response.status() == StatusCode::OK && self.has_room_for(&key) {
            self.entries.insert(
                key,
                CachedResponse {
                    response: response.clone(),
                    expires_at: Instant::now() + ttl,
                },
            );
        }
        Ok(response)
    }

    fn has_room_for(&self, key: &str) -> bool {
        if self.entries.contains_key(key) || self.entries.len() < self.max_entries {
            return true;
        }
        self.purge_expired();
        let room = self.entries.len() < self.max_entries;
        if !room {
            tracing::warn!(key = %key, max_entries = self.max_entries, "Edge cache full, not storing");
        }
        room
    }

    /// Drop expired entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Fetch for EdgeCache {
    fn fetch<'a>(&'a self, request: EdgeRequest) -> BoxFuture<'a, Result<EdgeResponse, FetchError>> {
        Box::pin(self.fetch_with_ttl(request, self.default_ttl))
    }
}
