//! Content-addressed cache of structured documents

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::document::Document;
use crate::metrics::METRICS;

/// Lowercase hex SHA-256 of the uploaded bytes
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Store for structured documents keyed by [`content_hash`]
#[async_trait]
pub trait DocumentCache: Send + Sync {
    async fn get(&self, hash: &str) -> Option<Document>;

    async fn put(&self, hash: String, document: Document);
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_documents")]
    pub max_documents: u64,

    /// Time to live in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_max_documents() -> u64 {
    64
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// In-memory [`DocumentCache`] with capacity and TTL bounds
pub struct MokaDocumentCache {
    inner: Cache<String, Document>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MokaDocumentCache {
    pub fn new(max_documents: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_documents)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_documents, config.ttl())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}

#[async_trait]
impl DocumentCache for MokaDocumentCache {
    async fn get(&self, hash: &str) -> Option<Document> {
        let found = self.inner.get(hash).await;
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            METRICS.record_cache_lookup(true);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            METRICS.record_cache_lookup(false);
        }
        found
    }

    async fn put(&self, hash: String, mut document: Document) {
        document.payload = None;
        self.inner.insert(hash, document).await;
    }
}
