//! Cached symbolic value decoding.
//!
//! One decoder is shared by every evaluation in the process. Definitions are
//! cached per definition id with an expiry; concurrent lookups for different
//! ids never block each other. Duplicate in-flight fetches for the same id are
//! possible and harmless.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::resolver::{CatalogDefinition, DecodedSymbol, ResolveError, SymbolResolver};

/// Default cache entry lifetime.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Default per-lookup timeout.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(2000);

/// Cache entry. `None` records a definition the catalog does not know.
#[derive(Debug, Clone)]
struct CacheEntry {
    definition: Option<Arc<CatalogDefinition>>,
    fetched_at: Instant,
}

/// Decoder cache counters.
#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetch_failures: AtomicU64,
    expirations: AtomicU64,
}

/// Snapshot of the decoder cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub fetch_failures: u64,
    pub expirations: u64,
}

/// Resolves symbolic values through a [`SymbolResolver`] with a TTL cache.
pub struct SymbolDecoder {
    resolver: Arc<dyn SymbolResolver>,
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
    timeout: Duration,
    counters: CacheCounters,
}

impl SymbolDecoder {
    /// Create a decoder with default TTL and timeout.
    pub fn new(resolver: Arc<dyn SymbolResolver>) -> Self {
        Self {
            resolver,
            cache: DashMap::new(),
            ttl: DEFAULT_CACHE_TTL,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
            counters: CacheCounters::default(),
        }
    }

    /// Set the cache entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the per-lookup timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Identifier of the underlying resolver.
    pub fn resolver_id(&self) -> &str {
        self.resolver.id()
    }

    /// Decode a symbolic value. `None` on any failure; the caller keeps the
    /// raw value.
    pub async fn decode(&self, definition_id: &str, symbolic: &str) -> Option<DecodedSymbol> {
        let definition = self.definition(definition_id).await?;
        let option = definition.option_for(symbolic)?;
        let value = option.decoded_value()?;

        debug!(
            definition_id = %definition_id,
            symbolic = %symbolic,
            decoded = %value,
            "Decoded symbolic value"
        );
        Some(DecodedSymbol {
            value,
            display_name: option.display_name.clone(),
            description: option.description.clone(),
        })
    }

    /// Cached definition lookup.
    pub async fn definition(&self, definition_id: &str) -> Option<Arc<CatalogDefinition>> {
        let key = definition_id.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }

        // Copy out before touching the map again; holding a shard guard across
        // `remove` would deadlock.
        let cached = self
            .cache
            .get(&key)
            .map(|entry| (entry.fetched_at, entry.definition.clone()));
        if let Some((fetched_at, definition)) = cached {
            if fetched_at.elapsed() < self.ttl {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return definition;
            }
            self.cache.remove(&key);
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let fetched = match tokio::time::timeout(self.timeout, self.resolver.fetch_definition(definition_id)).await {
            Ok(result) => result,
            Err(_) => Err(ResolveError::Timeout(self.timeout.as_millis() as u64)),
        };

        match fetched {
            Ok(definition) => {
                let definition = Arc::new(definition);
                self.store(key, Some(definition.clone()));
                Some(definition)
            }
            Err(ResolveError::NotFound(_)) => {
                debug!(definition_id = %definition_id, "Definition unknown to catalog");
                self.store(key, None);
                None
            }
            Err(e) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    definition_id = %definition_id,
                    resolver = %self.resolver.id(),
                    error = %e,
                    "Symbol lookup failed, keeping raw value"
                );
                None
            }
        }
    }

    fn store(&self, key: String, definition: Option<Arc<CatalogDefinition>>) {
        self.cache.insert(
            key,
            CacheEntry {
                definition,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop every cached definition.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Current cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.cache.len() as u64,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            fetch_failures: self.counters.fetch_failures.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{DefinitionOption, MockSymbolResolver, OfflineSymbolResolver};
    use serde_json::json;

    fn realtime_definition() -> CatalogDefinition {
        CatalogDefinition::new("vendor_defender_rtp")
            .with_option(DefinitionOption::new("vendor_defender_rtp_0").with_display_name("Not allowed").with_value(json!(false)))
            .with_option(DefinitionOption::new("vendor_defender_rtp_1").with_display_name("Allowed").with_value(json!(true)))
    }

    #[tokio::test]
    async fn test_decode_uses_cache() {
        let resolver = Arc::new(MockSymbolResolver::new().with_definition(realtime_definition()));
        let decoder = SymbolDecoder::new(resolver.clone());

        let first = decoder.decode("vendor_defender_rtp", "vendor_defender_rtp_1").await.unwrap();
        assert_eq!(first.value, json!(true));
        assert_eq!(first.display_name.as_deref(), Some("Allowed"));

        let second = decoder.decode("VENDOR_DEFENDER_RTP", "vendor_defender_rtp_0").await.unwrap();
        assert_eq!(second.value, json!(false));

        assert_eq!(resolver.call_count(), 1);
        let stats = decoder.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_unknown_definitions_are_cached_as_misses() {
        let resolver = Arc::new(MockSymbolResolver::new());
        let decoder = SymbolDecoder::new(resolver.clone());

        assert!(decoder.decode("nope", "nope_1").await.is_none());
        assert!(decoder.decode("nope", "nope_1").await.is_none());
        assert_eq!(resolver.call_count(), 1);
        assert_eq!(decoder.stats().fetch_failures, 0);
    }

    #[tokio::test]
    async fn test_expired_entries_are_refetched() {
        let resolver = Arc::new(MockSymbolResolver::new().with_definition(realtime_definition()));
        let decoder = SymbolDecoder::new(resolver.clone()).with_ttl(Duration::ZERO);

        decoder.decode("vendor_defender_rtp", "vendor_defender_rtp_1").await;
        decoder.decode("vendor_defender_rtp", "vendor_defender_rtp_1").await;

        assert_eq!(resolver.call_count(), 2);
        assert_eq!(decoder.stats().expirations, 1);
    }

    #[tokio::test]
    async fn test_unavailable_catalog_is_soft_miss() {
        let resolver = Arc::new(
            MockSymbolResolver::new()
                .with_definition(realtime_definition())
                .with_available(false),
        );
        let decoder = SymbolDecoder::new(resolver.clone());

        assert!(decoder.decode("vendor_defender_rtp", "vendor_defender_rtp_1").await.is_none());
        assert!(decoder.decode("vendor_defender_rtp", "vendor_defender_rtp_1").await.is_none());
        // Failures are not cached
        assert_eq!(resolver.call_count(), 2);
        assert_eq!(decoder.stats().fetch_failures, 2);
    }

    #[tokio::test]
    async fn test_slow_lookup_times_out() {
        let resolver = Arc::new(
            MockSymbolResolver::new()
                .with_definition(realtime_definition())
                .with_delay(Duration::from_millis(200)),
        );
        let decoder = SymbolDecoder::new(resolver).with_timeout(Duration::from_millis(10));

        assert!(decoder.decode("vendor_defender_rtp", "vendor_defender_rtp_1").await.is_none());
        assert_eq!(decoder.stats().fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_offline_decoding() {
        let decoder = SymbolDecoder::new(Arc::new(OfflineSymbolResolver::new()));
        let decoded = decoder
            .decode("vendor_firewall_enabled", "vendor_firewall_enabled_1")
            .await
            .unwrap();
        assert_eq!(decoded.value, json!(true));
        assert!(decoder.decode("vendor_firewall_enabled", "vendor_firewall_enabled_5").await.is_none());
        assert_eq!(decoder.resolver_id(), "offline");
    }

    #[tokio::test]
    async fn test_concurrent_lookups_share_cache() {
        let resolver = Arc::new(MockSymbolResolver::new().with_definition(realtime_definition()));
        let decoder = Arc::new(SymbolDecoder::new(resolver.clone()));
        decoder.definition("vendor_defender_rtp").await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let decoder = decoder.clone();
            handles.push(tokio::spawn(async move {
                decoder.decode("vendor_defender_rtp", "vendor_defender_rtp_1").await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().map(|d| d.value), Some(json!(true)));
        }
        assert_eq!(resolver.call_count(), 1);
        assert_eq!(decoder.stats().hits, 8);
    }
}
