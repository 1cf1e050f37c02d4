//! Mock resolver for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use super::traits::*;

/// Mock resolver for testing.
///
/// Serves a fixed set of definitions and counts lookups.
pub struct MockSymbolResolver {
    definitions: HashMap<String, CatalogDefinition>,
    available: AtomicBool,
    delay: Option<Duration>,
    call_count: AtomicU32,
}

impl MockSymbolResolver {
    /// Create a new mock resolver with no definitions.
    pub fn new() -> Self {
        Self {
            definitions: HashMap::new(),
            available: AtomicBool::new(true),
            delay: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Add a definition.
    pub fn with_definition(mut self, definition: CatalogDefinition) -> Self {
        self.definitions.insert(definition.id.to_lowercase(), definition);
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Delay every lookup.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of times fetch_definition was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockSymbolResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SymbolResolver for MockSymbolResolver {
    fn id(&self) -> &str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn fetch_definition(&self, definition_id: &str) -> Result<CatalogDefinition, ResolveError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(ResolveError::Unavailable("Mock resolver disabled".to_string()));
        }

        self.definitions
            .get(&definition_id.to_lowercase())
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(definition_id.to_string()))
    }
}
