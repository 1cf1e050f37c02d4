//! Offline resolver for when no catalog service is reachable.
//!
//! Two-option choice settings almost always use `_0` for disabled and `_1`
//! for enabled. Without a catalog, that convention is the best available
//! decoding; other discriminators are left undecoded.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::*;

/// Offline resolver using the boolean discriminator convention plus any
/// definitions loaded ahead of time.
pub struct OfflineSymbolResolver {
    preloaded: RwLock<HashMap<String, CatalogDefinition>>,
}

impl OfflineSymbolResolver {
    /// Create a new offline resolver.
    pub fn new() -> Self {
        Self {
            preloaded: RwLock::new(HashMap::new()),
        }
    }

    /// Load definitions captured from a previous online session.
    pub fn load(&self, definitions: impl IntoIterator<Item = CatalogDefinition>) {
        if let Ok(mut preloaded) = self.preloaded.write() {
            for definition in definitions {
                preloaded.insert(definition.id.to_lowercase(), definition);
            }
        }
    }

    fn convention(definition_id: &str) -> CatalogDefinition {
        CatalogDefinition::new(definition_id)
            .with_option(
                DefinitionOption::new(format!("{}_0", definition_id))
                    .with_display_name("Disabled")
                    .with_value(Value::Bool(false)),
            )
            .with_option(
                DefinitionOption::new(format!("{}_1", definition_id))
                    .with_display_name("Enabled")
                    .with_value(Value::Bool(true)),
            )
    }
}

impl Default for OfflineSymbolResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SymbolResolver for OfflineSymbolResolver {
    fn id(&self) -> &str {
        "offline"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn fetch_definition(&self, definition_id: &str) -> Result<CatalogDefinition, ResolveError> {
        let preloaded = self
            .preloaded
            .read()
            .ok()
            .and_then(|p| p.get(&definition_id.to_lowercase()).cloned());
        Ok(preloaded.unwrap_or_else(|| Self::convention(definition_id)))
    }
}
