//! Core trait for definition catalogs.
//!
//! This module defines the `SymbolResolver` trait - the abstraction over the
//! external service that describes setting definitions and their options.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Error types for definition lookups.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Catalog service is not reachable
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    /// Definition does not exist
    #[error("Definition not found: {0}")]
    NotFound(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Response could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Lookup did not complete in time
    #[error("Lookup timed out after {0}ms")]
    Timeout(u64),
}

/// Trait for external setting definition catalogs.
///
/// Implementations are treated as pure, cacheable and possibly unavailable.
#[async_trait]
pub trait SymbolResolver: Send + Sync {
    /// Resolver identifier for logs.
    fn id(&self) -> &str;

    /// Check if the catalog is reachable.
    async fn is_available(&self) -> bool;

    /// Fetch one setting definition with its options.
    async fn fetch_definition(&self, definition_id: &str) -> Result<CatalogDefinition, ResolveError>;
}

/// A setting definition as described by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogDefinition {
    /// Definition identifier
    pub id: String,
    /// Human-readable name
    pub display_name: Option<String>,
    /// Longer description
    pub description: Option<String>,
    /// Enumerated options, for choice settings
    pub options: Vec<DefinitionOption>,
}

impl CatalogDefinition {
    /// Create a definition without options.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            description: None,
            options: vec![],
        }
    }

    /// Set the display name.
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Add an option.
    pub fn with_option(mut self, option: DefinitionOption) -> Self {
        self.options.push(option);
        self
    }

    /// Option whose item id equals the symbolic value (case-insensitive).
    pub fn option_for(&self, symbolic: &str) -> Option<&DefinitionOption> {
        let symbolic = symbolic.trim();
        self.options
            .iter()
            .find(|o| o.item_id.eq_ignore_ascii_case(symbolic))
    }
}

/// One enumerated option of a choice definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionOption {
    /// Symbolic reference standing for this option
    pub item_id: String,
    /// Human-readable label
    pub display_name: Option<String>,
    /// Longer description
    pub description: Option<String>,
    /// Literal value the option carries, when the catalog provides one
    pub option_value: Option<Value>,
}

impl DefinitionOption {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            display_name: None,
            description: None,
            option_value: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.option_value = Some(value);
        self
    }

    /// Literal value if present, otherwise the display name.
    pub fn decoded_value(&self) -> Option<Value> {
        self.option_value
            .clone()
            .filter(|v| !v.is_null())
            .or_else(|| self.display_name.clone().map(Value::String))
    }
}

/// Human-meaningful form of a symbolic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct DecodedSymbol {
    /// Decoded value used for validation
    pub value: Value,
    /// Option label
    pub display_name: Option<String>,
    /// Option description
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_option_lookup_ignores_case() {
        let definition = CatalogDefinition::new("vendor_x")
            .with_option(DefinitionOption::new("vendor_x_0").with_display_name("Block"))
            .with_option(DefinitionOption::new("vendor_x_1").with_value(json!(true)));

        assert_eq!(
            definition.option_for("VENDOR_X_0").and_then(|o| o.decoded_value()),
            Some(json!("Block"))
        );
        assert_eq!(
            definition.option_for("vendor_x_1").and_then(|o| o.decoded_value()),
            Some(json!(true))
        );
        assert!(definition.option_for("vendor_x_2").is_none());
    }
}
