//! Core types for the extraction engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use settings_core::{ComplianceCheck, CoreError, ExtractionResult, ValidationVerdict};
use symbol_resolver::DecodedSymbol;

/// What happened to a located value on its way to validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Decoding {
    /// Literal value, or decoding disabled
    NotNeeded,
    /// Symbolic reference resolved through the definition catalog
    Decoded {
        definition_id: String,
        symbol: DecodedSymbol,
    },
    /// Symbolic reference the catalog could not resolve; raw value kept
    Unresolved { definition_id: String },
}

impl Decoding {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }
}

/// Full outcome of evaluating one (document, setting) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Where and how the value was located
    pub extraction: ExtractionResult,
    /// Symbolic decoding applied to the located value
    pub decoding: Decoding,
    /// Value handed to validation
    pub actual: Option<Value>,
    /// Validation verdict
    pub verdict: ValidationVerdict,
    /// Record for persistence by the caller
    pub check: ComplianceCheck,
}

impl Evaluation {
    pub fn document_id(&self) -> &str {
        &self.check.document_id
    }

    pub fn setting_id(&self) -> &str {
        &self.check.setting_id
    }

    pub fn is_compliant(&self) -> bool {
        self.verdict.is_valid
    }
}

/// Error types for the extraction engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Document could not be read
    #[error("Document error: {0}")]
    Document(#[from] CoreError),

    /// Catalog file could not be read
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
