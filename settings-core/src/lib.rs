//! Settings Core - document model, tree walking and validation
//!
//! The pure, synchronous half of the compliance engine:
//!
//! - **Data model**: policy documents, catalog settings, extraction results
//!   and compliance records
//! - **Path primitives**: nested lookup, case variants, bounded key search
//! - **Settings catalog**: recognition and flattening of nested instance trees,
//!   four-tier setting matching, symbolic reference detection
//! - **Validation**: type-aware operator evaluation
//!
//! # Key Components
//!
//! - [`CatalogTree`]: Flattened settings-catalog document
//! - [`flatten_and_match`]: One-shot flatten plus match, for diagnostics
//! - [`Validator`]: Coerces both operands and evaluates an operator
//!
//! # Example
//!
//! ```ignore
//! use settings_core::{validate, DataType, PolicyDocument, SettingDefinition};
//!
//! let verdict = validate(Some(&serde_json::json!("TRUE")), "true", "==", DataType::Boolean);
//! assert!(verdict.is_valid);
//! ```

pub mod catalog;
pub mod path;
pub mod types;
pub mod validation;

// Re-export main types
pub use catalog::{flatten_and_match, CatalogShape, CatalogTree, FlatSetting, MatchTuning, SettingKind, SettingNodeValue};
pub use types::*;
pub use validation::{
    validate, DataType, Operator, UnknownOperatorPolicy, ValidationIssue, ValidationVerdict,
    Validator,
};
