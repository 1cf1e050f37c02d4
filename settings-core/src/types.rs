//! Core types for policy documents, catalog settings and extraction outcomes.
//!
//! With the `typescript` feature enabled, the outcome types can be exported to
//! TypeScript using ts-rs for consistency with the dashboard frontend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::validation::{DataType, ValidationVerdict};

/// Error types for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Document body could not be parsed
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Catalog entry could not be parsed
    #[error("Malformed setting definition: {0}")]
    MalformedSetting(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// An exported policy document.
///
/// The content is an arbitrarily shaped tree; nothing about its layout is
/// assumed beyond it being JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Document ID assigned by the ingestion process
    pub id: String,
    /// Policy family that produced the document
    pub kind: String,
    /// Coarser grouping above `kind`
    #[serde(default)]
    pub template_family: Option<String>,
    /// Raw document tree
    pub content: serde_json::Value,
}

impl PolicyDocument {
    /// Create a new document.
    pub fn new(id: impl Into<String>, kind: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            template_family: None,
            content,
        }
    }

    /// Parse the document body from JSON text.
    pub fn from_json_str(id: impl Into<String>, kind: impl Into<String>, body: &str) -> Result<Self> {
        let content =
            serde_json::from_str(body).map_err(|e| CoreError::MalformedDocument(e.to_string()))?;
        Ok(Self::new(id, kind, content))
    }

    /// Set the template family.
    pub fn with_template_family(mut self, family: impl Into<String>) -> Self {
        self.template_family = Some(family.into());
        self
    }
}

/// A catalog entry describing one expected configuration requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingDefinition {
    /// Catalog ID
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Best-guess setting name (often a definition identifier)
    #[serde(default)]
    pub name_hint: Option<String>,
    /// Best-guess dotted path inside the document
    #[serde(default)]
    pub path_hint: Option<String>,
    /// Expected value, as text
    #[serde(default)]
    pub expected_value: String,
    /// Comparison operator, as authored in the catalog
    #[serde(default)]
    pub operator: String,
    /// Declared data type
    #[serde(default)]
    pub data_type: DataType,
    /// Document kinds this setting applies to (empty = all)
    #[serde(default)]
    pub document_kinds: Vec<String>,
    /// Template families this setting applies to (empty = all)
    #[serde(default)]
    pub template_families: Vec<String>,
}

impl SettingDefinition {
    /// Create a setting with only a display name; defaults to an equality check.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            name_hint: None,
            path_hint: None,
            expected_value: String::new(),
            operator: "==".to_string(),
            data_type: DataType::String,
            document_kinds: vec![],
            template_families: vec![],
        }
    }

    /// Set the path hint.
    pub fn with_path_hint(mut self, hint: impl Into<String>) -> Self {
        self.path_hint = Some(hint.into());
        self
    }

    /// Set the name hint.
    pub fn with_name_hint(mut self, hint: impl Into<String>) -> Self {
        self.name_hint = Some(hint.into());
        self
    }

    /// Set the expectation.
    pub fn expecting(
        mut self,
        expected: impl Into<String>,
        operator: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        self.expected_value = expected.into();
        self.operator = operator.into();
        self.data_type = data_type;
        self
    }

    /// Restrict to the given document kinds.
    pub fn scoped_to_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Restrict to the given template families.
    pub fn scoped_to_families<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.template_families = families.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this setting is relevant to the document at all.
    pub fn applies_to(&self, document: &PolicyDocument) -> bool {
        let kind_ok = self.document_kinds.is_empty()
            || self
                .document_kinds
                .iter()
                .any(|k| k.eq_ignore_ascii_case(&document.kind));

        let family_ok = self.template_families.is_empty()
            || document.template_family.as_ref().is_some_and(|family| {
                self.template_families
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(family))
            });

        kind_ok && family_ok
    }

    /// Path hint with surrounding whitespace removed, if non-empty.
    pub fn path_hint(&self) -> Option<&str> {
        self.path_hint.as_deref().map(str::trim).filter(|h| !h.is_empty())
    }

    /// Name hint with surrounding whitespace removed, if non-empty.
    pub fn name_hint(&self) -> Option<&str> {
        self.name_hint.as_deref().map(str::trim).filter(|h| !h.is_empty())
    }
}

/// Strategy that located a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Path hint used verbatim
    ExactPath,
    /// Path hint with documentation prefixes removed
    PrefixStripped,
    /// Final path segment at the document root
    DirectProperty,
    /// Final path segment under alternative casings
    CaseVariant,
    /// Bounded breadth-first key search
    ShallowSearch,
    /// Location promoted from a learned path table
    LearnedPath,
    /// Settings-catalog tree search
    SettingsCatalog,
    /// Settings-catalog search driven by derived terms
    SettingsCatalogDeep,
    /// Nothing matched
    None,
}

impl StrategyKind {
    /// Highest confidence this strategy may report.
    pub fn ceiling(&self) -> f32 {
        match self {
            Self::ExactPath => 0.95,
            Self::PrefixStripped => 0.85,
            Self::DirectProperty => 0.75,
            Self::CaseVariant => 0.60,
            Self::ShallowSearch => 0.40,
            Self::LearnedPath => 0.90,
            Self::SettingsCatalog => 0.80,
            Self::SettingsCatalogDeep => 0.55,
            Self::None => 0.0,
        }
    }

    /// Stable name used in traces and statistics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactPath => "exact-path",
            Self::PrefixStripped => "prefix-stripped",
            Self::DirectProperty => "direct-property",
            Self::CaseVariant => "case-variant",
            Self::ShallowSearch => "shallow-search",
            Self::LearnedPath => "learned-path",
            Self::SettingsCatalog => "settings-catalog",
            Self::SettingsCatalogDeep => "settings-catalog-deep",
            Self::None => "none",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of locating one setting inside one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ExtractionResult {
    /// Located value (never JSON null)
    pub value: Option<serde_json::Value>,
    /// Strategy that produced the value
    pub strategy: StrategyKind,
    /// Confidence (0.0 - ceiling of `strategy`)
    pub confidence: f32,
    /// Human-auditable description of where the value was found
    pub trace: String,
    /// Location identifier (document path or definition id)
    pub location: Option<String>,
}

impl ExtractionResult {
    /// Result for a cascade where every strategy missed.
    pub fn none() -> Self {
        Self {
            value: None,
            strategy: StrategyKind::None,
            confidence: 0.0,
            trace: "no strategy located a value".to_string(),
            location: None,
        }
    }

    /// Result for a successful strategy. Confidence is clamped to the ceiling.
    pub fn found(
        value: serde_json::Value,
        strategy: StrategyKind,
        confidence: f32,
        trace: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            value: Some(value),
            strategy,
            confidence: confidence.clamp(0.0, strategy.ceiling()),
            trace: trace.into(),
            location: Some(location.into()),
        }
    }

    /// Whether a value was located.
    pub fn is_found(&self) -> bool {
        self.value.is_some()
    }
}

/// Compliance record for one (document, setting) pair.
///
/// Persistence belongs to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ComplianceCheck {
    /// Document ID
    pub document_id: String,
    /// Setting ID
    pub setting_id: String,
    /// Actual value rendered as text
    pub actual_value: Option<String>,
    /// Expected value as authored
    pub expected_value: String,
    /// Compliance verdict
    pub is_compliant: bool,
    /// Explanation when the verdict is not a plain comparison result
    pub issue: Option<String>,
    /// When the check ran
    pub last_checked: DateTime<Utc>,
}

impl ComplianceCheck {
    /// Assemble a check from an extraction and its verdict.
    pub fn from_evaluation(
        document: &PolicyDocument,
        setting: &SettingDefinition,
        actual: Option<&serde_json::Value>,
        verdict: &ValidationVerdict,
    ) -> Self {
        Self {
            document_id: document.id.clone(),
            setting_id: setting.id.clone(),
            actual_value: actual.and_then(render_value),
            expected_value: setting.expected_value.clone(),
            is_compliant: verdict.is_valid,
            issue: verdict.issue.as_ref().map(|i| i.to_string()),
            last_checked: Utc::now(),
        }
    }
}

/// Render a JSON value the way compliance records store it.
pub fn render_value(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Per-setting extraction counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStatistics {
    /// Setting ID
    pub setting_id: String,
    /// Evaluations where a value was located
    pub successful_attempts: u64,
    /// Evaluations where every strategy missed
    pub failed_attempts: u64,
    /// Most recent winning strategy
    pub last_strategy: Option<StrategyKind>,
    /// Most recent success
    pub last_success_at: Option<DateTime<Utc>>,
    /// Most recent failure
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Recent outcomes, newest last
    pub hints: serde_json::Value,
}

impl ExtractionStatistics {
    /// Fraction of attempts that located a value.
    pub fn success_rate(&self) -> f32 {
        let total = self.successful_attempts + self.failed_attempts;
        if total == 0 {
            0.0
        } else {
            self.successful_attempts as f32 / total as f32
        }
    }
}
