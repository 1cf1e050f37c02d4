//! Settings-catalog document support.
//!
//! Settings-catalog documents keep their configuration as an array of setting
//! instances, each possibly carrying nested child instances. This module
//! recognises that shape, flattens the tree and matches catalog settings
//! against the flattened nodes.
//!
//! ```text
//! document ──detect──► CatalogTree { shape, nodes } ──match──► FlatSetting
//!                          ▲
//!                          └── flatten (depth-first, parent before children)
//! ```

pub mod flatten;
pub mod matcher;
pub mod symbols;

pub use flatten::{flatten, FlatSetting, SettingKind, SettingNodeValue};
pub use matcher::{
    extract_terms, fold_separators, match_containment, match_setting, match_terms, MatchTier,
    MatchTuning, SettingMatch,
};
pub use symbols::is_symbolic_reference;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::SettingDefinition;

/// Layout the instance array was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogShape {
    /// `settings[].settingInstance`
    Modern,
    /// Bare instances under `settings` or `settingInstances`
    Legacy,
}

impl CatalogShape {
    /// Confidence a direct tree match earns in this layout.
    pub fn confidence(&self) -> f32 {
        match self {
            Self::Modern => 0.80,
            Self::Legacy => 0.70,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modern => "modern",
            Self::Legacy => "legacy",
        }
    }
}

fn is_wrapped(entry: &Value) -> bool {
    entry.get("settingInstance").is_some_and(Value::is_object)
}

fn is_bare_instance(entry: &Value) -> bool {
    entry.get("settingDefinitionId").is_some_and(Value::is_string)
}

/// Classify an instance array, if it is one.
fn classify(entries: &[Value]) -> Option<CatalogShape> {
    if entries.iter().any(is_wrapped) {
        Some(CatalogShape::Modern)
    } else if entries.iter().any(is_bare_instance) {
        Some(CatalogShape::Legacy)
    } else {
        None
    }
}

/// Locate the instance array inside a document or accept a raw array.
pub fn detect(content: &Value) -> Option<(CatalogShape, &[Value])> {
    if let Value::Array(entries) = content {
        return classify(entries).map(|shape| (shape, entries.as_slice()));
    }

    for key in ["settings", "value"] {
        if let Some(entries) = content.get(key).and_then(Value::as_array) {
            if let Some(shape) = classify(entries) {
                return Some((shape, entries.as_slice()));
            }
        }
    }

    let entries = content.get("settingInstances").and_then(Value::as_array)?;
    classify(entries).map(|_| (CatalogShape::Legacy, entries.as_slice()))
}

/// A flattened settings-catalog document.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTree {
    pub shape: CatalogShape,
    pub nodes: Vec<FlatSetting>,
}

impl CatalogTree {
    /// Flatten the catalog portion of a document. `None` when the document
    /// has no recognisable instance array.
    pub fn from_document(content: &Value) -> Option<Self> {
        let (shape, entries) = detect(content)?;
        let nodes = flatten(entries);
        if nodes.is_empty() {
            return None;
        }
        Some(Self { shape, nodes })
    }

    /// Match a catalog setting against the tree.
    pub fn find<'a>(
        &'a self,
        setting: &SettingDefinition,
        tuning: &MatchTuning,
    ) -> Option<SettingMatch<'a>> {
        match_setting(setting, &self.nodes, tuning)
    }
}

/// Flatten a raw instance array (or whole document) and match one setting.
pub fn flatten_and_match(
    raw: &Value,
    setting: &SettingDefinition,
    tuning: &MatchTuning,
) -> Option<FlatSetting> {
    let tree = CatalogTree::from_document(raw)?;
    let found = tree.find(setting, tuning)?;
    tracing::debug!(
        setting_id = %setting.id,
        definition_id = %found.node.definition_id,
        tier = found.tier.as_str(),
        "Matched settings-catalog node"
    );
    Some(found.node.clone())
}
