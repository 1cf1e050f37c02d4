//! Settings-catalog tree search.

use settings_core::{CatalogTree, MatchTuning, PolicyDocument, SettingDefinition, StrategyKind};

use super::{ExtractionStrategy, Located};

/// Flattens the document's setting-instance tree and matches the setting
/// against it. Ceiling 0.80 for the modern layout, 0.70 for the legacy one.
pub struct SettingsCatalogStrategy {
    tuning: MatchTuning,
}

impl SettingsCatalogStrategy {
    pub fn new(tuning: MatchTuning) -> Self {
        Self { tuning }
    }
}

impl ExtractionStrategy for SettingsCatalogStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SettingsCatalog
    }

    fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> Option<Located> {
        let tree = CatalogTree::from_document(&document.content)?;
        let found = tree.find(setting, &self.tuning)?;
        let node = found.node;

        Some(Located {
            value: node.value.to_json(),
            confidence: tree.shape.confidence(),
            trace: format!(
                "{} settings catalog: {} node '{}' at depth {} matched by {}",
                tree.shape.as_str(),
                node.kind().as_str(),
                node.definition_id,
                node.depth,
                found.tier.as_str()
            ),
            location: node.definition_id.clone(),
        })
    }
}
