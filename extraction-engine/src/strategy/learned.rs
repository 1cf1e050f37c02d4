//! Locations promoted from a learned path table.

use settings_core::path::lookup_present;
use settings_core::{CatalogTree, PolicyDocument, SettingDefinition, StrategyKind};

use super::{ExtractionStrategy, Located};
use crate::learning::{path_key, ConfidenceTier, LearnedPathTable};

/// Looks up the location the learning loop confirmed for this setting and
/// document kind. Confidence scales with the entry's success rate.
pub struct LearnedPathStrategy {
    table: LearnedPathTable,
}

impl LearnedPathStrategy {
    /// Keep only the high-confidence entries of `table`.
    pub fn promote(table: &LearnedPathTable) -> Self {
        Self {
            table: table.at_least(ConfidenceTier::High),
        }
    }

    pub fn entries(&self) -> usize {
        self.table.len()
    }
}

impl ExtractionStrategy for LearnedPathStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LearnedPath
    }

    fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> Option<Located> {
        let entry = self.table.get(&document.kind, &path_key(setting))?;
        let confidence = self.kind().ceiling() * entry.success_rate;

        let value = match entry.strategy {
            StrategyKind::SettingsCatalog | StrategyKind::SettingsCatalogDeep => {
                let tree = CatalogTree::from_document(&document.content)?;
                tree.nodes
                    .iter()
                    .find(|n| n.definition_id.eq_ignore_ascii_case(&entry.location))?
                    .value
                    .to_json()
            }
            _ => lookup_present(&document.content, &entry.location)?.clone(),
        };

        Some(Located {
            value,
            confidence,
            trace: format!(
                "learned location '{}' ({:.0}% of {} samples)",
                entry.location,
                entry.success_rate * 100.0,
                entry.samples
            ),
            location: entry.location.clone(),
        })
    }
}
