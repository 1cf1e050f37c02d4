//! Path hint with documentation prefixes removed.

use settings_core::path::{lookup_present, strip_known_prefixes};
use settings_core::{PolicyDocument, SettingDefinition, StrategyKind};

use super::{ExtractionStrategy, Located};

/// Retries the exact lookup after removing prefixes that catalog authors copy
/// from API documentation but that never occur in exported documents.
pub struct PrefixStrippedStrategy {
    prefixes: Vec<String>,
}

impl PrefixStrippedStrategy {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }
}

impl ExtractionStrategy for PrefixStrippedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::PrefixStripped
    }

    fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> Option<Located> {
        let hint = setting.path_hint()?;
        let stripped = strip_known_prefixes(hint, &self.prefixes)?;
        let value = lookup_present(&document.content, &stripped)?;
        Some(Located {
            value: value.clone(),
            confidence: self.kind().ceiling(),
            trace: format!("path hint '{}' resolved as '{}'", hint, stripped),
            location: stripped,
        })
    }
}
