//! Path hint used verbatim.

use settings_core::path::lookup_present;
use settings_core::{PolicyDocument, SettingDefinition, StrategyKind};

use super::{ExtractionStrategy, Located};

/// Literal nested-field traversal of the path hint.
pub struct ExactPathStrategy;

impl ExtractionStrategy for ExactPathStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ExactPath
    }

    fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> Option<Located> {
        let hint = setting.path_hint()?;
        let value = lookup_present(&document.content, hint)?;
        Some(Located {
            value: value.clone(),
            confidence: self.kind().ceiling(),
            trace: format!("path hint '{}' resolved verbatim", hint),
            location: hint.to_string(),
        })
    }
}
