//! Final path segment at the document root.

use settings_core::{PolicyDocument, SettingDefinition, StrategyKind};

use super::{target_key, ExtractionStrategy, Located};

/// Looks up only the last path segment, directly under the root.
pub struct DirectPropertyStrategy;

impl ExtractionStrategy for DirectPropertyStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DirectProperty
    }

    fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> Option<Located> {
        let key = target_key(setting)?;
        let value = document.content.get(key).filter(|v| !v.is_null())?;
        Some(Located {
            value: value.clone(),
            confidence: self.kind().ceiling(),
            trace: format!("property '{}' found at document root", key),
            location: key.to_string(),
        })
    }
}
