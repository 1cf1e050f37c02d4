//! Final path segment under alternative casings.

use settings_core::path::case_variants;
use settings_core::{PolicyDocument, SettingDefinition, StrategyKind};

use super::{target_key, ExtractionStrategy, Located};

/// Retries the final segment as camelCase, PascalCase and lowercase.
pub struct CaseVariantStrategy;

impl ExtractionStrategy for CaseVariantStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CaseVariant
    }

    fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> Option<Located> {
        let key = target_key(setting)?;
        case_variants(key).into_iter().find_map(|variant| {
            let value = document.content.get(&variant).filter(|v| !v.is_null())?;
            Some(Located {
                value: value.clone(),
                confidence: self.kind().ceiling(),
                trace: format!("property '{}' found at document root as '{}'", key, variant),
                location: variant,
            })
        })
    }
}
