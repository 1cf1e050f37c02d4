//! Bounded breadth-first key search.

use settings_core::path::shallow_find;
use settings_core::{PolicyDocument, SettingDefinition, StrategyKind};

use super::{target_key, ExtractionStrategy, Located};

/// Case-insensitive search for the final segment near the top of the tree.
pub struct ShallowSearchStrategy {
    max_depth: usize,
}

impl ShallowSearchStrategy {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl ExtractionStrategy for ShallowSearchStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ShallowSearch
    }

    fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> Option<Located> {
        let key = target_key(setting)?;
        let hit = shallow_find(&document.content, key, self.max_depth)?;
        Some(Located {
            value: hit.value.clone(),
            confidence: self.kind().ceiling(),
            trace: format!("key '{}' found by shallow search at '{}'", key, hit.path),
            location: hit.path,
        })
    }
}
