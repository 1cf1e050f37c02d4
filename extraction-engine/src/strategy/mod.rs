//! Extraction strategies and the cascade that runs them.
//!
//! Each strategy is a small pure function over the document tree. The cascade
//! tries them in priority order and the first non-null value wins:
//!
//! | # | Strategy | Ceiling |
//! |---|----------|---------|
//! | 1 | exact path hint | 0.95 |
//! | - | learned path (only when promoted) | 0.90 |
//! | 2 | prefix-stripped path hint | 0.85 |
//! | 3 | final segment at the root | 0.75 |
//! | 4 | final segment case variants | 0.60 |
//! | 5 | bounded shallow search | 0.40 |
//! | 6 | settings-catalog tree | 0.80 / 0.70 |
//! | 7 | settings-catalog term search | 0.55 / 0.50 |

pub mod case;
pub mod catalog;
pub mod deep;
pub mod direct;
pub mod exact;
pub mod learned;
pub mod prefix;
pub mod shallow;

pub use case::CaseVariantStrategy;
pub use catalog::SettingsCatalogStrategy;
pub use deep::SettingsCatalogDeepStrategy;
pub use direct::DirectPropertyStrategy;
pub use exact::ExactPathStrategy;
pub use learned::LearnedPathStrategy;
pub use prefix::PrefixStrippedStrategy;
pub use shallow::ShallowSearchStrategy;

use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

use settings_core::path::final_segment;
use settings_core::{ExtractionResult, MatchTuning, PolicyDocument, SettingDefinition, StrategyKind};

use crate::config::CascadeConfig;
use crate::learning::LearnedPathTable;

/// A value found by one strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub value: Value,
    pub confidence: f32,
    pub trace: String,
    /// Document path or definition id
    pub location: String,
}

/// One lookup strategy.
pub trait ExtractionStrategy: Send + Sync {
    /// Strategy kind, which fixes the confidence ceiling.
    fn kind(&self) -> StrategyKind;

    /// Look for the setting's value. `None` when this strategy cannot find it.
    fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> Option<Located>;
}

/// Key used by the single-key strategies: the last path-hint segment, or the
/// name hint when there is no path hint.
pub(crate) fn target_key(setting: &SettingDefinition) -> Option<&str> {
    setting
        .path_hint()
        .and_then(final_segment)
        .or_else(|| setting.name_hint())
}

/// Ordered list of strategies with early exit.
pub struct StrategyCascade {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl StrategyCascade {
    /// Empty cascade.
    pub fn new() -> Self {
        Self { strategies: Vec::new() }
    }

    /// The standard seven-strategy cascade.
    pub fn standard(config: &CascadeConfig, tuning: &MatchTuning) -> Self {
        let mut cascade = Self::new()
            .with_strategy(ExactPathStrategy)
            .with_strategy(PrefixStrippedStrategy::new(config.documentation_prefixes.clone()))
            .with_strategy(DirectPropertyStrategy)
            .with_strategy(CaseVariantStrategy)
            .with_strategy(ShallowSearchStrategy::new(config.shallow_search_depth))
            .with_strategy(SettingsCatalogStrategy::new(tuning.clone()));
        if config.deep_search {
            cascade = cascade.with_strategy(SettingsCatalogDeepStrategy::new(tuning.clone()));
        }
        cascade
    }

    /// Append a strategy.
    pub fn with_strategy(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Insert a learned-path strategy right after the exact path lookup.
    ///
    /// Only high-confidence entries are promoted.
    pub fn promote(mut self, table: &LearnedPathTable) -> Self {
        let position = self
            .strategies
            .iter()
            .position(|s| s.kind() == StrategyKind::ExactPath)
            .map_or(0, |i| i + 1);
        self.strategies
            .insert(position, Box::new(LearnedPathStrategy::promote(table)));
        self
    }

    /// Strategy kinds in execution order.
    pub fn kinds(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Run strategies in order until one returns a non-null value.
    pub fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> ExtractionResult {
        for strategy in &self.strategies {
            let kind = strategy.kind();
            let outcome = catch_unwind(AssertUnwindSafe(|| strategy.locate(document, setting)));

            match outcome {
                Ok(Some(found)) if !found.value.is_null() => {
                    debug!(
                        setting_id = %setting.id,
                        document_id = %document.id,
                        strategy = %kind,
                        location = %found.location,
                        "Strategy located value"
                    );
                    return ExtractionResult::found(
                        found.value,
                        kind,
                        found.confidence,
                        found.trace,
                        found.location,
                    );
                }
                Ok(_) => {
                    debug!(setting_id = %setting.id, strategy = %kind, "Strategy missed");
                }
                Err(_) => {
                    warn!(
                        setting_id = %setting.id,
                        document_id = %document.id,
                        strategy = %kind,
                        "Strategy panicked, treating as no match"
                    );
                }
            }
        }
        ExtractionResult::none()
    }
}

impl Default for StrategyCascade {
    fn default() -> Self {
        Self::standard(&CascadeConfig::default(), &MatchTuning::default())
    }
}
