//! The extraction engine: locate, decode, validate, record.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use settings_core::catalog::{self, symbols::is_symbolic_reference};
use settings_core::{
    ComplianceCheck, ExtractionResult, FlatSetting, MatchTuning, PolicyDocument, SettingDefinition,
    StrategyKind, ValidationVerdict, Validator,
};
use symbol_resolver::{
    HttpSymbolResolver, OfflineSymbolResolver, SymbolDecoder, SymbolResolver,
};

use crate::config::EngineConfig;
use crate::learning::LearnedPathTable;
use crate::stats::{ExtractionOutcome, InMemoryStatisticsStore, StatisticsStore};
use crate::strategy::StrategyCascade;
use crate::types::{Decoding, Evaluation};

/// Evaluates (document, setting) pairs.
///
/// Holds no per-evaluation state; share it behind an `Arc` for batch work.
pub struct ExtractionEngine {
    cascade: StrategyCascade,
    decoder: Option<Arc<SymbolDecoder>>,
    validator: Validator,
    statistics: Arc<dyn StatisticsStore>,
    tuning: MatchTuning,
}

impl ExtractionEngine {
    /// Engine with the standard cascade, no decoder and an in-memory store.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cascade: StrategyCascade::standard(&config.cascade, &config.matching),
            decoder: None,
            validator: Validator::new(config.validation.unknown_operator),
            statistics: Arc::new(InMemoryStatisticsStore::with_recent_limit(
                config.learning.recent_outcomes,
            )),
            tuning: config.matching.clone(),
        }
    }

    /// Engine wired from configuration: HTTP decoder (or the offline one) when
    /// decoding is enabled.
    pub fn from_config(config: &EngineConfig, offline: bool) -> Self {
        let engine = Self::new(config);
        if !config.decoder.enabled {
            return engine;
        }

        let resolver: Arc<dyn SymbolResolver> = if offline {
            Arc::new(OfflineSymbolResolver::new())
        } else {
            Arc::new(HttpSymbolResolver::new(
                config.decoder.base_url.clone(),
                config.decoder.bearer_token.clone(),
            ))
        };
        let decoder = SymbolDecoder::new(resolver)
            .with_ttl(config.decoder.cache_ttl())
            .with_timeout(config.decoder.timeout());
        engine.with_decoder(Arc::new(decoder))
    }

    /// Use a symbolic value decoder.
    pub fn with_decoder(mut self, decoder: Arc<SymbolDecoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    /// Use a statistics store.
    pub fn with_statistics(mut self, statistics: Arc<dyn StatisticsStore>) -> Self {
        self.statistics = statistics;
        self
    }

    /// Replace the cascade.
    pub fn with_cascade(mut self, cascade: StrategyCascade) -> Self {
        self.cascade = cascade;
        self
    }

    /// Promote high-confidence learned locations into the cascade.
    pub fn promote(mut self, table: &LearnedPathTable) -> Self {
        self.cascade = self.cascade.promote(table);
        self
    }

    pub fn cascade(&self) -> &StrategyCascade {
        &self.cascade
    }

    pub fn statistics(&self) -> &Arc<dyn StatisticsStore> {
        &self.statistics
    }

    pub fn decoder(&self) -> Option<&Arc<SymbolDecoder>> {
        self.decoder.as_ref()
    }

    /// Run the strategy cascade.
    pub fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> ExtractionResult {
        self.cascade.locate(document, setting)
    }

    /// Validate a value against the setting's expectation.
    pub fn validate(&self, actual: Option<&Value>, setting: &SettingDefinition) -> ValidationVerdict {
        self.validator.validate(
            actual,
            &setting.expected_value,
            &setting.operator,
            setting.data_type,
        )
    }

    /// Flatten a raw instance array (or whole document) and match one setting.
    pub fn flatten_and_match(&self, raw: &Value, setting: &SettingDefinition) -> Option<FlatSetting> {
        catalog::flatten_and_match(raw, setting, &self.tuning)
    }

    /// Decode a located value when it is a symbolic reference.
    pub async fn decode(&self, result: &ExtractionResult) -> Decoding {
        let (Some(decoder), Some(Value::String(raw))) = (&self.decoder, &result.value) else {
            return Decoding::NotNeeded;
        };
        let Some(definition_id) = symbolic_definition(result, raw) else {
            return Decoding::NotNeeded;
        };

        match decoder.decode(&definition_id, raw).await {
            Some(symbol) => Decoding::Decoded { definition_id, symbol },
            None => {
                warn!(
                    definition_id = %definition_id,
                    value = %raw,
                    "Symbolic value left undecoded"
                );
                Decoding::Unresolved { definition_id }
            }
        }
    }

    /// Locate, decode, validate and record one pair.
    pub async fn evaluate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> Evaluation {
        let extraction = self.locate(document, setting);
        let decoding = self.decode(&extraction).await;

        let actual = match &decoding {
            Decoding::Decoded { symbol, .. } => Some(symbol.value.clone()),
            _ => extraction.value.clone(),
        };
        let verdict = self.validate(actual.as_ref(), setting);

        let outcome = ExtractionOutcome::from_result(&extraction, &document.kind);
        if let Err(e) = self.statistics.record(&setting.id, &outcome).await {
            warn!(setting_id = %setting.id, error = %e, "Failed to record extraction statistics");
        }

        debug!(
            document_id = %document.id,
            setting_id = %setting.id,
            strategy = %extraction.strategy,
            compliant = verdict.is_valid,
            "Evaluated setting"
        );

        let check = ComplianceCheck::from_evaluation(document, setting, actual.as_ref(), &verdict);
        Evaluation {
            extraction,
            decoding,
            actual,
            verdict,
            check,
        }
    }
}

/// Definition id a symbolic value refers to, if it is one.
///
/// Catalog strategies report the matched definition id as their location, so
/// only `<definition id>_<digits>` counts there. Path strategies only have the
/// value itself to go on.
fn symbolic_definition(result: &ExtractionResult, raw: &str) -> Option<String> {
    let location = result.location.as_deref();
    let known_definition = match result.strategy {
        StrategyKind::SettingsCatalog | StrategyKind::SettingsCatalogDeep => location,
        // Learned catalog entries carry a definition id, learned paths a dotted path.
        StrategyKind::LearnedPath => location.filter(|l| !l.contains(['.', '['])),
        _ => None,
    };

    if let Some(definition_id) = known_definition {
        return is_symbolic_reference(Some(definition_id), raw).then(|| definition_id.to_string());
    }
    if is_symbolic_reference(None, raw) {
        return raw.trim().rsplit_once('_').map(|(prefix, _)| prefix.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use settings_core::{DataType, ValidationIssue};
    use symbol_resolver::{CatalogDefinition, DefinitionOption, MockSymbolResolver};

    use crate::stats::StatsError;

    fn encryption_document() -> PolicyDocument {
        PolicyDocument::new(
            "p1",
            "settingsCatalog",
            json!({"settings":[{"settingInstance":{"settingDefinitionId":"vendor_x_encryption_enabled","simpleSettingValue":{"value":true}}}]}),
        )
    }

    #[tokio::test]
    async fn test_catalog_containment_scenario() {
        let engine = ExtractionEngine::new(&EngineConfig::default());
        let setting = SettingDefinition::new("enc", "Encryption enabled")
            .with_path_hint("encryption.enabled")
            .expecting("true", "==", DataType::Boolean);

        let evaluation = engine.evaluate(&encryption_document(), &setting).await;
        assert_eq!(evaluation.extraction.value, Some(json!(true)));
        assert_eq!(evaluation.extraction.strategy, StrategyKind::SettingsCatalog);
        assert!(evaluation.is_compliant());
        assert!(evaluation.check.is_compliant);
        assert_eq!(evaluation.check.actual_value.as_deref(), Some("true"));
        assert_eq!(evaluation.decoding, Decoding::NotNeeded);

        let stats = engine.statistics().get("enc").await.unwrap();
        assert_eq!(stats.successful_attempts, 1);
    }

    #[tokio::test]
    async fn test_decoded_boolean_against_string_expectation() {
        let resolver = MockSymbolResolver::new().with_definition(
            CatalogDefinition::new("vendor_bitlocker_require")
                .with_option(DefinitionOption::new("vendor_bitlocker_require_1").with_display_name("Enabled").with_value(json!(true))),
        );
        let engine = ExtractionEngine::new(&EngineConfig::default())
            .with_decoder(Arc::new(SymbolDecoder::new(Arc::new(resolver))));
        let document = PolicyDocument::new("p2", "settingsCatalog", json!({
            "settings": [ { "settingInstance": { "settingDefinitionId": "vendor_bitlocker_require", "choiceSettingValue": { "value": "vendor_bitlocker_require_1", "children": [] } } } ]
        }));
        let setting = SettingDefinition::new("bl", "Require device encryption")
            .with_name_hint("vendor_bitlocker_require")
            .expecting("Enabled", "==", DataType::String);

        let evaluation = engine.evaluate(&document, &setting).await;
        assert!(matches!(evaluation.decoding, Decoding::Decoded { .. }));
        assert_eq!(evaluation.actual, Some(json!(true)));
        assert!(!evaluation.is_compliant());
        assert!(matches!(evaluation.verdict.issue, Some(ValidationIssue::TypeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_unavailable_decoder_keeps_raw_value() {
        let resolver = MockSymbolResolver::new().with_available(false);
        let engine = ExtractionEngine::new(&EngineConfig::default())
            .with_decoder(Arc::new(SymbolDecoder::new(Arc::new(resolver))));
        let document = PolicyDocument::new("p3", "settingsCatalog", json!({
            "settings": [ { "settingInstance": { "settingDefinitionId": "vendor_fw_enable", "choiceSettingValue": { "value": "vendor_fw_enable_1" } } } ]
        }));
        let setting = SettingDefinition::new("fw", "Firewall")
            .with_name_hint("vendor_fw_enable")
            .expecting("vendor_fw_enable_1", "==", DataType::String);

        let evaluation = engine.evaluate(&document, &setting).await;
        assert!(evaluation.decoding.is_unresolved());
        assert_eq!(evaluation.actual, Some(json!("vendor_fw_enable_1")));
        assert!(evaluation.is_compliant());
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl StatisticsStore for FailingStore {
        async fn record(&self, _: &str, _: &ExtractionOutcome) -> Result<(), StatsError> {
            Err(StatsError::Unavailable("down".to_string()))
        }

        async fn get(&self, _: &str) -> Option<settings_core::ExtractionStatistics> {
            None
        }

        async fn snapshot(&self) -> Vec<settings_core::ExtractionStatistics> {
            vec![]
        }
    }

    #[tokio::test]
    async fn test_statistics_failure_does_not_block_verdict() {
        let engine = ExtractionEngine::new(&EngineConfig::default()).with_statistics(Arc::new(FailingStore));
        let setting = SettingDefinition::new("enc", "Encryption")
            .with_path_hint("encryption.enabled")
            .expecting("true", "==", DataType::Boolean);

        let evaluation = engine.evaluate(&encryption_document(), &setting).await;
        assert!(evaluation.is_compliant());
    }

    #[tokio::test]
    async fn test_missing_value_is_never_compliant() {
        let engine = ExtractionEngine::new(&EngineConfig::default());
        let document = PolicyDocument::new("p4", "compliancePolicy", json!({ "other": 1 }));
        let required = SettingDefinition::new("x", "Nothing").with_path_hint("a.b").expecting("1", "==", DataType::Integer);
        let absent = SettingDefinition::new("y", "Nothing").with_path_hint("a.b").expecting("", "not_exists", DataType::String);

        let evaluation = engine.evaluate(&document, &required).await;
        assert_eq!(evaluation.extraction.strategy, StrategyKind::None);
        assert!(!evaluation.is_compliant());
        assert_eq!(evaluation.check.actual_value, None);

        assert!(engine.evaluate(&document, &absent).await.is_compliant());
        assert_eq!(engine.statistics().get("x").await.unwrap().failed_attempts, 1);
    }

    #[test]
    fn test_symbolic_definition() {
        let catalog = ExtractionResult::found(json!("vendor_a_1"), StrategyKind::SettingsCatalog, 0.8, "t", "vendor_a");
        assert_eq!(symbolic_definition(&catalog, "vendor_a_1").as_deref(), Some("vendor_a"));

        let path = ExtractionResult::found(json!("vendor_b_setting_0"), StrategyKind::ExactPath, 0.95, "t", "x.y");
        assert_eq!(symbolic_definition(&path, "vendor_b_setting_0").as_deref(), Some("vendor_b_setting"));

        assert_eq!(symbolic_definition(&path, "Enabled"), None);

        let literal = ExtractionResult::found(json!("level_1"), StrategyKind::SettingsCatalog, 0.8, "t", "vendor_smartscreen_level");
        assert_eq!(symbolic_definition(&literal, "level_1"), None);

        let learned = ExtractionResult::found(json!("level_1"), StrategyKind::LearnedPath, 0.9, "t", "vendor_smartscreen_level");
        assert_eq!(symbolic_definition(&learned, "level_1"), None);
        let learned = ExtractionResult::found(json!("vendor_b_setting_0"), StrategyKind::LearnedPath, 0.9, "t", "rules.x");
        assert_eq!(symbolic_definition(&learned, "vendor_b_setting_0").as_deref(), Some("vendor_b_setting"));
    }

    #[tokio::test]
    async fn test_literal_catalog_value_is_not_decoded() {
        let engine = ExtractionEngine::new(&EngineConfig::default())
            .with_decoder(Arc::new(SymbolDecoder::new(Arc::new(OfflineSymbolResolver::new()))));
        let document = PolicyDocument::new("p5", "settingsCatalog", json!({
            "settings": [ { "settingInstance": { "settingDefinitionId": "vendor_smartscreen_level", "simpleSettingValue": { "value": "level_1" } } } ]
        }));
        let setting = SettingDefinition::new("ss", "SmartScreen level")
            .with_name_hint("vendor_smartscreen_level")
            .expecting("level_1", "==", DataType::String);

        let evaluation = engine.evaluate(&document, &setting).await;
        assert_eq!(evaluation.extraction.strategy, StrategyKind::SettingsCatalog);
        assert_eq!(evaluation.decoding, Decoding::NotNeeded);
        assert_eq!(evaluation.actual, Some(json!("level_1")));
        assert!(evaluation.is_compliant());
    }

    #[test]
    fn test_flatten_and_match() {
        let engine = ExtractionEngine::new(&EngineConfig::default());
        let setting = SettingDefinition::new("enc", "Encryption").with_path_hint("encryption.enabled");
        let node = engine.flatten_and_match(&encryption_document().content, &setting).unwrap();
        assert_eq!(node.definition_id, "vendor_x_encryption_enabled");
    }
}
