//! Configuration for the extraction engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use settings_core::{MatchTuning, UnknownOperatorPolicy};

/// Configuration for an extraction engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Strategy cascade configuration
    pub cascade: CascadeConfig,
    /// Settings-catalog matching constants
    pub matching: MatchTuning,
    /// Symbolic value decoder configuration
    pub decoder: DecoderConfig,
    /// Batch evaluation configuration
    pub batch: BatchConfig,
    /// Learning loop configuration
    pub learning: LearningConfig,
    /// Validation configuration
    pub validation: ValidationConfig,
    /// General settings
    pub general: GeneralConfig,
}

impl EngineConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Strategy cascade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Documentation prefixes that never occur in real documents
    pub documentation_prefixes: Vec<String>,
    /// Levels below the root inspected by the shallow search
    pub shallow_search_depth: usize,
    /// Run the term-driven settings-catalog search
    pub deep_search: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            documentation_prefixes: vec![
                "deviceManagement.deviceConfigurations.".to_string(),
                "deviceManagement.".to_string(),
                "deviceConfiguration.".to_string(),
                "properties.".to_string(),
                "policy.".to_string(),
            ],
            shallow_search_depth: 2,
            deep_search: true,
        }
    }
}

/// Symbolic value decoder configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Decode symbolic values at all
    pub enabled: bool,
    /// Definition catalog base URL
    pub base_url: String,
    /// Bearer token for the catalog (usually supplied through the environment)
    pub bearer_token: Option<String>,
    /// Cache entry lifetime (seconds)
    pub cache_ttl_secs: u64,
    /// Per-lookup timeout (ms)
    pub timeout_ms: u64,
}

impl DecoderConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://graph.microsoft.com/beta".to_string(),
            bearer_token: None,
            cache_ttl_secs: 3600, // 1 hour
            timeout_ms: 2000,
        }
    }
}

/// Batch evaluation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum pairs evaluated concurrently
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 8 }
    }
}

/// Learning loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Documents sampled per document kind
    pub sample_size_per_kind: usize,
    /// Success rate for the high tier
    pub high_threshold: f32,
    /// Success rate for the medium tier
    pub medium_threshold: f32,
    /// Samples needed before an entry can rank above low
    pub min_samples: u64,
    /// Recent outcomes kept in each setting's hint blob
    pub recent_outcomes: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            sample_size_per_kind: 50,
            high_threshold: 0.8,
            medium_threshold: 0.5,
            min_samples: 3,
            recent_outcomes: 10,
        }
    }
}

/// Validation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Treatment of unrecognised operators
    pub unknown_operator: UnknownOperatorPolicy,
}

/// General configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.cascade.shallow_search_depth, 2);
        assert_eq!(config.matching.min_term_len, 3);
        assert_eq!(config.learning.high_threshold, 0.8);
        assert_eq!(config.validation.unknown_operator, UnknownOperatorPolicy::Reject);
        assert!(config.decoder.enabled);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = EngineConfig::default();
        config.batch.max_concurrency = 3;
        let yaml = config.to_yaml().unwrap();
        let parsed = EngineConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.batch.max_concurrency, 3);
        assert_eq!(parsed.cascade.documentation_prefixes, config.cascade.documentation_prefixes);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
matching:
  overlap_ratio: 0.75
validation:
  unknown_operator: equality_fallback
decoder:
  enabled: false
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.matching.overlap_ratio, 0.75);
        assert_eq!(config.matching.min_term_matches, 2);
        assert!(!config.matching.stop_words.is_empty());
        assert_eq!(config.validation.unknown_operator, UnknownOperatorPolicy::EqualityFallback);
        assert!(!config.decoder.enabled);
        assert_eq!(config.decoder.timeout(), Duration::from_millis(2000));
    }
}
