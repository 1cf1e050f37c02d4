//! Offline path learning.
//!
//! Re-runs the cascade over a sample of documents per document kind, ranks
//! each setting's confirmed locations by success rate and emits a
//! [`LearnedPathTable`] plus [`HintProposal`]s for catalog maintainers. Nothing
//! here changes a [`SettingDefinition`]; the table only affects live lookups
//! once it is explicitly promoted into a cascade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use settings_core::catalog::fold_separators;
use settings_core::{PolicyDocument, SettingDefinition, StrategyKind};

use crate::config::LearningConfig;
use crate::strategy::StrategyCascade;

/// Trust bucket for a learned entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    /// Bucket a success rate. Entries with too few samples never rank above low.
    pub fn classify(success_rate: f32, samples: u64, config: &LearningConfig) -> Self {
        if samples < config.min_samples {
            Self::Low
        } else if success_rate >= config.high_threshold {
            Self::High
        } else if success_rate >= config.medium_threshold {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Normalized key a setting is filed under.
pub fn path_key(setting: &SettingDefinition) -> String {
    let source = setting
        .path_hint()
        .or_else(|| setting.name_hint())
        .unwrap_or(&setting.display_name);
    fold_separators(source)
}

/// A confirmed location for one setting within one document kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPathEntry {
    pub document_kind: String,
    pub path_key: String,
    pub setting_id: String,
    /// Most frequently confirmed location (document path or definition id)
    pub location: String,
    /// Strategy that confirmed the location
    pub strategy: StrategyKind,
    /// Samples where the location was confirmed
    pub confirmations: u64,
    /// Samples where any location was found
    pub successes: u64,
    /// Samples evaluated
    pub samples: u64,
    pub success_rate: f32,
    pub tier: ConfidenceTier,
}

/// Derived lookup table from normalized path keys to confirmed locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPathTable {
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<LearnedPathEntry>,
}

impl LearnedPathTable {
    pub fn new(entries: Vec<LearnedPathEntry>) -> Self {
        Self {
            generated_at: Utc::now(),
            entries,
        }
    }

    /// Best entry for a document kind and path key.
    pub fn get(&self, document_kind: &str, path_key: &str) -> Option<&LearnedPathEntry> {
        self.entries
            .iter()
            .filter(|e| e.document_kind.eq_ignore_ascii_case(document_kind) && e.path_key == path_key)
            .max_by(|a, b| a.success_rate.total_cmp(&b.success_rate))
    }

    /// Copy keeping only entries at or above `tier`.
    pub fn at_least(&self, tier: ConfidenceTier) -> Self {
        Self {
            generated_at: self.generated_at,
            entries: self.entries.iter().filter(|e| e.tier >= tier).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which hint field a proposal targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintField {
    PathHint,
    NameHint,
}

/// Suggested catalog hint update, for review by a maintainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HintProposal {
    pub setting_id: String,
    pub document_kind: String,
    pub field: HintField,
    pub current: Option<String>,
    pub proposed: String,
    pub success_rate: f32,
    pub samples: u64,
}

/// Output of one learning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningReport {
    pub table: LearnedPathTable,
    pub proposals: Vec<HintProposal>,
    pub documents_sampled: usize,
    pub pairs_evaluated: usize,
}

#[derive(Debug, Default)]
struct Tally {
    samples: u64,
    successes: u64,
    locations: BTreeMap<String, (u64, Option<StrategyKind>)>,
}

/// Batch learner over historical documents.
pub struct PathLearner {
    config: LearningConfig,
}

impl PathLearner {
    pub fn new(config: LearningConfig) -> Self {
        Self { config }
    }

    /// Run the cascade over a per-kind sample and aggregate the outcomes.
    pub fn learn(
        &self,
        cascade: &StrategyCascade,
        documents: &[PolicyDocument],
        settings: &[SettingDefinition],
    ) -> LearningReport {
        let mut by_kind: BTreeMap<String, Vec<&PolicyDocument>> = BTreeMap::new();
        for document in documents {
            let sample = by_kind.entry(document.kind.to_lowercase()).or_default();
            if sample.len() < self.config.sample_size_per_kind {
                sample.push(document);
            }
        }

        let mut tallies: BTreeMap<(String, String), Tally> = BTreeMap::new();
        let mut kind_names: HashMap<String, String> = HashMap::new();
        let mut pairs_evaluated = 0;

        for (kind, sample) in &by_kind {
            for document in sample {
                kind_names.entry(kind.clone()).or_insert_with(|| document.kind.clone());
                for setting in settings.iter().filter(|s| s.applies_to(document)) {
                    pairs_evaluated += 1;
                    let result = cascade.locate(document, setting);
                    let tally = tallies.entry((kind.clone(), setting.id.clone())).or_default();
                    tally.samples += 1;
                    if let (true, Some(location)) = (result.is_found(), result.location) {
                        tally.successes += 1;
                        let slot = tally.locations.entry(location).or_insert((0, None));
                        slot.0 += 1;
                        slot.1 = Some(result.strategy);
                    }
                }
            }
        }

        let settings_by_id: HashMap<&str, &SettingDefinition> =
            settings.iter().map(|s| (s.id.as_str(), s)).collect();

        let mut entries = Vec::new();
        for ((kind, setting_id), tally) in tallies {
            // Highest count wins; BTreeMap order breaks ties by location.
            let best = tally
                .locations
                .iter()
                .fold(None::<(&String, u64, Option<StrategyKind>)>, |best, (loc, (count, strategy))| {
                    match best {
                        Some((_, c, _)) if c >= *count => best,
                        _ => Some((loc, *count, *strategy)),
                    }
                });
            let (Some((location, confirmations, Some(strategy))), Some(setting)) =
                (best, settings_by_id.get(setting_id.as_str()))
            else {
                debug!(setting_id = %setting_id, document_kind = %kind, "No confirmed location");
                continue;
            };

            let success_rate = confirmations as f32 / tally.samples as f32;
            entries.push(LearnedPathEntry {
                document_kind: kind_names.get(&kind).cloned().unwrap_or(kind),
                path_key: path_key(setting),
                setting_id,
                location: location.clone(),
                strategy,
                confirmations,
                successes: tally.successes,
                samples: tally.samples,
                success_rate,
                tier: ConfidenceTier::classify(success_rate, tally.samples, &self.config),
            });
        }

        let proposals = entries
            .iter()
            .filter(|e| e.tier == ConfidenceTier::High)
            .filter_map(|e| propose(e, settings_by_id.get(e.setting_id.as_str())?))
            .collect::<Vec<_>>();

        let table = LearnedPathTable::new(entries);
        info!(
            kinds = by_kind.len(),
            pairs = pairs_evaluated,
            entries = table.len(),
            proposals = proposals.len(),
            "Learned path table emitted"
        );

        LearningReport {
            table,
            proposals,
            documents_sampled: by_kind.values().map(Vec::len).sum(),
            pairs_evaluated,
        }
    }
}

/// Propose a hint when the confirmed location differs from the current one.
fn propose(entry: &LearnedPathEntry, setting: &SettingDefinition) -> Option<HintProposal> {
    let (field, current) = match entry.strategy {
        StrategyKind::SettingsCatalog | StrategyKind::SettingsCatalogDeep => {
            (HintField::NameHint, setting.name_hint())
        }
        _ => (HintField::PathHint, setting.path_hint()),
    };
    if current.is_some_and(|c| c.eq_ignore_ascii_case(&entry.location)) {
        return None;
    }
    Some(HintProposal {
        setting_id: entry.setting_id.clone(),
        document_kind: entry.document_kind.clone(),
        field,
        current: current.map(str::to_string),
        proposed: entry.location.clone(),
        success_rate: entry.success_rate,
        samples: entry.samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog_doc(id: &str, enabled: bool) -> PolicyDocument {
        PolicyDocument::new(id, "settingsCatalog", json!({
            "settings": [ { "settingInstance": { "settingDefinitionId": "vendor_x_encryption_enabled", "simpleSettingValue": { "value": enabled } } } ]
        }))
    }

    #[test]
    fn test_tier_classification() {
        let config = LearningConfig::default();
        assert_eq!(ConfidenceTier::classify(0.8, 10, &config), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::classify(0.79, 10, &config), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::classify(0.5, 10, &config), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::classify(0.49, 10, &config), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::classify(1.0, 2, &config), ConfidenceTier::Low);
    }

    #[test]
    fn test_learning_builds_table_and_proposals() {
        let documents = vec![
            catalog_doc("a", true),
            catalog_doc("b", false),
            catalog_doc("c", true),
            PolicyDocument::new("d", "compliancePolicy", json!({ "passwordRequired": true })),
        ];
        let settings = vec![
            SettingDefinition::new("enc", "Encryption").with_path_hint("encryption.enabled"),
            SettingDefinition::new("pwd", "Password required")
                .with_path_hint("passwordRequired")
                .scoped_to_kinds(["compliancePolicy"]),
        ];

        let report = PathLearner::new(LearningConfig::default()).learn(
            &StrategyCascade::default(),
            &documents,
            &settings,
        );

        assert_eq!(report.documents_sampled, 4);
        // enc x 4 documents + pwd x 1 document
        assert_eq!(report.pairs_evaluated, 5);

        let entry = report.table.get("settingsCatalog", "encryption_enabled").unwrap();
        assert_eq!(entry.location, "vendor_x_encryption_enabled");
        assert_eq!(entry.strategy, StrategyKind::SettingsCatalog);
        assert_eq!(entry.samples, 3);
        assert_eq!(entry.tier, ConfidenceTier::High);

        // Single sample: found but not trusted
        let pwd = report.table.get("compliancePolicy", "passwordrequired").unwrap();
        assert_eq!(pwd.tier, ConfidenceTier::Low);

        assert_eq!(report.proposals.len(), 1);
        let proposal = &report.proposals[0];
        assert_eq!(proposal.setting_id, "enc");
        assert_eq!(proposal.field, HintField::NameHint);
        assert_eq!(proposal.current, None);
        assert_eq!(proposal.proposed, "vendor_x_encryption_enabled");
    }

    #[test]
    fn test_sample_size_is_bounded() {
        let documents: Vec<PolicyDocument> = (0..10).map(|i| catalog_doc(&i.to_string(), true)).collect();
        let settings = vec![SettingDefinition::new("enc", "Encryption").with_path_hint("encryption.enabled")];
        let config = LearningConfig {
            sample_size_per_kind: 4,
            ..Default::default()
        };

        let report = PathLearner::new(config).learn(&StrategyCascade::default(), &documents, &settings);
        assert_eq!(report.documents_sampled, 4);
        assert_eq!(report.table.entries[0].samples, 4);
    }

    #[test]
    fn test_at_least_filters_tiers() {
        let entry = |tier| LearnedPathEntry {
            document_kind: "k".to_string(),
            path_key: "p".to_string(),
            setting_id: "s".to_string(),
            location: "l".to_string(),
            strategy: StrategyKind::ExactPath,
            confirmations: 1,
            successes: 1,
            samples: 1,
            success_rate: 1.0,
            tier,
        };
        let table = LearnedPathTable::new(vec![entry(ConfidenceTier::High), entry(ConfidenceTier::Low)]);
        assert_eq!(table.at_least(ConfidenceTier::High).len(), 1);
        assert_eq!(table.at_least(ConfidenceTier::Low).len(), 2);
    }
}
