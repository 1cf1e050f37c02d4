//! Settings-catalog search driven by individual terms.
//!
//! When the setting's own hints match nothing, each term derived from the
//! display name (then from the name hint) is tried as a hint on its own. A
//! term only nominates a node; the full term set must still reach the overlap
//! threshold against it.

use tracing::debug;

use settings_core::catalog::{extract_terms, match_setting};
use settings_core::{CatalogTree, FlatSetting, MatchTuning, PolicyDocument, SettingDefinition, StrategyKind};

use super::{ExtractionStrategy, Located};

/// Confidence for a match found through a display-name term.
const DISPLAY_NAME_TERM_CONFIDENCE: f32 = 0.55;

/// Confidence for a match found through a name-hint term.
const NAME_HINT_TERM_CONFIDENCE: f32 = 0.50;

pub struct SettingsCatalogDeepStrategy {
    tuning: MatchTuning,
}

impl SettingsCatalogDeepStrategy {
    pub fn new(tuning: MatchTuning) -> Self {
        Self { tuning }
    }

    /// Candidate terms with the confidence each earns, display-name terms first.
    fn candidate_terms(&self, setting: &SettingDefinition) -> Vec<(String, f32)> {
        let mut terms: Vec<(String, f32)> = extract_terms(&setting.display_name, &self.tuning)
            .into_iter()
            .map(|t| (t, DISPLAY_NAME_TERM_CONFIDENCE))
            .collect();

        if let Some(hint) = setting.name_hint() {
            for term in extract_terms(hint, &self.tuning) {
                if !terms.iter().any(|(t, _)| *t == term) {
                    terms.push((term, NAME_HINT_TERM_CONFIDENCE));
                }
            }
        }
        terms
    }
}

impl ExtractionStrategy for SettingsCatalogDeepStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SettingsCatalogDeep
    }

    fn locate(&self, document: &PolicyDocument, setting: &SettingDefinition) -> Option<Located> {
        let tree = CatalogTree::from_document(&document.content)?;
        let terms = self.candidate_terms(setting);
        if terms.is_empty() {
            return None;
        }
        let required = self.tuning.required_matches(terms.len());

        terms.iter().find_map(|(term, confidence)| {
            let probe = SettingDefinition::new(setting.id.clone(), "").with_name_hint(term.clone());
            let found = match_setting(&probe, &tree.nodes, &self.tuning)?;
            let node = found.node;
            let covered = covered_terms(node, &terms);
            if covered < required {
                debug!(
                    setting_id = %setting.id,
                    term = %term,
                    definition_id = %node.definition_id,
                    covered,
                    required,
                    "Term candidate below overlap threshold"
                );
                return None;
            }

            Some(Located {
                value: node.value.to_json(),
                confidence: *confidence,
                trace: format!(
                    "{} settings catalog: term '{}' matched {} node '{}' by {} ({}/{} terms)",
                    tree.shape.as_str(),
                    term,
                    node.kind().as_str(),
                    node.definition_id,
                    found.tier.as_str(),
                    covered,
                    terms.len()
                ),
                location: node.definition_id.clone(),
            })
        })
    }
}

/// Number of terms found in the node's identifier or label.
fn covered_terms(node: &FlatSetting, terms: &[(String, f32)]) -> usize {
    let mut haystack = node.definition_id.to_lowercase();
    if let Some(label) = &node.label {
        haystack.push(' ');
        haystack.push_str(&label.to_lowercase());
    }
    terms
        .iter()
        .filter(|(term, _)| haystack.contains(term.as_str()))
        .count()
}
