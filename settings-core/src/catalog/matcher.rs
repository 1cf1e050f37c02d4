//! Matching catalog settings against flattened setting nodes.
//!
//! Tiers are tried in order and the first tier with a candidate wins:
//!
//! 1. Path hint equals a definition identifier (lowercase, punctuation kept)
//! 2. Name hint equals a definition identifier
//! 3. Hint and identifier contain one another (separator-folded)
//! 4. Term overlap against identifier and label, above a threshold

use serde::{Deserialize, Serialize};

use super::flatten::FlatSetting;
use crate::types::SettingDefinition;

/// Tunable constants for term extraction and overlap matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchTuning {
    /// Terms must be longer than this many characters
    pub min_term_len: usize,
    /// Fraction of terms that must match
    pub overlap_ratio: f32,
    /// Absolute number of terms that must match
    pub min_term_matches: usize,
    /// Shortest string allowed on the contained side of a containment match
    pub min_containment_len: usize,
    /// Words never used as terms
    pub stop_words: Vec<String>,
}

impl Default for MatchTuning {
    fn default() -> Self {
        Self {
            min_term_len: 3,
            overlap_ratio: 0.6,
            min_term_matches: 2,
            min_containment_len: 4,
            stop_words: [
                "the", "and", "for", "with", "from", "that", "this", "when", "into", "should",
                "must", "policy", "setting", "settings", "configure", "configuration",
            ]
            .iter()
            .map(|w| w.to_string())
            .collect(),
        }
    }
}

impl MatchTuning {
    /// Number of matching terms required out of `term_count`.
    pub fn required_matches(&self, term_count: usize) -> usize {
        // Round away float noise first so 0.6 * 5 is 3, not 4.
        let exact = (self.overlap_ratio * term_count as f32 * 1000.0).round() / 1000.0;
        let proportional = exact.ceil() as usize;
        proportional.max(self.min_term_matches)
    }
}

/// Tier that produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    ExactPath,
    ExactName,
    Containment,
    TermOverlap,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExactPath => "exact-path-hint",
            Self::ExactName => "exact-name-hint",
            Self::Containment => "containment",
            Self::TermOverlap => "term-overlap",
        }
    }
}

/// A node selected by the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingMatch<'a> {
    pub node: &'a FlatSetting,
    pub tier: MatchTier,
    /// Tier-specific strength (0.0 - 1.0)
    pub score: f32,
}

/// Lowercase with every non-alphanumeric run folded to `_`.
pub fn fold_separators(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_sep = false;
    for c in input.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_sep = false;
        } else if !last_sep {
            out.push('_');
            last_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

/// Distinct lowercase terms, in order of first appearance.
pub fn extract_terms(text: &str, tuning: &MatchTuning) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        let word = word.to_lowercase();
        if word.chars().count() <= tuning.min_term_len {
            continue;
        }
        if tuning.stop_words.iter().any(|s| s.eq_ignore_ascii_case(&word)) {
            continue;
        }
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Find the node for a setting, trying each tier in order.
pub fn match_setting<'a>(
    setting: &SettingDefinition,
    nodes: &'a [FlatSetting],
    tuning: &MatchTuning,
) -> Option<SettingMatch<'a>> {
    if let Some(hint) = setting.path_hint() {
        if let Some(node) = exact(hint, nodes) {
            return Some(SettingMatch { node, tier: MatchTier::ExactPath, score: 1.0 });
        }
    }

    if let Some(hint) = setting.name_hint() {
        if let Some(node) = exact(hint, nodes) {
            return Some(SettingMatch { node, tier: MatchTier::ExactName, score: 1.0 });
        }
    }

    let hints: Vec<&str> = [setting.path_hint(), setting.name_hint()]
        .into_iter()
        .flatten()
        .collect();
    for hint in hints {
        if let Some(found) = match_containment(hint, nodes, tuning) {
            return Some(found);
        }
    }

    let mut text = setting.display_name.clone();
    for hint in [setting.name_hint(), setting.path_hint()].into_iter().flatten() {
        text.push(' ');
        text.push_str(hint);
    }
    match_terms(&extract_terms(&text, tuning), nodes, tuning)
}

fn exact<'a>(hint: &str, nodes: &'a [FlatSetting]) -> Option<&'a FlatSetting> {
    let hint = hint.trim().to_lowercase();
    nodes
        .iter()
        .find(|node| node.definition_id.to_lowercase() == hint)
}

/// Containment in either direction; the closest length wins, ties go to the
/// earliest node.
pub fn match_containment<'a>(
    hint: &str,
    nodes: &'a [FlatSetting],
    tuning: &MatchTuning,
) -> Option<SettingMatch<'a>> {
    let hint = fold_separators(hint);
    if hint.is_empty() {
        return None;
    }

    let mut best: Option<(usize, f32, &FlatSetting)> = None;
    for node in nodes {
        let id = fold_separators(&node.definition_id);
        let contained = (hint.len() >= tuning.min_containment_len && id.contains(&hint))
            || (id.len() >= tuning.min_containment_len && hint.contains(&id));
        if !contained {
            continue;
        }

        let distance = id.len().abs_diff(hint.len());
        let score = id.len().min(hint.len()) as f32 / id.len().max(hint.len()) as f32;
        if best.map_or(true, |(d, _, _)| distance < d) {
            best = Some((distance, score, node));
        }
    }

    best.map(|(_, score, node)| SettingMatch { node, tier: MatchTier::Containment, score })
}

/// Term overlap against identifier and label.
///
/// Accepted only when the number of matching terms reaches
/// [`MatchTuning::required_matches`]. The node with most matching terms wins.
pub fn match_terms<'a>(
    terms: &[String],
    nodes: &'a [FlatSetting],
    tuning: &MatchTuning,
) -> Option<SettingMatch<'a>> {
    if terms.is_empty() {
        return None;
    }
    let required = tuning.required_matches(terms.len());

    let mut best: Option<(usize, &FlatSetting)> = None;
    for node in nodes {
        let mut haystack = node.definition_id.to_lowercase();
        if let Some(label) = &node.label {
            haystack.push(' ');
            haystack.push_str(&label.to_lowercase());
        }

        let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
        if hits >= required && best.map_or(true, |(h, _)| hits > h) {
            best = Some((hits, node));
        }
    }

    best.map(|(hits, node)| SettingMatch {
        node,
        tier: MatchTier::TermOverlap,
        score: hits as f32 / terms.len() as f32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::flatten::SettingNodeValue;
    use serde_json::json;

    fn node(id: &str, label: Option<&str>) -> FlatSetting {
        FlatSetting {
            definition_id: id.to_string(),
            value: SettingNodeValue::Simple(json!(true)),
            parent_id: None,
            depth: 0,
            label: label.map(str::to_string),
        }
    }

    #[test]
    fn test_extract_terms_drops_short_and_stop_words() {
        let tuning = MatchTuning::default();
        assert_eq!(
            extract_terms("Require PIN Length", &tuning),
            vec!["require".to_string(), "length".to_string()]
        );
        assert_eq!(
            extract_terms("Configure the policy for BitLocker BitLocker", &tuning),
            vec!["bitlocker".to_string()]
        );
    }

    #[test]
    fn test_required_matches() {
        let tuning = MatchTuning::default();
        assert_eq!(tuning.required_matches(1), 2);
        assert_eq!(tuning.required_matches(2), 2);
        assert_eq!(tuning.required_matches(5), 3);
        assert_eq!(tuning.required_matches(10), 6);
    }

    #[test]
    fn test_exact_tiers_ignore_case() {
        let nodes = vec![node("Vendor_Passcode_MinLength", None), node("vendor_passcode", None)];

        let by_path = SettingDefinition::new("s", "x").with_path_hint("vendor_passcode_minlength");
        let found = match_setting(&by_path, &nodes, &MatchTuning::default()).unwrap();
        assert_eq!(found.tier, MatchTier::ExactPath);
        assert_eq!(found.node.definition_id, "Vendor_Passcode_MinLength");

        let by_name = SettingDefinition::new("s", "x")
            .with_path_hint("nowhere.at.all")
            .with_name_hint("VENDOR_PASSCODE");
        let found = match_setting(&by_name, &nodes, &MatchTuning::default()).unwrap();
        assert_eq!(found.tier, MatchTier::ExactName);
        assert_eq!(found.node.definition_id, "vendor_passcode");
    }

    #[test]
    fn test_containment_prefers_closest_identifier() {
        let nodes = vec![
            node("vendor_x_encryption", None),
            node("vendor_x_encryption_enabled_for_removable", None),
            node("vendor_x_encryption_enabled", None),
        ];
        let setting = SettingDefinition::new("s", "x").with_path_hint("encryption.enabled");
        let found = match_setting(&setting, &nodes, &MatchTuning::default()).unwrap();

        assert_eq!(found.tier, MatchTier::Containment);
        assert_eq!(found.node.definition_id, "vendor_x_encryption_enabled");
    }

    #[test]
    fn test_containment_rejects_tiny_fragments() {
        let nodes = vec![node("pin", None)];
        let setting = SettingDefinition::new("s", "x").with_name_hint("require_pin_length");
        assert!(match_setting(&setting, &nodes, &MatchTuning::default()).is_none());
    }

    #[test]
    fn test_term_overlap_threshold() {
        let tuning = MatchTuning::default();
        let setting = SettingDefinition::new("s", "Require PIN Length");

        let half = vec![node("vendor_passport_pin_length", None)];
        assert!(match_setting(&setting, &half, &tuning).is_none());

        let full = vec![
            node("vendor_passport_pin_length", None),
            node("vendor_passport_require_pin_length", None),
        ];
        let found = match_setting(&setting, &full, &tuning).unwrap();
        assert_eq!(found.tier, MatchTier::TermOverlap);
        assert_eq!(found.node.definition_id, "vendor_passport_require_pin_length");
        assert_eq!(found.score, 1.0);
    }

    #[test]
    fn test_term_overlap_uses_labels() {
        let tuning = MatchTuning::default();
        let setting = SettingDefinition::new("s", "Block Removable Storage");
        let nodes = vec![node("vendor_devicelock_rs_01", Some("Removable storage: block write access"))];

        let found = match_setting(&setting, &nodes, &tuning).unwrap();
        assert_eq!(found.tier, MatchTier::TermOverlap);
    }

    #[test]
    fn test_fold_separators() {
        assert_eq!(fold_separators(" Encryption.Enabled "), "encryption_enabled");
        assert_eq!(fold_separators("a--b__c"), "a_b_c");
    }
}
