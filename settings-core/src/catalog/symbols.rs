//! Recognising symbolic reference values.
//!
//! Choice values are usually not literal: `vendor_defender_realtime_1` stands
//! for the second option of `vendor_defender_realtime`. Those need decoding
//! before they can be compared.

use regex::Regex;
use std::sync::OnceLock;

fn generic_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9_.\-]*_\d+$").expect("valid symbolic reference pattern")
    })
}

/// Whether `value` looks like an opaque reference to an enumerated option.
///
/// With a known definition id the value must be `<definition id>_<digits>`
/// (case-insensitive). Without one, any lowercase `identifier_<digits>` token
/// qualifies.
pub fn is_symbolic_reference(definition_id: Option<&str>, value: &str) -> bool {
    let value = value.trim();
    match definition_id {
        Some(id) if !id.is_empty() => {
            let Some(prefix) = value.get(..id.len()) else {
                return false;
            };
            if !prefix.eq_ignore_ascii_case(id) {
                return false;
            }
            let Some(suffix) = value[id.len()..].strip_prefix('_') else {
                return false;
            };
            !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit())
        }
        _ => generic_pattern().is_match(value),
    }
}

/// Numeric discriminator of a symbolic reference (`..._1` -> 1).
pub fn discriminator(value: &str) -> Option<u32> {
    let (_, suffix) = value.trim().rsplit_once('_')?;
    suffix.parse().ok()
}
