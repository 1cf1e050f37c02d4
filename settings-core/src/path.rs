//! Value locator primitives.
//!
//! Safe nested lookups over untyped document trees. Every function here
//! returns `None` instead of failing when the tree does not have the
//! expected shape.

use serde_json::Value;
use std::collections::VecDeque;

/// One step of a dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step<'a> {
    Key(&'a str),
    Index(usize),
}

/// Split `a.b[0].c` into keys and indices. Returns `None` for malformed input.
fn parse_steps(path: &str) -> Option<Vec<Step<'_>>> {
    let mut steps = Vec::new();
    for segment in path.split('.') {
        let segment = segment.trim();
        if segment.is_empty() {
            return None;
        }

        let (key, mut rest) = match segment.find('[') {
            Some(pos) => (&segment[..pos], &segment[pos..]),
            None => (segment, ""),
        };

        if !key.is_empty() {
            match key.parse::<usize>() {
                Ok(index) => steps.push(Step::Index(index)),
                Err(_) => steps.push(Step::Key(key)),
            }
        }

        while !rest.is_empty() {
            let close = rest.find(']')?;
            let index = rest[1..close].trim().parse::<usize>().ok()?;
            steps.push(Step::Index(index));
            rest = &rest[close + 1..];
            if !rest.is_empty() && !rest.starts_with('[') {
                return None;
            }
        }
    }
    Some(steps)
}

/// Look up a dotted path (`a.b[0].c`, `a.b.0.c`) inside a document.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let steps = parse_steps(path)?;
    if steps.is_empty() {
        return None;
    }

    let mut current = root;
    for step in steps {
        current = match (step, current) {
            (Step::Key(key), Value::Object(map)) => map.get(key)?,
            (Step::Index(index), Value::Array(items)) => items.get(index)?,
            (Step::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Like [`lookup`], but treats JSON null as absent.
pub fn lookup_present<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    lookup(root, path).filter(|v| !v.is_null())
}

/// Last key of a dotted path, without any index suffix.
pub fn final_segment(path: &str) -> Option<&str> {
    let last = path.trim().rsplit('.').next()?;
    let key = match last.find('[') {
        Some(pos) => &last[..pos],
        None => last,
    };
    let key = key.trim();
    (!key.is_empty()).then_some(key)
}

/// Remove any of the known documentation prefixes from the front of a path.
///
/// Prefixes are removed repeatedly and case-insensitively. Returns `None`
/// when nothing was stripped or nothing is left.
pub fn strip_known_prefixes(path: &str, prefixes: &[String]) -> Option<String> {
    let mut rest = path.trim();
    let mut stripped = false;

    loop {
        let next = prefixes.iter().find_map(|prefix| {
            let prefix = prefix.trim();
            if prefix.is_empty() {
                return None;
            }
            let head = rest.get(..prefix.len())?;
            head.eq_ignore_ascii_case(prefix)
                .then(|| &rest[prefix.len()..])
        });

        match next {
            Some(tail) => {
                rest = tail.trim_start_matches('.');
                stripped = true;
            }
            None => break,
        }
    }

    (stripped && !rest.is_empty()).then(|| rest.to_string())
}

fn words(input: &str) -> Vec<&str> {
    input
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect()
}

fn with_first<F>(word: &str, f: F) -> String
where
    F: Fn(char) -> String,
{
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => f(first) + chars.as_str(),
        None => String::new(),
    }
}

/// `password_required` / `PasswordRequired` -> `passwordRequired`.
pub fn camel_case(input: &str) -> String {
    words(input)
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if i == 0 {
                with_first(w, |c| c.to_lowercase().to_string())
            } else {
                with_first(w, |c| c.to_uppercase().to_string())
            }
        })
        .collect()
}

/// `password_required` / `passwordRequired` -> `PasswordRequired`.
pub fn pascal_case(input: &str) -> String {
    words(input)
        .iter()
        .map(|w| with_first(w, |c| c.to_uppercase().to_string()))
        .collect()
}

/// Alternative spellings of a key, excluding the key itself.
pub fn case_variants(key: &str) -> Vec<String> {
    let mut variants: Vec<String> = Vec::with_capacity(3);
    for candidate in [camel_case(key), pascal_case(key), key.to_lowercase()] {
        if !candidate.is_empty() && candidate != key && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// A key found by [`shallow_find`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShallowHit<'a> {
    /// Dotted path of the key
    pub path: String,
    /// Value stored under the key
    pub value: &'a Value,
}

/// Breadth-first, case-insensitive search for `key`.
///
/// The root is level 0; objects nested up to `max_depth` levels below it
/// are inspected. Null values are skipped.
pub fn shallow_find<'a>(root: &'a Value, key: &str, max_depth: usize) -> Option<ShallowHit<'a>> {
    let mut queue: VecDeque<(&'a Value, String, usize)> = VecDeque::new();
    queue.push_back((root, String::new(), 0));

    while let Some((node, path, depth)) = queue.pop_front() {
        match node {
            Value::Object(map) => {
                for (name, value) in map {
                    if name.eq_ignore_ascii_case(key) && !value.is_null() {
                        return Some(ShallowHit {
                            path: join(&path, name),
                            value,
                        });
                    }
                }
                if depth < max_depth {
                    for (name, value) in map {
                        if value.is_object() || value.is_array() {
                            queue.push_back((value, join(&path, name), depth + 1));
                        }
                    }
                }
            }
            // Array elements sit at the same level as the array itself.
            Value::Array(items) => {
                for (i, value) in items.iter().enumerate() {
                    if value.is_object() || value.is_array() {
                        queue.push_back((value, format!("{}[{}]", path, i), depth));
                    }
                }
            }
            _ => {}
        }
    }
    None
}

fn join(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", base, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested_and_indexed() {
        let doc = json!({
            "a": { "b": [ { "c": 1 }, { "c": 2 } ] },
            "flag": null
        });

        assert_eq!(lookup(&doc, "a.b[1].c"), Some(&json!(2)));
        assert_eq!(lookup(&doc, "a.b.0.c"), Some(&json!(1)));
        assert_eq!(lookup(&doc, "a.missing"), None);
        assert_eq!(lookup(&doc, "a.b[9].c"), None);
        assert_eq!(lookup(&doc, "a..b"), None);
        assert_eq!(lookup(&doc, "a.b[x]"), None);
        assert_eq!(lookup(&doc, "flag"), Some(&Value::Null));
        assert_eq!(lookup_present(&doc, "flag"), None);
    }

    #[test]
    fn test_lookup_on_scalar_root() {
        assert_eq!(lookup(&json!(42), "a"), None);
        assert_eq!(lookup(&json!({}), ""), None);
    }

    #[test]
    fn test_final_segment() {
        assert_eq!(final_segment("deviceConfiguration.passwordRequired"), Some("passwordRequired"));
        assert_eq!(final_segment("rules[3]"), Some("rules"));
        assert_eq!(final_segment("single"), Some("single"));
        assert_eq!(final_segment("trailing."), None);
    }

    #[test]
    fn test_strip_known_prefixes() {
        let prefixes = vec!["deviceConfiguration.".to_string(), "properties.".to_string()];

        assert_eq!(
            strip_known_prefixes("DeviceConfiguration.properties.passwordRequired", &prefixes),
            Some("passwordRequired".to_string())
        );
        assert_eq!(strip_known_prefixes("passwordRequired", &prefixes), None);
        assert_eq!(strip_known_prefixes("properties.", &prefixes), None);
    }

    #[test]
    fn test_case_generation() {
        assert_eq!(camel_case("password_required"), "passwordRequired");
        assert_eq!(camel_case("PasswordRequired"), "passwordRequired");
        assert_eq!(pascal_case("passwordRequired"), "PasswordRequired");
        assert_eq!(pascal_case("min-password length"), "MinPasswordLength");

        let variants = case_variants("PasswordRequired");
        assert_eq!(variants, vec!["passwordRequired".to_string(), "passwordrequired".to_string()]);
    }

    #[test]
    fn test_shallow_find_respects_depth() {
        let doc = json!({
            "outer": {
                "Inner": { "PasswordRequired": true },
                "list": [ { "minLength": 8 } ]
            },
            "deep": { "a": { "b": { "target": 1 } } }
        });

        let hit = shallow_find(&doc, "passwordrequired", 2).unwrap();
        assert_eq!(hit.path, "outer.Inner.PasswordRequired");
        assert_eq!(hit.value, &json!(true));

        let hit = shallow_find(&doc, "minlength", 2).unwrap();
        assert_eq!(hit.path, "outer.list[0].minLength");

        assert!(shallow_find(&doc, "target", 2).is_none());
        assert!(shallow_find(&doc, "target", 3).is_some());
    }
}
