//! Recursive flattening of settings-catalog instance trees.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Nesting guard for hostile or corrupted documents.
const MAX_DEPTH: usize = 32;

/// Kind of value a setting instance carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum SettingKind {
    Choice,
    Simple,
    Group,
    Collection,
}

impl SettingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Choice => "choice",
            Self::Simple => "simple",
            Self::Group => "group",
            Self::Collection => "collection",
        }
    }
}

/// Value carried by one setting instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SettingNodeValue {
    /// Enumerated selection, usually a symbolic reference
    Choice(String),
    /// Scalar value
    Simple(Value),
    /// Group of child settings, summarised as `definitionId -> value`
    Group(Value),
    /// Simple, choice or group collection
    Collection(Vec<Value>),
}

impl SettingNodeValue {
    pub fn kind(&self) -> SettingKind {
        match self {
            Self::Choice(_) => SettingKind::Choice,
            Self::Simple(_) => SettingKind::Simple,
            Self::Group(_) => SettingKind::Group,
            Self::Collection(_) => SettingKind::Collection,
        }
    }

    /// The value as a plain JSON tree.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Choice(choice) => Value::String(choice.clone()),
            Self::Simple(value) | Self::Group(value) => value.clone(),
            Self::Collection(items) => Value::Array(items.clone()),
        }
    }
}

/// One node of a flattened settings tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct FlatSetting {
    /// Setting definition identifier
    pub definition_id: String,
    /// Value carried by the instance
    pub value: SettingNodeValue,
    /// Definition identifier of the governing parent
    pub parent_id: Option<String>,
    /// Nesting depth (0 = top-level instance)
    pub depth: usize,
    /// Human-readable label, when the document carries one
    pub label: Option<String>,
}

impl FlatSetting {
    pub fn kind(&self) -> SettingKind {
        self.value.kind()
    }
}

/// Flatten top-level entries depth-first, parents before children.
///
/// Each entry may be a wrapper (`{"settingInstance": {...}}`) or a bare
/// instance. Entries without a definition identifier are skipped.
pub fn flatten(entries: &[Value]) -> Vec<FlatSetting> {
    let labels = collect_labels(entries);
    let mut out = Vec::new();

    for entry in entries {
        let instance = entry.get("settingInstance").unwrap_or(entry);
        visit(instance, None, 0, &labels, &mut out);
    }
    out
}

/// Labels from `settingDefinitions[]` siblings, keyed by lowercase id.
fn collect_labels(entries: &[Value]) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    for entry in entries {
        let Some(definitions) = entry.get("settingDefinitions").and_then(Value::as_array) else {
            continue;
        };
        for definition in definitions {
            let id = definition.get("id").and_then(Value::as_str);
            let label = definition
                .get("displayName")
                .or_else(|| definition.get("name"))
                .and_then(Value::as_str);
            if let (Some(id), Some(label)) = (id, label) {
                labels.insert(id.to_lowercase(), label.to_string());
            }
        }
    }
    labels
}

fn definition_id(instance: &Value) -> Option<&str> {
    instance
        .get("settingDefinitionId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

fn children_of(container: &Value) -> &[Value] {
    container
        .get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn visit(
    instance: &Value,
    parent_id: Option<&str>,
    depth: usize,
    labels: &HashMap<String, String>,
    out: &mut Vec<FlatSetting>,
) {
    if depth > MAX_DEPTH {
        return;
    }
    let Some(id) = definition_id(instance) else {
        return;
    };
    let Some((value, children)) = read_value(instance) else {
        return;
    };

    let label = instance
        .get("displayName")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| labels.get(&id.to_lowercase()).cloned());

    out.push(FlatSetting {
        definition_id: id.to_string(),
        value,
        parent_id: parent_id.map(str::to_string),
        depth,
        label,
    });

    for child in children {
        visit(child, Some(id), depth + 1, labels, out);
    }
}

/// Read the node value and the child instances hanging below it.
fn read_value(instance: &Value) -> Option<(SettingNodeValue, Vec<&Value>)> {
    if let Some(choice) = instance.get("choiceSettingValue").filter(|v| v.is_object()) {
        let value = choice
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Some((SettingNodeValue::Choice(value), children_of(choice).iter().collect()));
    }

    if let Some(simple) = instance.get("simpleSettingValue").filter(|v| v.is_object()) {
        let value = simple.get("value").cloned().unwrap_or(Value::Null);
        return Some((SettingNodeValue::Simple(value), vec![]));
    }

    if let Some(group) = instance.get("groupSettingValue").filter(|v| v.is_object()) {
        let children = children_of(group);
        return Some((SettingNodeValue::Group(summarise(children)), children.iter().collect()));
    }

    if let Some(items) = instance.get("groupSettingCollectionValue").and_then(Value::as_array) {
        let summaries = items.iter().map(|item| summarise(children_of(item))).collect();
        let children = items.iter().flat_map(|item| children_of(item).iter()).collect();
        return Some((SettingNodeValue::Collection(summaries), children));
    }

    if let Some(items) = instance.get("simpleSettingCollectionValue").and_then(Value::as_array) {
        let values = items
            .iter()
            .map(|item| item.get("value").cloned().unwrap_or(Value::Null))
            .collect();
        return Some((SettingNodeValue::Collection(values), vec![]));
    }

    if let Some(items) = instance.get("choiceSettingCollectionValue").and_then(Value::as_array) {
        let values = items
            .iter()
            .map(|item| item.get("value").cloned().unwrap_or(Value::Null))
            .collect();
        let children = items.iter().flat_map(|item| children_of(item).iter()).collect();
        return Some((SettingNodeValue::Collection(values), children));
    }

    None
}

/// `definitionId -> scalar value` for the direct children of a group.
fn summarise(children: &[Value]) -> Value {
    let mut map = Map::new();
    for child in children {
        let Some(id) = definition_id(child) else {
            continue;
        };
        let value = match read_value(child) {
            Some((SettingNodeValue::Choice(choice), _)) => Value::String(choice),
            Some((SettingNodeValue::Simple(value), _)) => value,
            Some((SettingNodeValue::Collection(items), _)) => Value::Array(items),
            Some((SettingNodeValue::Group(_), _)) | None => Value::Null,
        };
        map.insert(id.to_string(), value);
    }
    Value::Object(map)
}
