//! Type-aware compliance validation.
//!
//! Both operands are coerced to the declared data type before an operator is
//! evaluated. Validation is a pure function of (actual, expected, operator,
//! data type); the only side effect is a warning log when an unrecognised
//! operator is evaluated as equality under [`UnknownOperatorPolicy::EqualityFallback`].

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::warn;

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::types::render_value;

/// Declared data type of a catalog setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "int", alias = "number")]
    Integer,
    #[default]
    String,
    #[serde(alias = "list")]
    Array,
    #[serde(alias = "json")]
    Object,
}

impl DataType {
    /// Parse a catalog type name; unknown names read as string.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "boolean" | "bool" => Self::Boolean,
            "integer" | "int" | "number" => Self::Integer,
            "array" | "list" => Self::Array,
            "object" | "json" => Self::Object,
            _ => Self::String,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether a JSON value natively has this type.
    fn is_native(&self, value: &Value) -> bool {
        match self {
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON type name of a value, for explanations.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterOrEqual,
    LessOrEqual,
    GreaterThan,
    LessThan,
    Contains,
    In,
    Matches,
    Exists,
    /// Must be absent; the only operator a missing value satisfies
    NotExists,
}

impl Operator {
    /// Parse a catalog operator. An empty operator means equality.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['-', ' '], "_");
        let op = match normalized.as_str() {
            "" | "==" | "=" | "===" | "eq" | "equals" => Self::Equals,
            "!=" | "<>" | "!==" | "ne" | "not_equals" | "notequals" => Self::NotEquals,
            ">=" | "gte" | "greater_or_equal" | "at_least" => Self::GreaterOrEqual,
            "<=" | "lte" | "less_or_equal" | "at_most" => Self::LessOrEqual,
            ">" | "gt" | "greater_than" => Self::GreaterThan,
            "<" | "lt" | "less_than" => Self::LessThan,
            "contains" | "includes" => Self::Contains,
            "in" | "one_of" => Self::In,
            "matches" | "regex" | "~=" => Self::Matches,
            "exists" | "is_set" | "present" => Self::Exists,
            "not_exists" | "!exists" | "notexists" | "absent" | "must_be_absent" => Self::NotExists,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::Contains => "contains",
            Self::In => "in",
            Self::Matches => "matches",
            Self::Exists => "exists",
            Self::NotExists => "not_exists",
        }
    }
}

/// How to treat a non-empty operator that is not recognised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownOperatorPolicy {
    /// Return an `UnsupportedOperator` verdict
    #[default]
    Reject,
    /// Evaluate as equality and log a warning
    EqualityFallback,
}

/// Why a verdict is not a plain comparison result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("Unsupported operator: '{operator}'")]
    UnsupportedOperator { operator: String },

    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Operator '{operator}' needs a list of expected values")]
    ExpectedNotList { operator: String },

    #[error("Operator '{operator}' does not apply to {data_type} values")]
    OperatorNotApplicable { operator: String, data_type: DataType },

    #[error("Cannot read expected value '{value}' as {data_type}")]
    UnreadableExpected { value: String, data_type: DataType },

    #[error("Cannot read actual value '{value}' as {data_type}")]
    UnreadableActual { value: String, data_type: DataType },

    #[error("Type mismatch: actual value is {actual}, declared type is {declared}")]
    TypeMismatch { actual: String, declared: DataType },

    #[error("No value was found")]
    MissingValue,

    #[error("Unrecognised operator '{operator}' evaluated as equality")]
    EqualityFallback { operator: String },
}

impl ValidationIssue {
    /// Whether the issue points at a catalog bug rather than at the document.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedOperator { .. }
                | Self::InvalidPattern { .. }
                | Self::ExpectedNotList { .. }
                | Self::OperatorNotApplicable { .. }
                | Self::UnreadableExpected { .. }
        )
    }
}

/// Result of validating one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// Whether the requirement is satisfied
    pub is_valid: bool,
    /// Actual value after coercion
    pub normalized_actual: Option<Value>,
    /// Expected value after coercion
    pub normalized_expected: Option<Value>,
    /// Explanation, when there is one
    pub issue: Option<ValidationIssue>,
}

impl ValidationVerdict {
    fn failed(issue: ValidationIssue) -> Self {
        Self {
            is_valid: false,
            normalized_actual: None,
            normalized_expected: None,
            issue: Some(issue),
        }
    }

    fn outcome(is_valid: bool, actual: Value, expected: Option<Value>) -> Self {
        Self {
            is_valid,
            normalized_actual: Some(actual),
            normalized_expected: expected,
            issue: None,
        }
    }

    /// Human-readable explanation.
    pub fn error_message(&self) -> Option<String> {
        self.issue.as_ref().map(ToString::to_string)
    }

    /// Whether the verdict reflects a catalog bug rather than non-compliance.
    pub fn is_configuration_error(&self) -> bool {
        self.issue.as_ref().is_some_and(ValidationIssue::is_configuration_error)
    }
}

/// Validation engine.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    unknown_operator: UnknownOperatorPolicy,
}

impl Validator {
    pub fn new(unknown_operator: UnknownOperatorPolicy) -> Self {
        Self { unknown_operator }
    }

    /// Validate an actual value against a catalog expectation.
    pub fn validate(
        &self,
        actual: Option<&Value>,
        expected: &str,
        operator: &str,
        data_type: DataType,
    ) -> ValidationVerdict {
        let (op, fell_back) = match Operator::parse(operator) {
            Some(op) => (op, false),
            None => match self.unknown_operator {
                UnknownOperatorPolicy::Reject => {
                    return ValidationVerdict::failed(ValidationIssue::UnsupportedOperator {
                        operator: operator.to_string(),
                    });
                }
                UnknownOperatorPolicy::EqualityFallback => {
                    warn!(operator = %operator, "Unrecognised operator, falling back to equality");
                    (Operator::Equals, true)
                }
            },
        };

        let actual = match actual.filter(|v| !v.is_null()) {
            Some(value) => value,
            None if op == Operator::NotExists => {
                return ValidationVerdict {
                    is_valid: true,
                    normalized_actual: None,
                    normalized_expected: None,
                    issue: None,
                };
            }
            None => return ValidationVerdict::failed(ValidationIssue::MissingValue),
        };

        let mut verdict = evaluate(actual, expected, op, data_type);
        if fell_back && verdict.issue.is_none() {
            verdict.issue = Some(ValidationIssue::EqualityFallback {
                operator: operator.to_string(),
            });
        }
        if !verdict.is_valid
            && verdict.issue.is_none()
            && !actual.is_string()
            && !data_type.is_native(actual)
        {
            verdict.issue = Some(ValidationIssue::TypeMismatch {
                actual: json_type_name(actual).to_string(),
                declared: data_type,
            });
        }
        verdict
    }
}

/// Validate with the default policy (unrecognised operators are rejected).
pub fn validate(
    actual: Option<&Value>,
    expected: &str,
    operator: &str,
    data_type: DataType,
) -> ValidationVerdict {
    Validator::default().validate(actual, expected, operator, data_type)
}

fn evaluate(actual: &Value, expected: &str, op: Operator, data_type: DataType) -> ValidationVerdict {
    match op {
        Operator::Exists => ValidationVerdict::outcome(!is_empty(actual), actual.clone(), None),
        Operator::NotExists => ValidationVerdict::outcome(is_empty(actual), actual.clone(), None),
        Operator::Matches => evaluate_matches(actual, expected),
        Operator::In => evaluate_in(actual, expected, data_type),
        Operator::Contains => evaluate_contains(actual, expected, data_type),
        Operator::Equals | Operator::NotEquals => {
            let (a, e) = match coerce_pair(actual, expected, data_type) {
                Ok(pair) => pair,
                Err(issue) => return ValidationVerdict::failed(issue),
            };
            let equal = values_equal(&a, &e, data_type);
            let is_valid = if op == Operator::Equals { equal } else { !equal };
            ValidationVerdict::outcome(is_valid, a, Some(e))
        }
        Operator::GreaterOrEqual
        | Operator::LessOrEqual
        | Operator::GreaterThan
        | Operator::LessThan => evaluate_ordering(actual, expected, op, data_type),
    }
}

fn coerce_pair(
    actual: &Value,
    expected: &str,
    data_type: DataType,
) -> Result<(Value, Value), ValidationIssue> {
    let e = coerce_text(expected, data_type).ok_or_else(|| ValidationIssue::UnreadableExpected {
        value: expected.to_string(),
        data_type,
    })?;
    let a = coerce(actual, data_type).ok_or_else(|| ValidationIssue::UnreadableActual {
        value: render_value(actual).unwrap_or_default(),
        data_type,
    })?;
    Ok((a, e))
}

fn evaluate_ordering(
    actual: &Value,
    expected: &str,
    op: Operator,
    data_type: DataType,
) -> ValidationVerdict {
    let limit = match expected.trim().parse::<i64>() {
        Ok(limit) => limit,
        Err(_) => {
            return ValidationVerdict::failed(ValidationIssue::UnreadableExpected {
                value: expected.to_string(),
                data_type: DataType::Integer,
            })
        }
    };

    let normalized = match data_type {
        DataType::Integer | DataType::String | DataType::Array => coerce(actual, data_type),
        DataType::Boolean | DataType::Object => {
            return ValidationVerdict::failed(ValidationIssue::OperatorNotApplicable {
                operator: op.as_str().to_string(),
                data_type,
            })
        }
    };
    let Some(normalized) = normalized else {
        return ValidationVerdict::failed(ValidationIssue::UnreadableActual {
            value: render_value(actual).unwrap_or_default(),
            data_type,
        });
    };

    // Strings and arrays compare by cardinality.
    let measured = match &normalized {
        Value::String(s) => s.chars().count() as i64,
        Value::Array(items) => items.len() as i64,
        other => other.as_i64().unwrap_or_default(),
    };

    let is_valid = match op {
        Operator::GreaterOrEqual => measured >= limit,
        Operator::LessOrEqual => measured <= limit,
        Operator::GreaterThan => measured > limit,
        _ => measured < limit,
    };
    ValidationVerdict::outcome(is_valid, normalized, Some(Value::from(limit)))
}

fn evaluate_contains(actual: &Value, expected: &str, data_type: DataType) -> ValidationVerdict {
    let needle = expected.trim();
    match data_type {
        DataType::Array => {
            let Some(items) = coerce(actual, DataType::Array) else {
                return ValidationVerdict::failed(ValidationIssue::UnreadableActual {
                    value: render_value(actual).unwrap_or_default(),
                    data_type,
                });
            };
            let found = items
                .as_array()
                .is_some_and(|items| items.iter().any(|item| scalar_eq(item, needle)));
            ValidationVerdict::outcome(found, items, Some(Value::String(needle.to_string())))
        }
        DataType::Object => {
            let serialized = actual.to_string();
            ValidationVerdict::outcome(
                serialized.contains(needle),
                actual.clone(),
                Some(Value::String(needle.to_string())),
            )
        }
        DataType::String => {
            let text = render_value(actual).unwrap_or_default();
            let found = text.contains(needle);
            ValidationVerdict::outcome(found, Value::String(text), Some(Value::String(needle.to_string())))
        }
        DataType::Boolean | DataType::Integer => {
            ValidationVerdict::failed(ValidationIssue::OperatorNotApplicable {
                operator: Operator::Contains.as_str().to_string(),
                data_type,
            })
        }
    }
}

fn evaluate_in(actual: &Value, expected: &str, data_type: DataType) -> ValidationVerdict {
    let Some(list) = parse_list(expected) else {
        return ValidationVerdict::failed(ValidationIssue::ExpectedNotList {
            operator: Operator::In.as_str().to_string(),
        });
    };
    let allowed: Vec<Value> = list
        .iter()
        .filter_map(|item| match data_type {
            DataType::Array => Some(item.clone()),
            other => coerce(item, other),
        })
        .collect();

    let element_type = if data_type == DataType::Array {
        DataType::String
    } else {
        data_type
    };
    let Some(normalized) = coerce(actual, data_type) else {
        return ValidationVerdict::failed(ValidationIssue::UnreadableActual {
            value: render_value(actual).unwrap_or_default(),
            data_type,
        });
    };

    let member = |value: &Value| allowed.iter().any(|a| values_equal(value, a, element_type));
    let is_valid = match &normalized {
        Value::Array(items) if data_type == DataType::Array => items.iter().all(|i| member(i)),
        other => member(other),
    };
    ValidationVerdict::outcome(is_valid, normalized, Some(Value::Array(allowed)))
}

fn evaluate_matches(actual: &Value, pattern: &str) -> ValidationVerdict {
    let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => regex,
        Err(e) => {
            return ValidationVerdict::failed(ValidationIssue::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
        }
    };
    let text = render_value(actual).unwrap_or_default();
    let is_valid = regex.is_match(&text);
    ValidationVerdict::outcome(is_valid, Value::String(text), Some(Value::String(pattern.to_string())))
}

/// Whole floats inside the `i64` range; anything else is unreadable as an integer.
fn whole_f64_to_i64(f: f64) -> Option<i64> {
    // `i64::MAX as f64` rounds up to 2^63.
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.fract() == 0.0 && in_range).then(|| f as i64)
}

/// Null, blank strings and empty containers count as empty.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Parse an expected list: a JSON array or comma separated text.
fn parse_list(expected: &str) -> Option<Vec<Value>> {
    let trimmed = expected.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        return match serde_json::from_str::<Value>(trimmed).ok()? {
            Value::Array(items) => Some(items),
            _ => None,
        };
    }
    Some(
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    )
}

fn coerce_text(text: &str, data_type: DataType) -> Option<Value> {
    coerce(&Value::String(text.to_string()), data_type)
}

/// Convert a value to the canonical representation of `data_type`.
pub fn coerce(value: &Value, data_type: DataType) -> Option<Value> {
    match data_type {
        DataType::Boolean => match value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(Value::Bool(true)),
                Some(0) => Some(Value::Bool(false)),
                _ => None,
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        DataType::Integer => match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_f64_to_i64))
                .map(Value::from),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(whole_f64_to_i64))
                    .map(Value::from)
            }
            _ => None,
        },
        DataType::String => render_value(value).map(Value::String),
        DataType::Array => match value {
            Value::Array(items) => Some(Value::Array(items.clone())),
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Some(Value::Array(vec![]))
                } else if trimmed.starts_with('[') {
                    serde_json::from_str::<Value>(trimmed).ok().filter(Value::is_array)
                } else {
                    parse_list(trimmed).map(Value::Array)
                }
            }
            Value::Object(_) | Value::Null => None,
            scalar => Some(Value::Array(vec![scalar.clone()])),
        },
        DataType::Object => match value {
            Value::Object(_) => Some(value.clone()),
            Value::String(s) => serde_json::from_str::<Value>(s.trim()).ok().filter(Value::is_object),
            _ => None,
        },
    }
}

/// Case-insensitive comparison of a scalar against text.
fn scalar_eq(item: &Value, text: &str) -> bool {
    render_value(item).is_some_and(|s| s.trim().eq_ignore_ascii_case(text.trim()))
}

fn values_equal(a: &Value, e: &Value, data_type: DataType) -> bool {
    match data_type {
        DataType::String => match (a.as_str(), e.as_str()) {
            (Some(a), Some(e)) => a.trim().to_lowercase() == e.trim().to_lowercase(),
            _ => false,
        },
        DataType::Array => match (a.as_array(), e.as_array()) {
            (Some(a), Some(e)) => {
                a.len() == e.len()
                    && a.iter().zip(e).all(|(x, y)| match render_value(y) {
                        Some(text) => scalar_eq(x, &text),
                        None => x.is_null(),
                    })
            }
            _ => false,
        },
        DataType::Boolean | DataType::Integer | DataType::Object => a == e,
    }
}
