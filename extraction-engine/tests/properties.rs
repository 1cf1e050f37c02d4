//! Property tests for the cascade and the validator.

use proptest::prelude::*;
use serde_json::{json, Value};

use extraction_engine::StrategyCascade;
use settings_core::{validate, DataType, Operator, PolicyDocument, SettingDefinition, StrategyKind};

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9_ ]{0,12}".prop_map(Value::String),
    ]
}

fn tree() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-zA-Z]{1,8}", inner, 0..5)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn catalog_tree() -> impl Strategy<Value = Value> {
    prop::collection::vec(("[a-z]{3,8}(_[a-z]{3,8}){0,3}", leaf()), 1..5).prop_map(|entries| {
        let settings: Vec<Value> = entries
            .into_iter()
            .map(|(id, value)| {
                json!({ "settingInstance": { "settingDefinitionId": id, "simpleSettingValue": { "value": value } } })
            })
            .collect();
        json!({ "settings": settings })
    })
}

fn setting() -> impl Strategy<Value = SettingDefinition> {
    (
        "[A-Za-z ]{0,24}",
        prop::option::of("[a-zA-Z]{1,8}(\\.[a-zA-Z]{1,8}){0,3}"),
        prop::option::of("[a-z]{3,8}(_[a-z]{3,8}){0,3}"),
    )
        .prop_map(|(display, path, name)| {
            let mut setting = SettingDefinition::new("s", display);
            setting.path_hint = path;
            setting.name_hint = name;
            setting
        })
}

fn document() -> impl Strategy<Value = PolicyDocument> {
    prop_oneof![tree(), catalog_tree()].prop_map(|content| PolicyDocument::new("d", "k", content))
}

proptest! {
    #[test]
    fn confidence_respects_strategy_ceiling(doc in document(), setting in setting()) {
        let result = StrategyCascade::default().locate(&doc, &setting);
        if result.strategy == StrategyKind::None {
            prop_assert_eq!(result.confidence, 0.0);
            prop_assert!(result.value.is_none());
        } else {
            prop_assert!(result.confidence <= result.strategy.ceiling());
            prop_assert!(!matches!(result.value, None | Some(Value::Null)));
        }
    }

    #[test]
    fn locate_is_idempotent(doc in document(), setting in setting()) {
        let cascade = StrategyCascade::default();
        let first = cascade.locate(&doc, &setting);
        let second = cascade.locate(&doc, &setting);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn boolean_equality_ignores_case(upper in prop::collection::vec(any::<bool>(), 4), value in any::<bool>()) {
        let text: String = value
            .to_string()
            .chars()
            .zip(upper.iter().cycle())
            .map(|(c, up)| if *up { c.to_ascii_uppercase() } else { c })
            .collect();

        let verdict = validate(Some(&json!(text)), &value.to_string(), "==", DataType::Boolean);
        prop_assert!(verdict.is_valid);
        let verdict = validate(Some(&json!(value)), &text, "==", DataType::Boolean);
        prop_assert!(verdict.is_valid);
    }

    #[test]
    fn missing_value_only_satisfies_absence(
        operator in prop::sample::select(vec![
            "==", "!=", ">", ">=", "<", "<=", "contains", "in", "matches", "exists", "not_exists", "",
        ]),
        expected in "[a-z0-9,]{0,8}",
        data_type in prop::sample::select(vec![
            DataType::Boolean, DataType::Integer, DataType::String, DataType::Array, DataType::Object,
        ]),
    ) {
        let absence = Operator::parse(operator) == Some(Operator::NotExists);
        prop_assert_eq!(validate(None, &expected, operator, data_type).is_valid, absence);
        prop_assert_eq!(validate(Some(&Value::Null), &expected, operator, data_type).is_valid, absence);
    }
}
