use chrono::{TimeZone, Utc};
use outpost_types::{DocumentId, Map, Value, deep_equal, number_to_json};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;

// ── deep_equal ──────────────────────────────────────────────────

#[test]
fn deep_equal_scalars() {
    assert!(deep_equal(&Value::from("a"), &Value::from("a")));
    assert!(!deep_equal(&Value::from("a"), &Value::from("b")));
    assert!(deep_equal(&Value::from(1), &Value::from(1.0)));
    assert!(!deep_equal(&Value::from(1), &Value::from("1")));
    assert!(deep_equal(&Value::Null, &Value::Null));
}

#[test]
fn deep_equal_nan_matches_nan() {
    assert!(deep_equal(&Value::Number(f64::NAN), &Value::Number(f64::NAN)));
}

#[test]
fn deep_equal_objects_ignore_insertion_order() {
    let mut a = Map::new();
    a.insert("x".into(), Value::from(1));
    a.insert("y".into(), Value::from(2));
    let mut b = Map::new();
    b.insert("y".into(), Value::from(2));
    b.insert("x".into(), Value::from(1));
    assert!(deep_equal(&Value::Object(a), &Value::Object(b)));
}

#[test]
fn deep_equal_nested_arrays() {
    let a = Value::from(json!({"a": [1, 2, {"b": true}]}));
    let b = Value::from(json!({"a": [1, 2, {"b": true}]}));
    let c = Value::from(json!({"a": [1, 2, {"b": false}]}));
    assert!(deep_equal(&a, &b));
    assert!(!deep_equal(&a, &c));
}

#[test]
fn deep_equal_dates_and_ids() {
    let d = Utc.with_ymd_and_hms(2020, 5, 1, 12, 0, 0).unwrap();
    assert!(deep_equal(&Value::Date(d), &Value::Date(d)));
    let id = DocumentId::new();
    assert!(deep_equal(&Value::Id(id), &Value::Id(id)));
    assert!(!deep_equal(&Value::Id(id), &Value::from(id.to_string())));
}

// ── Display form ────────────────────────────────────────────────

#[test]
fn to_json_renders_dates_and_ids_as_strings() {
    let d = Utc.with_ymd_and_hms(2021, 1, 2, 3, 4, 5).unwrap();
    let id = DocumentId::new();
    let mut map = Map::new();
    map.insert("when".into(), Value::Date(d));
    map.insert("id".into(), Value::Id(id));
    assert_eq!(
        Value::Object(map).to_json(),
        json!({"when": "2021-01-02T03:04:05.000Z", "id": id.to_string()})
    );
}

#[test]
fn number_to_json_prefers_integers() {
    assert_eq!(number_to_json(5.0), json!(5));
    assert_eq!(number_to_json(2.5), json!(2.5));
    assert_eq!(number_to_json(f64::NAN), json!(null));
    assert_eq!(number_to_json(f64::INFINITY), json!(null));
}

#[test]
fn serialize_matches_to_json() {
    let v = Value::from(json!({"a": [1, "two", null], "b": {"c": 1.5}}));
    let text = serde_json::to_string(&v).unwrap();
    let back: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(back, v.to_json());
}

#[test]
fn deserialize_from_json_text() {
    let v = Value::from_json_str(r#"{"s": "x", "n": 3}"#).unwrap();
    assert_eq!(v.get("s").and_then(Value::as_str), Some("x"));
    assert_eq!(v.get("n").and_then(Value::as_f64), Some(3.0));
}

// ── String conversion ───────────────────────────────────────────

#[test]
fn display_numbers_like_native_string_conversion() {
    assert_eq!(Value::from(10).to_string(), "10");
    assert_eq!(Value::from(1.5).to_string(), "1.5");
    assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
    assert_eq!(Value::Number(-0.0).to_string(), "0");
}

#[test]
fn display_extreme_magnitudes_use_exponents() {
    assert_eq!(Value::Number(1e21).to_string(), "1e+21");
    assert_eq!(Value::Number(-2.5e22).to_string(), "-2.5e+22");
    assert_eq!(Value::Number(1e-7).to_string(), "1e-7");
    assert_eq!(Value::Number(1.5e-7).to_string(), "1.5e-7");
    assert_eq!(Value::Number(1e20).to_string(), "100000000000000000000");
    assert_eq!(Value::Number(0.000001).to_string(), "0.000001");
}

#[test]
fn display_arrays_join_with_commas() {
    let v = Value::from(vec![Value::from(1), Value::Null, Value::from("x")]);
    assert_eq!(v.to_string(), "1,,x");
}

// ── Properties ──────────────────────────────────────────────────

fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1_000_000i64..1_000_000).prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(Value::Object),
        ]
    })
}

proptest! {
    #[test]
    fn deep_equal_is_reflexive(v in value_strategy()) {
        prop_assert!(deep_equal(&v, &v.clone()));
    }

    #[test]
    fn json_roundtrip_preserves_plain_values(v in value_strategy()) {
        let back = Value::from(v.to_json());
        prop_assert!(deep_equal(&v, &back));
    }
}
