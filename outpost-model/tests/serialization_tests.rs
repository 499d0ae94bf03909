mod common;

use chrono::{TimeZone, Utc};
use common::sample_proxy;
use outpost_model::{
    ArrayProxy, Definition, Extract, FieldDef, ObjectProxy, Property, SerializeOptions,
};
use outpost_types::{DocumentId, Map, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

// ── Logical form ─────────────────────────────────────────────────

#[test]
fn to_object_keeps_dates_and_ids_typed() {
    let schema = Definition::new("Typed")
        .field("when", FieldDef::date())
        .field("owner", FieldDef::identifier())
        .compile()
        .unwrap();
    let id = DocumentId::new();
    let proxy = ObjectProxy::new(
        &schema,
        Value::from(json!({ "when": "2020-01-01T00:00:00Z", "owner": id.to_string() })),
    )
    .unwrap();

    let logical = proxy.to_object(SerializeOptions::default());
    assert_eq!(
        logical.get("when").and_then(Value::as_date),
        Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(logical.get("owner").and_then(Value::as_id), Some(id));
}

#[test]
fn to_object_recurses_through_children() {
    let proxy = sample_proxy(json!({
        "str": "s",
        "arr": [1, [2, 3]],
        "obj": { "deep": { "blah": "b" } },
    }));
    assert_eq!(
        proxy.to_object(SerializeOptions::without_virtuals()),
        Value::from(json!({
            "str": "s",
            "arr": [1, [2, 3]],
            "obj": { "deep": { "blah": "b" } },
        }))
    );
}

// ── Display form ─────────────────────────────────────────────────

#[test]
fn to_json_renders_client_safe_values() {
    let schema = Definition::new("Display")
        .field("when", FieldDef::date())
        .field("owner", FieldDef::identifier())
        .field("ratio", FieldDef::number())
        .field("count", FieldDef::number())
        .compile()
        .unwrap();
    let id = DocumentId::new();
    let proxy = ObjectProxy::empty(&schema);
    proxy.set("when", "2020-01-01T00:00:00Z").unwrap();
    proxy.set("owner", id).unwrap();
    proxy.set("ratio", f64::INFINITY).unwrap();
    proxy.set("count", 3).unwrap();

    assert_eq!(
        proxy.to_json(SerializeOptions::default()),
        json!({
            "when": "2020-01-01T00:00:00.000Z",
            "owner": id.to_string(),
            "ratio": null,
            "count": 3,
        })
    );
}

#[test]
fn dates_inside_plain_values_render_as_strings() {
    let when = Utc.with_ymd_and_hms(2021, 5, 6, 7, 8, 9).unwrap();
    let array = ArrayProxy::new(vec![Value::Date(when), Value::Null]);
    assert_eq!(
        array.display_value(SerializeOptions::default()),
        Some(json!(["2021-05-06T07:08:09.000Z", null]))
    );
}

// ── Virtual fields ───────────────────────────────────────────────

#[test]
fn virtuals_are_included_by_default() {
    let proxy = sample_proxy(json!({ "str": "x" }));
    assert_eq!(
        proxy.to_json(SerializeOptions::default()),
        json!({ "str": "x", "virt": "x.virtual" })
    );
    assert_eq!(
        proxy.to_object(SerializeOptions::default()).get("virt"),
        Some(&Value::from("x.virtual"))
    );
}

#[test]
fn virtuals_can_be_excluded() {
    let proxy = sample_proxy(json!({ "str": "x" }));
    assert_eq!(
        proxy.to_json(SerializeOptions::without_virtuals()),
        json!({ "str": "x" })
    );
}

#[test]
fn absent_virtuals_are_omitted() {
    let proxy = sample_proxy(json!({}));
    assert_eq!(proxy.to_json(SerializeOptions::default()), json!({}));
}

#[test]
fn nested_virtuals_follow_the_option() {
    let schema = Definition::new("Outer")
        .field(
            "inner",
            FieldDef::object()
                .field("name", FieldDef::string())
                .field(
                    "shout",
                    FieldDef::virtual_getter(|proxy| {
                        proxy.get_str("name").map(|n| n.to_uppercase().into())
                    }),
                ),
        )
        .compile()
        .unwrap();
    let proxy = ObjectProxy::new(&schema, Value::from(json!({ "inner": { "name": "hi" } }))).unwrap();

    assert_eq!(
        proxy.to_json(SerializeOptions::default()),
        json!({ "inner": { "name": "hi", "shout": "HI" } })
    );
    assert_eq!(
        proxy.to_json(SerializeOptions::without_virtuals()),
        json!({ "inner": { "name": "hi" } })
    );
}

// ── Helpers on plain values ──────────────────────────────────────

#[test]
fn absent_entries_are_dropped_from_sequences_and_maps() {
    let items: Vec<Option<Value>> = vec![Some(1.into()), None, Some(Value::Null)];
    assert_eq!(
        items.as_slice().display_value(SerializeOptions::default()),
        Some(json!([1, null]))
    );

    let mut map = std::collections::BTreeMap::new();
    map.insert("kept".to_owned(), Some(Value::from("v")));
    map.insert("gone".to_owned(), None);
    assert_eq!(
        map.logical_value(SerializeOptions::default()),
        Some(Value::Object(Map::from([("kept".to_owned(), Value::from("v"))])))
    );
}

#[test]
fn property_extraction_dispatches_to_the_proxy() {
    let proxy = sample_proxy(json!({ "arr": [1, 2] }));
    let property = proxy.get("arr").unwrap();
    assert!(matches!(property, Property::Array(_)));
    assert_eq!(property.to_value(), Value::from(json!([1, 2])));
    assert_eq!(
        property.display_value(SerializeOptions::default()),
        Some(json!([1, 2]))
    );
}

#[test]
fn options_deserialize_with_defaults() {
    let opts: SerializeOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(opts, SerializeOptions::default());
    let opts: SerializeOptions = serde_json::from_str(r#"{"include_virtuals":false}"#).unwrap();
    assert_eq!(opts, SerializeOptions::without_virtuals());
}

// ── Re-hydration ─────────────────────────────────────────────────

#[test]
fn display_form_rehydrates_to_the_same_display_form() {
    let proxy = sample_proxy(json!({
        "str": "s",
        "num": 4,
        "bool": false,
        "when": "2020-02-02T02:02:02.002Z",
        "tags": ["a", "b"],
        "obj": { "deep": { "blah": "b", "count": 2 } },
    }));
    let display = proxy.to_json(SerializeOptions::without_virtuals());
    let again = sample_proxy(display.clone());
    assert_eq!(again.to_json(SerializeOptions::without_virtuals()), display);
    assert_eq!(
        again.to_object(SerializeOptions::default()),
        proxy.to_object(SerializeOptions::default())
    );
}
