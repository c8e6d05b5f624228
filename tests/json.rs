mod support;

use chrono::{TimeZone, Utc};
use docmodel::{
    Field, FieldType, InMemoryDocumentStore, Model, Odm, OdmConfig, Schema, Value, CIRCULAR,
    CIRCULAR_DEPTH_EXCEEDED,
};
use serde_json::json;
use support::Shop;

fn nodes(config: OdmConfig) -> Model {
    let odm = Odm::builder(InMemoryDocumentStore::new())
        .config(config)
        .build();
    odm.model(
        Schema::builder("Node")
            .field(Field::new("name", FieldType::String))
            .field(Field::new("next", FieldType::reference("Node")))
            .field(Field::new("children", FieldType::list(FieldType::reference("Node"))))
            .id_field("name"),
    )
    .unwrap()
}

#[test]
fn cycles_become_sentinels() {
    let nodes = nodes(OdmConfig::default());
    let a = nodes.new_instance([("name", "a")]).unwrap();
    let b = nodes.new_instance([("name", "b")]).unwrap();
    a.set("next", &b).unwrap();
    b.set("next", &a).unwrap();

    assert_eq!(
        a.to_json().unwrap(),
        json!({
            "name": "a",
            "next": { "name": "b", "next": CIRCULAR }
        })
    );
}

#[test]
fn repeated_siblings_are_not_cycles() {
    let nodes = nodes(OdmConfig::default());
    let leaf = nodes.new_instance([("name", "leaf")]).unwrap();
    let root = nodes
        .new_instance([
            ("name", Value::from("root")),
            ("children", Value::from(vec![leaf.clone(), leaf.clone()])),
        ])
        .unwrap();

    assert_eq!(
        root.to_json().unwrap(),
        json!({
            "name": "root",
            "children": [{ "name": "leaf" }, { "name": "leaf" }]
        })
    );
}

#[test]
fn depth_ceiling_substitutes_a_sentinel() {
    let nodes = nodes(OdmConfig {
        max_clone_depth: 1,
        ..OdmConfig::default()
    });
    let c = nodes.new_instance([("name", "c")]).unwrap();
    let b = nodes
        .new_instance([("name", Value::from("b")), ("next", Value::from(&c))])
        .unwrap();
    let a = nodes
        .new_instance([("name", Value::from("a")), ("next", Value::from(&b))])
        .unwrap();

    assert_eq!(
        a.to_json().unwrap(),
        json!({
            "name": "a",
            "next": { "name": "b", "next": CIRCULAR_DEPTH_EXCEEDED }
        })
    );
}

#[test]
fn unloaded_references_collapse_to_stubs() {
    let shop = Shop::new();
    let widget = shop
        .products
        .new_instance([
            ("_id", Value::from("p1")),
            ("name", Value::from("Widget")),
            ("store", Value::from(shop.stores.ref_id("s1"))),
        ])
        .unwrap();

    assert_eq!(
        widget.to_json().unwrap(),
        json!({
            "_id": "p1",
            "name": "Widget",
            "store": { "$ref": "s1", "_type": "Store" }
        })
    );
    assert_eq!(shop.stores.ref_id("s1").to_json().unwrap(), json!(null));
}

#[test]
fn typed_output_tags_every_inlined_instance() {
    let shop = Shop::new();
    let corner = shop
        .stores
        .new_instance([("_id", "s1"), ("name", "Corner")])
        .unwrap();
    let widget = shop
        .products
        .new_instance([
            ("_id", Value::from("p1")),
            ("name", Value::from("Widget")),
            ("store", Value::from(&corner)),
        ])
        .unwrap();

    assert_eq!(
        widget.to_json_typed().unwrap(),
        json!({
            "_id": "p1",
            "name": "Widget",
            "store": { "_id": "s1", "name": "Corner", "_type": "Store" },
            "_type": "Product"
        })
    );
}

#[test]
fn dates_render_as_iso_strings() {
    let shop = Shop::new();
    let joined = Utc.with_ymd_and_hms(2023, 12, 24, 18, 0, 5).unwrap();
    let ann = shop
        .customers
        .new_instance([
            ("_id", Value::from("c1")),
            ("name", Value::from("Ann")),
            ("joined", Value::from(joined)),
        ])
        .unwrap();

    let out = ann.to_json().unwrap();
    assert_eq!(out["joined"], json!("2023-12-24T18:00:05.000Z"));
    assert_eq!(out["address"], json!({ "country": "NZ" }));
}

#[test]
fn serialize_uses_the_public_form() {
    let shop = Shop::new();
    let corner = shop
        .stores
        .new_instance([("_id", "s1"), ("name", "Corner")])
        .unwrap();

    let serialized = serde_json::to_value(&corner).unwrap();
    assert_eq!(serialized, corner.to_json().unwrap());
    assert_eq!(
        serde_json::to_string(&corner).unwrap(),
        r#"{"_id":"s1","name":"Corner"}"#
    );
}

#[test]
fn storage_form_differs_from_public_form() {
    let shop = Shop::new();
    let joined = Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap();
    let ann = shop
        .customers
        .new_instance([
            ("_id", Value::from("c1")),
            ("name", Value::from("Ann")),
            ("notes", Value::from(joined)),
        ])
        .unwrap();

    let stored = ann.to_coo().unwrap();
    assert_eq!(stored["_type"], json!("Customer"));
    assert_eq!(
        stored["notes"],
        json!({ "v": "2023-01-02T03:04:05.000Z", "_type": "Date" })
    );

    let public = ann.to_json().unwrap();
    assert!(public.get("_type").is_none());
    assert_eq!(public["notes"], json!("2023-01-02T03:04:05.000Z"));
}

#[test]
fn debug_output_names_the_model_and_state() {
    let shop = Shop::new();
    let handle = shop.stores.ref_id("s1");
    assert_eq!(format!("{:?}", handle), "Model(`Store`, unloaded, key:Store|s1, {})");

    let corner = shop.stores.new_instance([("_id", "s1")]).unwrap();
    let rendered = format!("{:?}", corner);
    assert!(rendered.starts_with("Model(`Store`, loaded, key:null, {"));
    assert!(rendered.contains("\"_id\": \"s1\""), "{}", rendered);
}
