use super::*;
use serde_json::json;

fn record(value: Value) -> Record {
    Record::from_value(value)
}

fn incident_metadata() -> Metadata {
    Metadata {
        logical_name: "incident".into(),
        logical_collection_name: "incidents".into(),
        primary_id_attribute: "incidentid".into(),
        primary_name_attribute: "title".into(),
        display_name: None,
        display_collection_name: None,
        attributes: vec![],
    }
}

#[test]
fn id_is_normalized() {
    let r = record(json!({"incidentid": "{ABC-123}", "title": "Printer"}));
    let meta = incident_metadata();
    assert_eq!(r.id(&meta).as_deref(), Some("abc-123"));
    assert_eq!(r.name(&meta), Some("Printer"));
}

#[test]
fn same_content_for_equal_fields() {
    let a = record(json!({"id": "1", "status": 1}));
    let b = record(json!({"status": 1, "id": "1"}));
    assert!(a.same_content(&b));
    assert_eq!(a, b);
}

#[test]
fn changed_value_changes_fingerprint() {
    let a = record(json!({"id": "1", "status": 1}));
    let b = record(json!({"id": "1", "status": 2}));
    assert!(!a.same_content(&b));
}

#[test]
fn null_key_is_not_the_same_as_missing_key() {
    let a = record(json!({"id": "1", "owner": null}));
    let b = record(json!({"id": "1"}));
    assert!(!a.same_content(&b));
}

#[test]
fn extra_key_breaks_equality() {
    let a = record(json!({"id": "1"}));
    let b = record(json!({"id": "1", "status": 1}));
    assert!(!a.same_content(&b));
}

#[test]
fn merge_restamps_fingerprint() {
    let mut r = record(json!({"id": "1", "status": 1}));
    let before = r.fingerprint();
    let mut patch = Data::new();
    patch.insert("status".into(), json!(2));
    r.merge(&patch);
    assert_ne!(r.fingerprint(), before);
    assert_eq!(r.option_value("status"), Some(2));
    assert!(r.same_content(&record(json!({"id": "1", "status": 2}))));
}

#[test]
fn non_object_value_becomes_empty_record() {
    assert!(record(json!([1, 2])).is_empty());
}

#[test]
fn lookup_id_reads_value_attribute() {
    let r = record(json!({"_parentcaseid_value": "{DEF}"}));
    assert_eq!(r.lookup_id("parentcaseid").as_deref(), Some("def"));
    assert!(r.lookup_id("customerid").is_none());
}

#[test]
fn bind_round_trips_through_parse() {
    let (key, value) = lookup_bind("oss_incidentid", "incidents", "{AB}");
    assert_eq!(key, "oss_incidentid@odata.bind");
    assert_eq!(value, json!("/incidents(ab)"));
    assert_eq!(parse_bind(&key, &value), Some(("oss_incidentid".to_string(), "ab".to_string())));
}

#[test]
fn parse_bind_rejects_plain_keys() {
    assert!(parse_bind("title", &json!("/incidents(ab)")).is_none());
    assert!(parse_bind("x@odata.bind", &json!(5)).is_none());
}

#[test]
fn serde_is_transparent_map() {
    let r = record(json!({"id": "1"}));
    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json, json!({"id": "1"}));
    let back: Record = serde_json::from_value(json).unwrap();
    assert!(back.same_content(&r));
}
