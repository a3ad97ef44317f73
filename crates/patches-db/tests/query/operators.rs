//! Tests for src/query/operators.rs

use patches_db::query::operators::{compare_values, matches_filter, resolve_path};
use serde_json::json;
use std::cmp::Ordering;

#[test]
fn nested_label_filters() {
    let sample = json!({
        "id": "s1",
        "gt": {"_cls": "Detections", "detections": [
            {"id": "a", "label": "cat", "confidence": 0.9, "tags": ["ok"]},
            {"id": "b", "label": "dog", "confidence": 0.2, "tags": []},
        ]},
    });
    assert!(matches_filter(&sample, &json!({"gt.detections.label": "dog"})).unwrap());
    assert!(matches_filter(&sample, &json!({"gt.detections.confidence": {"$gte": 0.9}})).unwrap());
    assert!(!matches_filter(&sample, &json!({"gt.detections.confidence": {"$gt": 0.95}})).unwrap());
    assert!(matches_filter(&sample, &json!({"gt.detections": {"$size": 2}})).unwrap());
}

#[test]
fn regex_and_ne() {
    let doc = json!({"filepath": "/data/000002.jpg", "labels": ["cat", "dog"]});
    assert!(matches_filter(&doc, &json!({"filepath": {"$regex": "^/data/.*2\\.jpg$"}})).unwrap());
    assert!(matches_filter(&doc, &json!({"labels": {"$ne": "bird"}})).unwrap());
    assert!(!matches_filter(&doc, &json!({"labels": {"$ne": "cat"}})).unwrap());
}

#[test]
fn and_or_combine() {
    let doc = json!({"type": "fp", "iou": null, "confidence": 0.4});
    let f = json!({"$and": [{"type": {"$in": ["fp", "fn"]}}, {"$or": [{"iou": {"$exists": true}}, {"confidence": {"$lt": 0.5}}]}]});
    assert!(matches_filter(&doc, &f).unwrap());
}

#[test]
fn ordering_across_types() {
    assert_eq!(compare_values(&json!(1), &json!("a")), Ordering::Less);
    assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
    assert_eq!(compare_values(&json!(null), &json!(0)), Ordering::Greater);
}

#[test]
fn resolve_missing_path() {
    let doc = json!({"a": {"b": 1}});
    assert_eq!(resolve_path(&doc, "a.b"), Some(json!(1)));
    assert_eq!(resolve_path(&doc, "a.c"), None);
    assert_eq!(resolve_path(&doc, "a.b.c"), None);
}
