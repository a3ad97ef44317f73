//! Tests for src/collection/view.rs

use patches_db::{FieldSelection, SampleCollection, ViewStage};
use serde_json::json;

use crate::common::{label_ids, label_names, quickstart};

#[test]
fn match_and_sort() {
    let (_db, ds) = quickstart();
    let view = ds
        .view()
        .match_filter(json!({"ground_truth.detections.label": "cat"}))
        .sort_by("filepath", true);
    assert_eq!(view.values("id", false).unwrap(), vec![json!("s2"), json!("s1")]);
}

#[test]
fn exists_skips_null_fields() {
    let (_db, ds) = quickstart();
    assert_eq!(ds.view().exists("predictions").count().unwrap(), 2);
}

#[test]
fn select_and_exclude() {
    let (_db, ds) = quickstart();
    assert_eq!(ds.view().select(["s3", "s1"]).count().unwrap(), 2);
    assert_eq!(ds.view().exclude(["s3"]).skip(1).limit(5).count().unwrap(), 1);
}

#[test]
fn select_labels_drops_empty_samples() {
    let (_db, ds) = quickstart();
    let view = ds
        .view()
        .select_labels(&["b".to_string()], "ground_truth")
        .unwrap();
    assert_eq!(view.count().unwrap(), 1);
    assert_eq!(label_ids(&view, "ground_truth"), vec!["b"]);
}

#[test]
fn filter_labels_keeps_samples_unless_only_matches() {
    let (_db, ds) = quickstart();
    let all = ds
        .view()
        .filter_labels("predictions", json!({"confidence": {"$gt": 0.5}}), false);
    assert_eq!(all.count().unwrap(), 3);
    assert_eq!(label_ids(&all, "predictions"), vec!["p1", "p3"]);

    let only = ds
        .view()
        .filter_labels("predictions", json!({"label": "bird"}), true);
    assert_eq!(only.count().unwrap(), 1);
}

#[test]
fn save_with_field_selection() {
    let (_db, ds) = quickstart();
    let view = ds
        .view()
        .filter_labels("ground_truth", json!({"label": "cat"}), false);
    view.save("ground_truth").unwrap();
    assert_eq!(label_names(&ds, "ground_truth"), vec!["cat", "cat"]);
    // Unselected fields are untouched.
    assert_eq!(label_ids(&ds, "predictions"), vec!["p1", "p2", "p3"]);
}

#[test]
fn set_values_on_plain_field() {
    let (_db, ds) = quickstart();
    let view = ds.view().limit(2);
    view.set_values("split", vec![json!("train"), json!("val")])
        .unwrap();
    assert_eq!(
        ds.values("split", false).unwrap(),
        vec![json!("train"), json!("val"), serde_json::Value::Null]
    );
}

#[test]
fn set_values_rejects_ragged_lists() {
    let (_db, ds) = quickstart();
    let err = ds
        .view()
        .limit(1)
        .set_values("ground_truth.detections.label", vec![json!(["x"])])
        .unwrap_err();
    assert!(err.to_string().contains("Expected 2 values"));
}

#[test]
fn stages_are_serializable() {
    let (_db, ds) = quickstart();
    let view = ds.view().skip(1).match_filter(json!({"filepath": {"$regex": "0002"}}));
    let encoded = serde_json::to_value(view.stages()).unwrap();
    assert_eq!(encoded[0], json!({"stage": "skip", "args": 1}));
    let decoded: Vec<ViewStage> = serde_json::from_value(encoded).unwrap();
    assert_eq!(decoded, view.stages());
    assert_eq!(view.all_stages().len(), 2);
    assert!(FieldSelection::from(None::<&str>).is_all());
}
