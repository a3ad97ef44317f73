//! Tests for src/collection/dataset.rs

use std::collections::HashSet;

use patches_db::schema::FieldKind;
use patches_db::{Dataset, FieldSelection, LabelType, SampleCollection};
use serde_json::json;

use crate::common::{det, find_label, label_ids, quickstart, tags};

#[test]
fn schema_is_inferred_from_cls() {
    let (_db, ds) = quickstart();
    let schema = ds.schema().unwrap();
    assert_eq!(
        schema.get("ground_truth"),
        Some(FieldKind::Label(LabelType::Detections))
    );
    assert_eq!(schema.get("filepath"), Some(FieldKind::Primitive));
    let names: Vec<String> = ds.label_fields().unwrap().into_iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["ground_truth", "predictions"]);
}

#[test]
fn conflicting_label_type_is_rejected() {
    let (_db, ds) = quickstart();
    let err = ds
        .add_sample(json!({"ground_truth": {"_cls": "Classification", "label": "x"}}))
        .unwrap_err();
    assert!(err.to_string().contains("holds Detections labels"));
}

#[test]
fn non_label_field_lookup_errors() {
    let (_db, ds) = quickstart();
    assert!(ds.label_field("filepath").is_err());
    assert!(ds.label_field("missing").is_err());
    assert_eq!(
        ds.label_field_path("ground_truth", Some("id")).unwrap(),
        "ground_truth.detections.id"
    );
}

#[test]
fn update_sample_replaces_fields() {
    let (_db, ds) = quickstart();
    ds.update_sample(&json!({"id": "s1", "filepath": "/moved.jpg"}))
        .unwrap();
    assert_eq!(ds.sample("s1").unwrap().unwrap()["filepath"], json!("/moved.jpg"));
    assert!(ds.update_sample(&json!({"id": "nope", "x": 1})).is_err());
}

#[test]
fn delete_samples_by_id() {
    let (_db, ds) = quickstart();
    assert_eq!(ds.delete_samples(&["s2".to_string(), "zz".to_string()]).unwrap(), 1);
    assert_eq!(ds.count().unwrap(), 2);
}

#[test]
fn set_labels_by_id_upserts() {
    let (_db, ds) = quickstart();
    let written = ds
        .set_labels_by_id(
            "ground_truth",
            &["s1".to_string(), "s3".to_string()],
            &[
                json!([det("a", "lion", json!({}))]),
                json!([det("n", "new", json!({}))]),
            ],
        )
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(find_label(&ds, "s1", "ground_truth", "a").unwrap()["label"], json!("lion"));
    assert!(find_label(&ds, "s1", "ground_truth", "b").is_some());
    assert!(find_label(&ds, "s3", "ground_truth", "n").is_some());
}

#[test]
fn set_labels_by_id_into_null_field_creates_container() {
    let (_db, ds) = quickstart();
    ds.set_labels_by_id("predictions", &["s3".to_string()], &[json!([det("p9", "cat", json!({}))])])
        .unwrap();
    let s3 = ds.sample("s3").unwrap().unwrap();
    assert_eq!(s3["predictions"]["_cls"], json!("Detections"));
    assert_eq!(s3["predictions"]["detections"][0]["id"], json!("p9"));
}

#[test]
fn delete_labels_across_samples() {
    let (_db, ds) = quickstart();
    let ids: HashSet<String> = ["a".to_string(), "c".to_string()].into();
    assert_eq!(ds.delete_labels(&ids, "ground_truth").unwrap(), 2);
    assert_eq!(label_ids(&ds, "ground_truth"), vec!["b"]);
}

#[test]
fn tag_and_untag_all_labels() {
    let (_db, ds) = quickstart();
    ds.tag_labels(&["review"], "predictions".into()).unwrap();
    let counts = ds.count_label_tags(FieldSelection::All).unwrap();
    assert_eq!(counts.get("review"), Some(&3));

    ds.untag_labels(&["review"], FieldSelection::All).unwrap();
    assert!(ds.count_label_tags(FieldSelection::All).unwrap().is_empty());
    assert!(tags(&find_label(&ds, "s1", "predictions", "p1").unwrap()).is_empty());
}

#[test]
fn scalar_label_fields() {
    let ds = Dataset::new("scalars");
    ds.add_sample(json!({"id": "s1", "best": {"_cls": "Detection", "id": "x", "label": "cat"}}))
        .unwrap();
    ds.set_labels_by_id(
        "best",
        &["s1".to_string()],
        &[json!({"_cls": "Detection", "id": "x", "label": "dog"})],
    )
    .unwrap();
    assert_eq!(ds.values("best.label", false).unwrap(), vec![json!("dog")]);
    assert_eq!(ds.label_field_path("best", Some("id")).unwrap(), "best.id");
}
