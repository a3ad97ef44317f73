//! Evaluation patches: one patch per tp/fp/fn, tracking both label fields.

use patches_db::error::{SchemaError, StorageError};
use patches_db::{Dataset, EvaluationConfig, FieldSelection, PatchesDbError, SampleCollection};
use serde_json::json;

use crate::common::{find_label, label_ids, quickstart, tags};

#[test]
fn fields_come_from_the_evaluation_run() {
    let (_db, ds) = quickstart();
    let view = ds.to_evaluation_patches("eval").unwrap();
    assert_eq!(view.gt_field(), Some("ground_truth"));
    assert_eq!(view.pred_field(), Some("predictions"));
    assert_eq!(view.patches_field(), None);
    assert_eq!(
        view.tracked_fields().label_fields(),
        vec!["ground_truth", "predictions"]
    );
}

#[test]
fn one_patch_per_outcome() {
    let (_db, ds) = quickstart();
    let view = ds.to_evaluation_patches("eval").unwrap();
    assert_eq!(
        view.values("type", false).unwrap(),
        vec![json!("tp"), json!("fn"), json!("fp"), json!("tp")]
    );
    assert_eq!(
        view.values("iou", false).unwrap(),
        vec![json!(0.9), json!(null), json!(null), json!(0.7)]
    );
    assert_eq!(
        view.match_filter(json!({"type": "tp"})).count().unwrap(),
        2
    );
}

#[test]
fn saved_patch_writes_both_fields() {
    let (_db, ds) = quickstart();
    let view = ds.to_evaluation_patches("eval").unwrap();
    let mut patch = view.first().unwrap().unwrap();
    patch.label_mut("predictions").unwrap()["detections"][0]["label"] = json!("tabby");
    patch.label_mut("ground_truth").unwrap()["detections"][0]["label"] = json!("kitten");
    patch.save().unwrap();

    assert_eq!(find_label(&ds, "s1", "predictions", "p1").unwrap()["label"], json!("tabby"));
    assert_eq!(find_label(&ds, "s1", "ground_truth", "a").unwrap()["label"], json!("kitten"));
}

#[test]
fn dropping_false_positives_deletes_predictions() {
    let (_db, ds) = quickstart();
    let view = ds.to_evaluation_patches("eval").unwrap();
    view.match_filter(json!({"type": {"$ne": "fp"}}))
        .save(FieldSelection::All)
        .unwrap();

    assert_eq!(view.count().unwrap(), 3);
    assert_eq!(label_ids(&ds, "predictions"), vec!["p1", "p3"]);
    assert_eq!(label_ids(&ds, "ground_truth"), vec!["a", "b", "c"]);
}

#[test]
fn save_restricted_to_ground_truth_keeps_predictions() {
    let (_db, ds) = quickstart();
    let view = ds.to_evaluation_patches("eval").unwrap();
    view.match_filter(json!({"type": "tp"}))
        .save("ground_truth")
        .unwrap();

    // The fn patch is gone, so its ground truth label is deleted; the
    // prediction field is not synced.
    assert_eq!(label_ids(&ds, "ground_truth"), vec!["a", "c"]);
    assert_eq!(label_ids(&ds, "predictions"), vec!["p1", "p2", "p3"]);
}

#[test]
fn tagging_false_positives() {
    let (_db, ds) = quickstart();
    let view = ds.to_evaluation_patches("eval").unwrap();
    view.match_filter(json!({"type": "fp"}))
        .tag_labels(&["false_alarm"], FieldSelection::All)
        .unwrap();

    assert_eq!(tags(&find_label(&ds, "s1", "predictions", "p2").unwrap()), vec!["false_alarm"]);
    let counts = ds.count_label_tags(FieldSelection::All).unwrap();
    assert_eq!(counts.get("false_alarm"), Some(&1));
}

#[test]
fn unknown_evaluation_key() {
    let (_db, ds) = quickstart();
    assert!(matches!(
        ds.to_evaluation_patches("nope"),
        Err(PatchesDbError::Storage(StorageError::EvaluationNotFound { .. }))
    ));
}

#[test]
fn evaluation_fields_must_be_lists() {
    let ds = Dataset::new("scalars");
    ds.add_sample(json!({"id": "s1",
        "gt": {"_cls": "Detection", "id": "g", "label": "cat"},
        "pred": {"_cls": "Detection", "id": "p", "label": "cat"}}))
        .unwrap();
    ds.register_evaluation("eval", EvaluationConfig::new("gt", "pred"))
        .unwrap();
    assert!(matches!(
        ds.to_evaluation_patches("eval"),
        Err(PatchesDbError::Schema(SchemaError::UnsupportedLabelType { .. }))
    ));
}

#[test]
fn evaluation_patches_of_a_view() {
    let (_db, ds) = quickstart();
    let view = ds.view().select(["s2"]).to_evaluation_patches("eval").unwrap();
    assert_eq!(view.count().unwrap(), 1);
    assert_eq!(view.get_evaluation_info("eval").unwrap().config.gt_field, "ground_truth");
}
