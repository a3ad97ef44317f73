//! Write-back of patch edits to the source collection.

use patches_db::labels::detection;
use patches_db::{Dataset, FieldSelection, SampleCollection};
use serde_json::json;

use crate::common::{find_label, label_ids, label_names, quickstart};

#[test]
fn saved_patches_round_trip_to_source() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();

    for mut patch in view.iter_patches().unwrap() {
        let label = patch.label_mut("ground_truth").unwrap();
        let det = &mut label["detections"][0];
        let name = det["label"].as_str().unwrap().to_string();
        det["label"] = json!(format!("{name}-edited"));
        det["tags"] = json!(["edited"]);
        patch.save().unwrap();
    }

    assert_eq!(
        label_names(&ds, "ground_truth"),
        vec!["cat-edited", "dog-edited", "cat-edited"]
    );
    for patch in view.iter_patches().unwrap() {
        let written = &patch.label("ground_truth").unwrap()["detections"][0];
        let id = written["id"].as_str().unwrap();
        let stored = find_label(&ds, patch.sample_id(), "ground_truth", id).unwrap();
        assert_eq!(&stored, written);
    }
}

#[test]
fn single_save_keeps_list_container_shape() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();
    let patch = view.first().unwrap().unwrap();
    patch.save().unwrap();

    let s1 = ds.sample("s1").unwrap().unwrap();
    assert_eq!(s1["ground_truth"]["_cls"], json!("Detections"));
    let dets = s1["ground_truth"]["detections"].as_array().unwrap();
    assert_eq!(dets.len(), 2);
    assert!(dets.iter().all(|d| d["_cls"] == json!("Detection")));
}

#[test]
fn scalar_fields_write_bare_labels() {
    let ds = Dataset::new("scalars");
    ds.add_samples([
        json!({"id": "s1", "best": detection("cat", [0.0, 0.0, 0.5, 0.5])}),
        json!({"id": "s2", "best": null}),
    ])
    .unwrap();
    let view = ds.to_patches("best").unwrap();
    assert_eq!(view.count().unwrap(), 1);

    let mut patch = view.first().unwrap().unwrap();
    patch.label_mut("best").unwrap()["label"] = json!("lynx");
    patch.save().unwrap();

    let s1 = ds.sample("s1").unwrap().unwrap();
    assert_eq!(s1["best"]["_cls"], json!("Detection"));
    assert_eq!(s1["best"]["label"], json!("lynx"));
    assert!(s1["best"].get("detections").is_none());
    assert!(ds.sample("s2").unwrap().unwrap()["best"].is_null());
}

#[test]
fn deleted_patches_delete_source_labels_on_save() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();
    let p_b = view.ids_map("ground_truth").unwrap()["b"].clone();

    view.patches_dataset().delete_samples(&[p_b]).unwrap();
    // Nothing is written back until the view is saved.
    assert_eq!(label_ids(&ds, "ground_truth"), vec!["a", "b", "c"]);

    view.save(FieldSelection::All).unwrap();
    assert_eq!(label_ids(&ds, "ground_truth"), vec!["a", "c"]);
    assert_eq!(label_ids(&ds, "predictions"), vec!["p1", "p2", "p3"]);
}

#[test]
fn saving_twice_is_idempotent() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();
    view.save(FieldSelection::All).unwrap();
    let once = ds.samples().unwrap();
    view.save(FieldSelection::All).unwrap();
    assert_eq!(ds.samples().unwrap(), once);
}

#[test]
fn saving_untracked_fields_does_not_sync() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();
    let pid = view.ids_map("ground_truth").unwrap()["a"].clone();

    // Edit the patches dataset directly, bypassing write-back.
    let mut doc = view.patches_dataset().sample(&pid).unwrap().unwrap();
    doc["ground_truth"]["detections"][0]["label"] = json!("tiger");
    view.patches_dataset().update_sample(&doc).unwrap();

    view.save("uniqueness").unwrap();
    assert_eq!(find_label(&ds, "s1", "ground_truth", "a").unwrap()["label"], json!("cat"));

    view.save(vec!["uniqueness", "ground_truth"]).unwrap();
    assert_eq!(find_label(&ds, "s1", "ground_truth", "a").unwrap()["label"], json!("tiger"));
}

#[test]
fn set_values_syncs_only_the_visible_patches() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();
    view.limit(1)
        .set_values("ground_truth.detections.label", vec![json!(["X"])])
        .unwrap();

    assert_eq!(label_names(&ds, "ground_truth"), vec!["X", "dog", "cat"]);
    assert_eq!(label_names(&view, "ground_truth"), vec!["X", "dog", "cat"]);
}

#[test]
fn set_values_on_untracked_field_stays_local() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();
    view.set_values("reviewed", vec![json!(true); 3]).unwrap();

    assert_eq!(view.values("reviewed", false).unwrap(), vec![json!(true); 3]);
    assert!(ds.values("reviewed", true).unwrap().is_empty());
}

#[test]
fn saving_a_skipped_view_drops_hidden_patches() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();
    view.skip(1).save(FieldSelection::All).unwrap();

    assert_eq!(view.count().unwrap(), 2);
    assert_eq!(label_ids(&ds, "ground_truth"), vec!["b", "c"]);
}

#[test]
fn deletions_are_scoped_to_the_source_view() {
    let (_db, ds) = quickstart();
    let source = ds.view().select(["s2"]);
    let view = source.to_patches("ground_truth").unwrap();
    assert_eq!(view.count().unwrap(), 1);

    let pid = view.first().unwrap().unwrap().id().to_string();
    view.patches_dataset().delete_samples(&[pid]).unwrap();
    view.save(FieldSelection::All).unwrap();

    assert_eq!(label_ids(&ds, "ground_truth"), vec!["a", "b"]);
}

#[test]
fn saving_fields_of_a_limited_view_keeps_hidden_patches() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();

    view.limit(1).save("uniqueness").unwrap();
    assert_eq!(view.count().unwrap(), 3);

    view.save(FieldSelection::All).unwrap();
    assert_eq!(label_ids(&ds, "ground_truth"), vec!["a", "b", "c"]);
}

#[test]
fn saving_a_tracked_field_of_a_limited_view_deletes_nothing() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();

    view.limit(1).save("ground_truth").unwrap();
    assert_eq!(view.count().unwrap(), 3);
    assert_eq!(label_ids(&ds, "ground_truth"), vec!["a", "b", "c"]);
}
