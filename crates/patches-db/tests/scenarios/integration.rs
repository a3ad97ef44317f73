//! End-to-end workflows across datasets, views and patches views.

use patches_db::labels::{detection, detections, with_confidence};
use patches_db::{Database, Dataset, FieldSelection, SampleCollection};
use serde_json::json;

use crate::common::{label_ids, label_names, quickstart, tags};

#[test]
fn deleting_a_patch_deletes_its_label() {
    let ds = Dataset::new("scenario");
    ds.add_sample(json!({"id": "s1", "F": {"_cls": "Detections", "detections": [
        {"id": "a"}, {"id": "b"}]}}))
        .unwrap();

    let view = ds.to_patches("F").unwrap();
    assert_eq!(view.count().unwrap(), 2);
    let ids = view.ids_map("F").unwrap();
    let p_b = ids["b"].clone();
    assert_ne!(ids["a"], p_b);

    view.patches_dataset().delete_samples(&[p_b]).unwrap();
    view.save(FieldSelection::All).unwrap();

    assert_eq!(ds.values("F.detections.id", true).unwrap(), vec![json!("a")]);
}

#[test]
fn review_workflow() {
    let db = Database::new();
    let ds = db.create_dataset("review").unwrap();
    ds.add_samples([0.9, 0.7, 0.4, 0.2].into_iter().enumerate().map(|(i, car)| {
        json!({
            "filepath": format!("/images/{i:03}.jpg"),
            "predictions": detections(vec![
                with_confidence(detection("car", [0.1, 0.1, 0.2, 0.2]), car),
                with_confidence(detection("person", [0.5, 0.5, 0.1, 0.3]), 0.3),
            ]),
        })
    }))
    .unwrap();

    // Review low-confidence predictions only.
    let patches_view = ds.to_patches("predictions").unwrap();
    let view = patches_view.filter_labels("predictions", json!({"confidence": {"$lt": 0.5}}), true);
    assert_eq!(view.count().unwrap(), 6);

    view.tag_labels(&["review"], FieldSelection::All).unwrap();
    assert_eq!(ds.count_label_tags(FieldSelection::All).unwrap()["review"], 6);

    // Relabel every reviewed person as a pedestrian.
    for mut patch in view.match_filter(json!({"predictions.detections.label": "person"}))
        .iter_patches()
        .unwrap()
    {
        patch.label_mut("predictions").unwrap()["detections"][0]["label"] = json!("pedestrian");
        patch.save().unwrap();
    }
    let names = label_names(&ds, "predictions");
    assert_eq!(names.iter().filter(|n| *n == "pedestrian").count(), 4);
    assert_eq!(names.iter().filter(|n| *n == "car").count(), 4);

    // Drop the low-confidence cars from the patches and write back through
    // the unfiltered view, which still holds the confident ones.
    let patches = patches_view.patches_dataset();
    let low_cars = view
        .match_filter(json!({"predictions.detections.label": "car"}))
        .values("id", false)
        .unwrap()
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect::<Vec<_>>();
    assert_eq!(low_cars.len(), 2);
    patches.delete_samples(&low_cars).unwrap();
    patches_view.save(FieldSelection::All).unwrap();

    assert_eq!(label_ids(&ds, "predictions").len(), 6);
    let confidences: Vec<f64> = ds
        .values("predictions.detections.confidence", true)
        .unwrap()
        .into_iter()
        .filter_map(|v| v.as_f64())
        .collect();
    assert!(confidences.iter().all(|c| *c >= 0.3));
}

#[test]
fn filtered_save_writes_filtered_contents() {
    let (_db, ds) = quickstart();
    let view = ds
        .to_patches("ground_truth")
        .unwrap()
        .filter_labels("ground_truth", json!({"label": "dog"}), false);

    // Every patch is kept: the filter empties the cat patches but does not
    // drop them from the view.
    assert_eq!(view.count().unwrap(), 3);
    view.save(FieldSelection::All).unwrap();

    // Saving the filtered contents empties the cat patches, so their labels
    // are deleted from the source.
    assert_eq!(label_ids(&ds, "ground_truth"), vec!["b"]);
}

#[test]
fn patch_tags_are_queryable_in_source() {
    let (_db, ds) = quickstart();
    let view = ds.to_patches("ground_truth").unwrap();
    let mut patch = view.patch(&view.ids_map("ground_truth").unwrap()["c"]).unwrap();
    patch.label_mut("ground_truth").unwrap()["detections"][0]["tags"] = json!(["hard"]);
    patch.save().unwrap();

    let tagged = ds.view().filter_labels("ground_truth", json!({"tags": "hard"}), true);
    assert_eq!(tagged.values("id", false).unwrap(), vec![json!("s2")]);
    let s2 = ds.sample("s2").unwrap().unwrap();
    assert_eq!(tags(&s2["ground_truth"]["detections"][0]), vec!["hard"]);
}
