//! Materialization of patches datasets.
//!
//! Extraction copies label documents verbatim, ids included, so every patch
//! can be written back to its source sample by label id.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::debug;

use crate::collection::{Dataset, SampleCollection};
use crate::error::{Result, SchemaError};
use crate::query::stages::{label_id, sample_id};
use crate::schema::{LabelField, LabelType};
use crate::types::{new_id, PatchesConfig};

use super::stage::PatchesStage;

/// Build the patches dataset for `stage` over `source`.
pub(crate) fn make_patches_dataset(
    stage: &PatchesStage,
    source: &dyn SampleCollection,
) -> Result<Dataset> {
    match stage {
        PatchesStage::ToPatches { field, config } => make_patches(source, field, config),
        PatchesStage::ToEvaluationPatches { eval_key, config } => {
            make_evaluation_patches(source, eval_key, config)
        }
    }
}

fn make_patches(source: &dyn SampleCollection, field: &str, config: &PatchesConfig) -> Result<Dataset> {
    let label_field = source.label_field(field)?;
    if !matches!(
        label_field.label_type,
        LabelType::Detection | LabelType::Detections | LabelType::Polyline | LabelType::Polylines
    ) {
        return Err(unsupported("ToPatches", &label_field));
    }

    let mut patches = Vec::new();
    for sample in source.samples()? {
        let Some(sid) = sample_id(&sample) else {
            continue;
        };
        let Some(value) = sample.get(field) else {
            continue;
        };
        for label in label_field.labels(value) {
            let mut patch = patch_doc(&sample, sid, config);
            patch.insert(field.to_string(), label_field.container(vec![label.clone()]));
            patches.push(Value::Object(patch));
        }
    }

    let dataset = create_patches_dataset(source)?;
    dataset.add_label_field(field, label_field.label_type)?;
    let count = dataset.add_samples(patches)?.len();
    debug!(source = %source.name(), field, count, "extracted patches");
    Ok(dataset)
}

fn make_evaluation_patches(
    source: &dyn SampleCollection,
    eval_key: &str,
    config: &PatchesConfig,
) -> Result<Dataset> {
    let info = source.get_evaluation_info(eval_key)?;
    let gt_field = source.label_field(&info.config.gt_field)?;
    let pred_field = source.label_field(&info.config.pred_field)?;
    for field in [&gt_field, &pred_field] {
        if !matches!(field.label_type, LabelType::Detections | LabelType::Polylines) {
            return Err(unsupported("ToEvaluationPatches", field));
        }
    }

    let type_key = eval_key.to_string();
    let match_key = format!("{eval_key}_id");
    let iou_key = format!("{eval_key}_iou");

    let mut patches = Vec::new();
    for sample in source.samples()? {
        let Some(sid) = sample_id(&sample) else {
            continue;
        };
        let gts = sample
            .get(&gt_field.name)
            .map(|v| gt_field.labels(v))
            .unwrap_or_default();
        let preds = sample
            .get(&pred_field.name)
            .map(|v| pred_field.labels(v))
            .unwrap_or_default();

        let mut matched: HashSet<&str> = HashSet::new();
        for gt in &gts {
            let outcome = match gt.get(&type_key).and_then(Value::as_str) {
                Some(outcome @ ("tp" | "fn")) => outcome,
                _ => continue,
            };
            let pred = if outcome == "tp" {
                let match_id = gt.get(&match_key).and_then(Value::as_str);
                preds
                    .iter()
                    .find(|p| match_id.is_some() && label_id(p) == match_id)
                    .copied()
            } else {
                None
            };
            if let Some(id) = pred.and_then(label_id) {
                matched.insert(id);
            }

            let mut patch = patch_doc(&sample, sid, config);
            patch.insert("type".to_string(), Value::String(outcome.to_string()));
            if let Some(iou) = gt.get(&iou_key).filter(|v| v.is_number()) {
                patch.insert("iou".to_string(), iou.clone());
            }
            patch.insert(gt_field.name.clone(), gt_field.container(vec![(*gt).clone()]));
            patch.insert(
                pred_field.name.clone(),
                pred_field.container(pred.into_iter().cloned().collect()),
            );
            patches.push(Value::Object(patch));
        }

        for pred in &preds {
            if label_id(pred).is_some_and(|id| matched.contains(id)) {
                continue;
            }
            let outcome = match pred.get(&type_key).and_then(Value::as_str) {
                Some(outcome @ ("tp" | "fp")) => outcome,
                _ => continue,
            };
            let mut patch = patch_doc(&sample, sid, config);
            patch.insert("type".to_string(), Value::String(outcome.to_string()));
            patch.insert(gt_field.name.clone(), gt_field.container(Vec::new()));
            patch.insert(pred_field.name.clone(), pred_field.container(vec![(*pred).clone()]));
            patches.push(Value::Object(patch));
        }
    }

    let dataset = create_patches_dataset(source)?;
    dataset.add_label_field(&gt_field.name, gt_field.label_type)?;
    dataset.add_label_field(&pred_field.name, pred_field.label_type)?;
    let count = dataset.add_samples(patches)?.len();
    debug!(source = %source.name(), eval_key, count, "extracted evaluation patches");
    Ok(dataset)
}

/// Skeleton of a patch: fresh id, back-reference and copied sample fields.
fn patch_doc(sample: &Value, sid: &str, config: &PatchesConfig) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert("id".to_string(), Value::String(new_id()));
    patch.insert("sample_id".to_string(), Value::String(sid.to_string()));
    for name in &config.other_fields {
        if name == "id" || name == "sample_id" {
            continue;
        }
        if let Some(value) = sample.get(name) {
            patch.insert(name.clone(), value.clone());
        }
    }
    patch
}

/// A new, empty patches dataset, registered alongside the source's root
/// dataset when that one belongs to a database. The registration lasts as
/// long as some view holds the dataset.
fn create_patches_dataset(source: &dyn SampleCollection) -> Result<Dataset> {
    let root = source.root_dataset();
    let name = format!("{}-patches-{}", root.name(), &new_id()[..12]);
    match root.database() {
        Some(db) => db.create_derived_dataset(&name),
        None => Ok(Dataset::new(name)),
    }
}

fn unsupported(stage: &str, field: &LabelField) -> crate::error::PatchesDbError {
    SchemaError::UnsupportedLabelType {
        stage: stage.to_string(),
        field: field.name.clone(),
        label_type: field.label_type.name().to_string(),
    }
    .into()
}
