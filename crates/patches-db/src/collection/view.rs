//! DatasetView: a dataset handle plus an ordered list of stages.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Result, StorageError};
use crate::patches::{PatchesStage, PatchesView, PipelineStage};
use crate::query::stages::apply_stages;
use crate::query::ViewStage;
use crate::schema::LabelField;
use crate::types::{FieldSelection, LabelTagEdit};

use super::dataset::Dataset;
use super::traits::SampleCollection;

/// A read view over a dataset. Stage builders return a new view; the
/// receiver is left unchanged.
#[derive(Debug, Clone)]
pub struct DatasetView {
    dataset: Dataset,
    stages: Vec<ViewStage>,
}

impl DatasetView {
    pub fn new(dataset: Dataset, stages: Vec<ViewStage>) -> Self {
        Self { dataset, stages }
    }

    pub fn stages(&self) -> &[ViewStage] {
        &self.stages
    }

    /// True if any stage rewrites label contents.
    pub fn filters_labels(&self) -> bool {
        self.stages.iter().any(ViewStage::filters_labels)
    }

    // -----------------------------------------------------------------------
    // Stage builders
    // -----------------------------------------------------------------------

    pub fn add_stage(&self, stage: ViewStage) -> Self {
        let mut stages = self.stages.clone();
        stages.push(stage);
        Self::new(self.dataset.clone(), stages)
    }

    pub fn match_filter(&self, filter: Value) -> Self {
        self.add_stage(ViewStage::Match(filter))
    }

    pub fn exists(&self, field: &str) -> Self {
        self.add_stage(ViewStage::Exists {
            field: field.to_string(),
            exists: true,
        })
    }

    pub fn select<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_stage(ViewStage::Select(ids.into_iter().map(Into::into).collect()))
    }

    pub fn exclude<I, S>(&self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_stage(ViewStage::Exclude(ids.into_iter().map(Into::into).collect()))
    }

    pub fn sort_by(&self, field: &str, descending: bool) -> Self {
        self.add_stage(ViewStage::SortBy {
            field: field.to_string(),
            descending,
        })
    }

    pub fn skip(&self, n: usize) -> Self {
        self.add_stage(ViewStage::Skip(n))
    }

    pub fn limit(&self, n: usize) -> Self {
        self.add_stage(ViewStage::Limit(n))
    }

    pub fn filter_labels(&self, field: &str, filter: Value, only_matches: bool) -> Self {
        self.add_stage(ViewStage::FilterLabels {
            field: field.to_string(),
            filter,
            only_matches,
        })
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Write the contents of this view back to the dataset.
    ///
    /// Saving every field deletes the samples not in the view. Label contents
    /// filtered out by the view are lost for the saved fields.
    pub fn save(&self, fields: impl Into<FieldSelection>) -> Result<()> {
        let fields = fields.into();
        let docs = self.samples()?;
        self.dataset.save_view(docs, &fields)
    }

    /// Write one value per sample of the view at `path`.
    ///
    /// When the path descends through a list, the value for a sample must be
    /// a list of the same length, written element by element, e.g.
    /// `gt.detections.label` takes one list of labels per sample. Writes below
    /// a label field are merged back by label id, so filtered labels are kept.
    pub fn set_values(&self, path: &str, values: Vec<Value>) -> Result<()> {
        let mut docs = self.samples()?;
        if values.len() != docs.len() {
            return Err(StorageError::ValueCountMismatch {
                path: path.to_string(),
                expected: docs.len(),
                received: values.len(),
            }
            .into());
        }

        let parts: Vec<&str> = path.split('.').collect();
        for (doc, value) in docs.iter_mut().zip(values) {
            write_path(doc, &parts, value, path)?;
        }
        self.dataset.write_view_field(path, &docs)
    }

    pub fn reload(&self) -> Result<()> {
        self.dataset.reload()
    }

    pub fn to_patches(&self, field: &str) -> Result<PatchesView> {
        PatchesStage::to_patches(field).load_view(Arc::new(self.clone()))
    }

    pub fn to_evaluation_patches(&self, eval_key: &str) -> Result<PatchesView> {
        PatchesStage::to_evaluation_patches(eval_key).load_view(Arc::new(self.clone()))
    }
}

/// Set `value` at `parts` below `target`, fanning out element-wise when an
/// intermediate value is a list.
fn write_path(target: &mut Value, parts: &[&str], value: Value, path: &str) -> Result<()> {
    if let Value::Array(items) = target {
        let received = match &value {
            Value::Array(values) => values.len(),
            _ => 1,
        };
        let Value::Array(values) = value else {
            return Err(mismatch(path, items.len(), received));
        };
        if values.len() != items.len() {
            return Err(mismatch(path, items.len(), received));
        }
        for (item, v) in items.iter_mut().zip(values) {
            write_path(item, parts, v, path)?;
        }
        return Ok(());
    }

    let Some((head, rest)) = parts.split_first() else {
        *target = value;
        return Ok(());
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let child = &mut target[*head];
    if rest.is_empty() {
        *child = value;
        Ok(())
    } else {
        write_path(child, rest, value, path)
    }
}

fn mismatch(path: &str, expected: usize, received: usize) -> crate::error::PatchesDbError {
    StorageError::ValueCountMismatch {
        path: path.to_string(),
        expected,
        received,
    }
    .into()
}

impl SampleCollection for DatasetView {
    fn name(&self) -> String {
        self.dataset.name()
    }

    fn dataset(&self) -> Dataset {
        self.dataset.clone()
    }

    fn all_stages(&self) -> Vec<PipelineStage> {
        self.stages.iter().cloned().map(PipelineStage::View).collect()
    }

    fn label_field(&self, field: &str) -> Result<LabelField> {
        self.dataset.label_field(field)
    }

    fn label_fields(&self) -> Result<Vec<LabelField>> {
        self.dataset.label_fields()
    }

    fn samples(&self) -> Result<Vec<Value>> {
        let samples = self.dataset.samples()?;
        if self.stages.is_empty() {
            return Ok(samples);
        }
        let schema = self.dataset.schema()?;
        apply_stages(samples, &self.stages, &schema, &self.dataset.name())
    }

    fn select_labels(&self, ids: &[String], field: &str) -> Result<DatasetView> {
        Ok(self.add_stage(ViewStage::SelectLabels {
            ids: ids.to_vec(),
            fields: vec![field.to_string()],
        }))
    }

    fn edit_label_tags(&self, edit: &LabelTagEdit, fields: &FieldSelection) -> Result<()> {
        for field in self.label_fields()? {
            if !fields.contains(&field.name) {
                continue;
            }
            if self.stages.is_empty() {
                self.dataset.edit_tags_by_id(&field.name, None, edit)?;
                continue;
            }
            let ids: HashSet<String> = self
                .values(&field.id_path(), true)?
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect();
            if !ids.is_empty() {
                self.dataset.edit_tags_by_id(&field.name, Some(&ids), edit)?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
