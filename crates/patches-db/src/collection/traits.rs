//! The collection interface the patches layer is written against.
//!
//! `SampleCollection` is the narrow read/write surface shared by datasets,
//! dataset views and patches views. Label writes are routed to the backing
//! dataset by default; views only change what is read.

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::error::Result;
use crate::patches::PipelineStage;
use crate::query::Values;
use crate::schema::LabelField;
use crate::types::{EvaluationInfo, FieldSelection, LabelTagEdit};

use super::dataset::Dataset;
use super::view::DatasetView;

/// Read/write surface of a dataset or a view over one.
///
/// Implementors must be `Send + Sync` so handles can be shared freely.
pub trait SampleCollection: Send + Sync {
    /// Display name of the collection.
    fn name(&self) -> String;

    /// Name of the root dataset.
    fn dataset_name(&self) -> String {
        self.root_dataset().name()
    }

    /// The dataset whose samples this collection reads.
    fn dataset(&self) -> Dataset;

    /// The dataset at the origin of the pipeline.
    fn root_dataset(&self) -> Dataset {
        self.dataset()
    }

    fn element_str(&self) -> &'static str {
        "sample"
    }

    fn elements_str(&self) -> &'static str {
        "samples"
    }

    /// The full pipeline, expressed relative to the root dataset.
    fn all_stages(&self) -> Vec<PipelineStage>;

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// Resolve a label field to its descriptor.
    fn label_field(&self, field: &str) -> Result<LabelField>;

    /// Every label field of the collection.
    fn label_fields(&self) -> Result<Vec<LabelField>>;

    /// Storage path of a label field, or of an attribute of its labels.
    fn label_field_path(&self, field: &str, attr: Option<&str>) -> Result<String> {
        Ok(self.label_field(field)?.path(attr))
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Materialize the samples of the collection, in order.
    fn samples(&self) -> Result<Vec<Value>>;

    fn count(&self) -> Result<usize> {
        Ok(self.samples()?.len())
    }

    /// Run several `Values` aggregations in a single pass.
    fn aggregate(&self, aggregations: &[Values]) -> Result<Vec<Vec<Value>>> {
        let samples = self.samples()?;
        Ok(crate::query::values::aggregate(&samples, aggregations))
    }

    fn values(&self, path: &str, unwind: bool) -> Result<Vec<Value>> {
        let mut agg = Values::new(path);
        agg.unwind = unwind;
        let samples = self.samples()?;
        Ok(agg.collect(&samples))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Upsert raw label documents into `field` of the given samples.
    ///
    /// `docs[i]` is the field's label payload for `sample_ids[i]`: a list of
    /// label documents for list fields, a single document otherwise.
    fn set_labels_by_id(&self, field: &str, sample_ids: &[String], docs: &[Value]) -> Result<usize> {
        self.dataset().write_labels_by_id(field, sample_ids, docs)
    }

    /// Remove the labels with the given ids from `field`, collection-wide.
    fn delete_labels(&self, ids: &HashSet<String>, field: &str) -> Result<usize> {
        self.dataset().remove_labels_by_id(ids, field)
    }

    /// A view containing only the given labels of `field`.
    fn select_labels(&self, ids: &[String], field: &str) -> Result<DatasetView>;

    /// Apply a tag edit to every label of `fields` visible in the collection.
    fn edit_label_tags(&self, edit: &LabelTagEdit, fields: &FieldSelection) -> Result<()>;

    fn tag_labels(&self, tags: &[&str], fields: FieldSelection) -> Result<()> {
        let edit = LabelTagEdit::Add(tags.iter().map(|t| t.to_string()).collect());
        self.edit_label_tags(&edit, &fields)
    }

    fn untag_labels(&self, tags: &[&str], fields: FieldSelection) -> Result<()> {
        let edit = LabelTagEdit::Remove(tags.iter().map(|t| t.to_string()).collect());
        self.edit_label_tags(&edit, &fields)
    }

    /// Count label tags across the visible labels of `fields`.
    fn count_label_tags(&self, fields: FieldSelection) -> Result<BTreeMap<String, usize>> {
        let label_fields: Vec<LabelField> = self
            .label_fields()?
            .into_iter()
            .filter(|f| fields.contains(&f.name))
            .collect();

        let mut counts = BTreeMap::new();
        for sample in self.samples()? {
            for field in &label_fields {
                let Some(value) = sample.get(&field.name) else {
                    continue;
                };
                for label in field.labels(value) {
                    let tags = label.get("tags").and_then(Value::as_array);
                    for tag in tags.into_iter().flatten().filter_map(Value::as_str) {
                        *counts.entry(tag.to_string()).or_insert(0) += 1;
                    }
                }
            }
        }
        Ok(counts)
    }

    fn get_evaluation_info(&self, eval_key: &str) -> Result<EvaluationInfo> {
        self.root_dataset().evaluation_info(eval_key)
    }
}
