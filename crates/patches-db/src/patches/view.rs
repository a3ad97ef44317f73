//! PatchesView: a queryable view over a materialized patches dataset.
//!
//! Edits go to the patches dataset first and are then written back to the
//! source collection by label id. Cloning a view clones its stages and
//! extraction stage but shares the patches dataset.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::collection::{Dataset, DatasetView, SampleCollection};
use crate::error::{Result, StorageError};
use crate::query::stages::sample_id;
use crate::query::ViewStage;
use crate::schema::{root_field, LabelField};
use crate::types::{FieldSelection, LabelTagEdit};

use super::fields::TrackedFields;
use super::patch::Patch;
use super::stage::{PatchesStage, PipelineStage};
use super::sync::{ids_map, SourceSync};

#[derive(Clone)]
pub struct PatchesView {
    source: Arc<dyn SampleCollection>,
    patches_stage: PatchesStage,
    patches_dataset: Dataset,
    tracked: TrackedFields,
    stages: Vec<ViewStage>,
}

impl fmt::Debug for PatchesView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchesView")
            .field("source", &self.source.name())
            .field("patches_stage", &self.patches_stage)
            .field("patches_dataset", &self.patches_dataset)
            .field("stages", &self.stages)
            .finish()
    }
}

impl PatchesView {
    /// Wrap an extracted patches dataset. Evaluation patches resolve their
    /// ground truth and prediction fields from the evaluation run here.
    pub(crate) fn new(
        source: Arc<dyn SampleCollection>,
        patches_stage: PatchesStage,
        patches_dataset: Dataset,
    ) -> Result<Self> {
        let tracked = match &patches_stage {
            PatchesStage::ToPatches { field, .. } => TrackedFields::Patches {
                field: field.clone(),
            },
            PatchesStage::ToEvaluationPatches { eval_key, .. } => {
                let info = source.get_evaluation_info(eval_key)?;
                TrackedFields::Evaluation {
                    eval_key: eval_key.clone(),
                    gt_field: info.config.gt_field,
                    pred_field: info.config.pred_field,
                }
            }
        };
        Ok(Self {
            source,
            patches_stage,
            patches_dataset,
            tracked,
            stages: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The collection the patches were extracted from.
    pub fn source_collection(&self) -> &Arc<dyn SampleCollection> {
        &self.source
    }

    pub fn patches_stage(&self) -> &PatchesStage {
        &self.patches_stage
    }

    pub fn patches_dataset(&self) -> &Dataset {
        &self.patches_dataset
    }

    pub fn stages(&self) -> &[ViewStage] {
        &self.stages
    }

    pub fn tracked_fields(&self) -> &TrackedFields {
        &self.tracked
    }

    /// The field the patches were extracted from.
    pub fn patches_field(&self) -> Option<&str> {
        match &self.tracked {
            TrackedFields::Patches { field } => Some(field.as_str()),
            TrackedFields::Evaluation { .. } => None,
        }
    }

    /// The ground truth field of an evaluation patches view.
    pub fn gt_field(&self) -> Option<&str> {
        match &self.tracked {
            TrackedFields::Evaluation { gt_field, .. } => Some(gt_field.as_str()),
            TrackedFields::Patches { .. } => None,
        }
    }

    /// The predictions field of an evaluation patches view.
    pub fn pred_field(&self) -> Option<&str> {
        match &self.tracked {
            TrackedFields::Evaluation { pred_field, .. } => Some(pred_field.as_str()),
            TrackedFields::Patches { .. } => None,
        }
    }

    /// This view's local stages over the patches dataset.
    fn local_view(&self) -> DatasetView {
        DatasetView::new(self.patches_dataset.clone(), self.stages.clone())
    }

    fn sync(&self) -> SourceSync<'_> {
        SourceSync::new(self.source.as_ref(), &self.patches_dataset)
    }

    /// True if a local stage rewrites label contents.
    pub fn filters_labels(&self) -> bool {
        self.stages.iter().any(ViewStage::filters_labels)
    }

    // -----------------------------------------------------------------------
    // Stage builders
    // -----------------------------------------------------------------------

    pub fn add_stage(&self, stage: ViewStage) -> Self {
        let mut view = self.clone();
        view.stages.push(stage);
        view
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

    /// Commit the view's contents to the patches dataset, then write the
    /// tracked label fields among `fields` back to the source.
    ///
    /// Saving every field deletes the patches outside the view from the
    /// patches dataset, so their labels are deleted from the source.
    pub fn save(&self, fields: impl Into<FieldSelection>) -> Result<()> {
        let fields = fields.into();
        self.local_view().save(fields.clone())?;

        let tracked = self.tracked.select(&fields);
        debug!(view = %self.name(), fields = ?tracked, "saving patches to source");
        self.sync().sync_root(&tracked)
    }

    /// Write one value per patch at `path`, then sync the field to the
    /// source if it is a tracked label field. Only patches in this view are
    /// synced.
    pub fn set_values(&self, path: &str, values: Vec<Value>) -> Result<()> {
        self.local_view().set_values(path, values)?;

        let field = root_field(path);
        if self.tracked.contains(field) {
            self.sync().sync_view_field(self, field)?;
        }
        Ok(())
    }

    /// Commit one patch document, then sync its labels to the source.
    pub(crate) fn save_patch(&self, doc: &Value) -> Result<()> {
        self.patches_dataset.merge_sample(doc, self.filters_labels())?;
        self.sync().sync_sample(doc, &self.tracked.label_fields())
    }

    /// Reload the source and regenerate the patches dataset from it.
    ///
    /// The current patches dataset is deleted; edits not yet saved to the
    /// source are lost.
    pub fn reload(&mut self) -> Result<()> {
        self.source.root_dataset().reload()?;

        if !self.patches_dataset.is_deleted() {
            self.patches_dataset.delete()?;
        }
        let view = self.patches_stage.load_view(Arc::clone(&self.source))?;
        debug!(
            view = %self.name(),
            patches = %view.patches_dataset.name(),
            "regenerated patches dataset"
        );
        self.patches_dataset = view.patches_dataset;
        self.tracked = view.tracked;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn iter_patches(&self) -> Result<impl Iterator<Item = Patch<'_>> + '_> {
        let docs = self.samples()?;
        Ok(docs.into_iter().map(move |doc| Patch::new(doc, self)))
    }

    pub fn first(&self) -> Result<Option<Patch<'_>>> {
        Ok(self.iter_patches()?.next())
    }

    /// The patch with the given id, if this view contains it.
    pub fn patch(&self, id: &str) -> Result<Patch<'_>> {
        self.iter_patches()?
            .find(|p| p.id() == id)
            .ok_or_else(|| {
                StorageError::SampleNotFound {
                    dataset: self.name(),
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// Label id → patch id for the labels of `field` in this view.
    pub fn ids_map(&self, field: &str) -> Result<HashMap<String, String>> {
        ids_map(self, &self.patches_dataset, field)
    }

    pub fn summary(&self) -> Result<String> {
        let mut out = String::new();
        out.push_str(&format!("Dataset:     {}\n", self.dataset_name()));
        out.push_str(&format!("Name:        {}\n", self.name()));
        out.push_str(&format!(
            "Num {}: {}\n",
            self.elements_str(),
            self.count()?
        ));
        out.push_str(&format!(
            "Label fields: {}\n",
            self.tracked.label_fields().join(", ")
        ));
        out.push_str("View stages:\n");
        for (i, stage) in self.all_stages().iter().enumerate() {
            out.push_str(&format!("    {}. {}\n", i + 1, stage.name()));
        }
        Ok(out)
    }
}

impl SampleCollection for PatchesView {
    fn name(&self) -> String {
        format!("{}-patches", self.dataset_name())
    }

    fn dataset(&self) -> Dataset {
        self.patches_dataset.clone()
    }

    fn root_dataset(&self) -> Dataset {
        self.source.root_dataset()
    }

    fn element_str(&self) -> &'static str {
        "patch"
    }

    fn elements_str(&self) -> &'static str {
        "patches"
    }

    fn all_stages(&self) -> Vec<PipelineStage> {
        let mut stages = self.source.all_stages();
        stages.push(PipelineStage::Patches(self.patches_stage.clone()));
        stages.extend(self.stages.iter().cloned().map(PipelineStage::View));
        stages
    }

    fn label_field(&self, field: &str) -> Result<LabelField> {
        self.patches_dataset.label_field(field)
    }

    fn label_fields(&self) -> Result<Vec<LabelField>> {
        self.patches_dataset.label_fields()
    }

    fn samples(&self) -> Result<Vec<Value>> {
        self.local_view().samples()
    }

    fn select_labels(&self, ids: &[String], field: &str) -> Result<DatasetView> {
        self.local_view().select_labels(ids, field)
    }

    /// Tag edits apply to the visible patches, then to the matching labels
    /// of the source.
    fn edit_label_tags(&self, edit: &LabelTagEdit, fields: &FieldSelection) -> Result<()> {
        self.local_view().edit_label_tags(edit, fields)?;
        let tracked = self.tracked.select(fields);
        self.sync().sync_label_tags(self, edit, &tracked)
    }
}
