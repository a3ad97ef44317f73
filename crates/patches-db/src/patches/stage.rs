//! Patches extraction stages and the full pipeline stage type.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collection::SampleCollection;
use crate::error::Result;
use crate::query::ViewStage;
use crate::types::PatchesConfig;

use super::extract::make_patches_dataset;
use super::view::PatchesView;

/// A stage that turns a sample collection into a collection of patches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "args", rename_all = "snake_case")]
pub enum PatchesStage {
    /// One patch per label of `field`.
    ToPatches {
        field: String,
        #[serde(default)]
        config: PatchesConfig,
    },
    /// One patch per true positive, false positive and false negative of
    /// the evaluation run `eval_key`.
    ToEvaluationPatches {
        eval_key: String,
        #[serde(default)]
        config: PatchesConfig,
    },
}

impl PatchesStage {
    pub fn to_patches(field: &str) -> Self {
        PatchesStage::ToPatches {
            field: field.to_string(),
            config: PatchesConfig::default(),
        }
    }

    pub fn to_evaluation_patches(eval_key: &str) -> Self {
        PatchesStage::ToEvaluationPatches {
            eval_key: eval_key.to_string(),
            config: PatchesConfig::default(),
        }
    }

    pub fn with_config(mut self, new_config: PatchesConfig) -> Self {
        match &mut self {
            PatchesStage::ToPatches { config, .. }
            | PatchesStage::ToEvaluationPatches { config, .. } => *config = new_config,
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatchesStage::ToPatches { .. } => "ToPatches",
            PatchesStage::ToEvaluationPatches { .. } => "ToEvaluationPatches",
        }
    }

    pub fn config(&self) -> &PatchesConfig {
        match self {
            PatchesStage::ToPatches { config, .. }
            | PatchesStage::ToEvaluationPatches { config, .. } => config,
        }
    }

    /// Extract a fresh patches dataset from `source` and wrap it in a view.
    pub fn load_view(&self, source: Arc<dyn SampleCollection>) -> Result<PatchesView> {
        let dataset = make_patches_dataset(self, source.as_ref())?;
        debug!(
            stage = self.name(),
            source = %source.name(),
            patches = %dataset.name(),
            "loaded patches view"
        );
        PatchesView::new(source, self.clone(), dataset)
    }
}

/// Any stage of a pipeline, as reported by `all_stages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineStage {
    View(ViewStage),
    Patches(PatchesStage),
}

impl PipelineStage {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::View(stage) => stage.name(),
            PipelineStage::Patches(stage) => stage.name(),
        }
    }
}

impl From<ViewStage> for PipelineStage {
    fn from(stage: ViewStage) -> Self {
        PipelineStage::View(stage)
    }
}

impl From<PatchesStage> for PipelineStage {
    fn from(stage: PatchesStage) -> Self {
        PipelineStage::Patches(stage)
    }
}
