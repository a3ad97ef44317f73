pub mod error;
pub mod types;

pub mod collection;
pub mod labels;
pub mod patches;
pub mod query;
pub mod schema;

pub use collection::{Database, Dataset, DatasetView, SampleCollection};
pub use error::{PatchesDbError, Result};
pub use patches::{Patch, PatchesStage, PatchesView, PipelineStage, TrackedFields};
pub use query::{Values, ViewStage};
pub use schema::{LabelField, LabelKind, LabelType};
pub use types::{EvaluationConfig, EvaluationInfo, FieldSelection, LabelTagEdit, PatchesConfig};
