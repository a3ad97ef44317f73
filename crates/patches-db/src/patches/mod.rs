//! Patches views: collections whose elements are single labels (or
//! evaluation outcomes) of a source collection, with write-back of label
//! edits to the source.

mod extract;
pub mod fields;
pub mod patch;
pub mod stage;
mod sync;
pub mod view;

pub use fields::TrackedFields;
pub use patch::Patch;
pub use stage::{PatchesStage, PipelineStage};
pub use view::PatchesView;
