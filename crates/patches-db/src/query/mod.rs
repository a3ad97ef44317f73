pub mod operators;
pub mod stages;
pub mod values;

pub use stages::ViewStage;
pub use values::Values;
