pub mod database;
pub mod dataset;
pub mod traits;
pub mod view;

pub use database::Database;
pub use dataset::Dataset;
pub use traits::SampleCollection;
pub use view::DatasetView;
