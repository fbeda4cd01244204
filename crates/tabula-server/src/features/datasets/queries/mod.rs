pub mod get;
pub mod list;

pub use get::GetDatasetQuery;
pub use list::{ListDatasetsError, ListDatasetsQuery};
