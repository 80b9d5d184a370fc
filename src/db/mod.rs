pub mod schema_init;
pub mod store;

pub use store::{CatalogCounts, CatalogStore, StoreError};
