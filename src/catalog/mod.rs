//! Menu -> Submenu -> Dish catalog: records, the cached read path and the
//! write path that keeps the cache honest.

pub mod model;
pub mod reader;
pub mod service;

pub use reader::CatalogReader;
pub use service::CatalogService;
