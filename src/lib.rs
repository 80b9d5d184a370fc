//! menusync: a cached Menu -> Submenu -> Dish catalog kept in step with an
//! external spreadsheet.

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod monitoring;
pub mod sync;
