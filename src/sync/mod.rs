//! Mirrors an external spreadsheet into the catalog.

pub mod classifier;
pub mod engine;
pub mod replay;
pub mod source;

pub use classifier::{classify, ClassifyError, RowInstruction, SyncContext, Table};
pub use engine::{PassOutcome, ReconciliationEngine, SyncError, SyncSettings, SyncState};
pub use replay::{plan_replay, ReplayError, ReplayPlan};
pub use source::{FetchError, SheetsSource, StaticSource, TableSource};
