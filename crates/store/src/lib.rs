pub mod error;
pub mod lines;
pub mod log;
pub mod model;
pub mod store;

pub use error::{Result, StoreError};
pub use log::{CompletionLog, CompletionRecord, TaskRecord};
pub use model::{Goal, KeyResult, KrPatch, now_hhmm, rebalance, today_key};
pub use store::GoalStore;
