use serde::{Deserialize, Serialize};

use dayokr_store::{KeyResult, KrPatch};

/// One user-triggered operation sent from a view to the controller.
///
/// Serialized with a `type` tag so a non-terminal front end could speak the
/// same protocol over a wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewCommand {
    /// Request the full current state.
    Init,
    /// Persist a freshly edited goal, optionally rewriting each key
    /// result's wording first.
    Save {
        objective: String,
        key_results: Vec<KeyResult>,
        use_rewriter: bool,
    },
    /// Close the editing surface without touching disk.
    Cancel,
    UpdateKr { index: usize, patch: KrPatch },
    AddKr { content: String },
    DeleteKr { index: usize },
    ReorderKr { from: usize, to: usize },
    /// Re-read the current file and push state again.
    Refresh,
    /// Archive the day: append to the completion log, prune old files.
    SaveLog {
        total_time: String,
        time_range: String,
    },
}
