use serde::{Deserialize, Serialize};

use dayokr_store::Goal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// One controller-to-view push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Full snapshot.  `None` means no goal exists for today yet and the
    /// view should show the editing form.
    State { goal: Option<Goal> },
    /// A `save` command was persisted successfully.
    Saved,
    /// A user-visible status message that is not a hard failure.
    Notice { level: NoticeLevel, message: String },
    /// A store or log operation failed; nothing was written.
    Error { message: String },
    /// Save-time rewriting is in flight; the view may show a spinner.
    RewriteStarted,
    RewriteFinished,
    /// The controller dropped this view after a `cancel`.
    Closed,
}
