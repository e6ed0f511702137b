use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by goal-file and completion-log operations.
///
/// Front ends message these differently: rejected input (`EmptyObjective`
/// through `OutOfRange`) is the user's to fix and nothing was written;
/// `NotFound` means there is no goal yet; `Io`/`Encode` are environment
/// failures that leave the previous on-disk state in place.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No goal file exists under the todos directory.
    #[error("no goal file found under {}", .0.display())]
    NotFound(PathBuf),

    #[error("objective must not be empty")]
    EmptyObjective,

    #[error("add at least one key result")]
    NoKeyResults,

    #[error("every key result needs content")]
    BlankKeyResult,

    #[error("key result {index} does not exist ({len} present)")]
    OutOfRange { index: usize, len: usize },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("completion record is not valid JSON: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the error was caused by the caller's input rather than the
    /// environment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyObjective
                | Self::NoKeyResults
                | Self::BlankKeyResult
                | Self::OutOfRange { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
