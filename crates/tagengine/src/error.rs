//! Error types for the tag engine.
//!
//! Provider failures are wrapped with the resource and operation they
//! happened on, so a single error line is enough to diagnose a failed run.

use std::io;
use std::path::PathBuf;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scanning, applying, backing up or restoring.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Provider call failed outside of any resource-specific operation.
    #[error(transparent)]
    Provider(#[from] armkit::Error),

    /// Resource group listing failed; no partial scan is produced.
    #[error("cannot list resource groups")]
    GroupListing(#[source] armkit::Error),

    /// The scan worker pool could not be started.
    #[error("cannot start scan workers: {0}")]
    WorkerPool(String),

    /// An action failed; the rest of the run was aborted.
    #[error("action `{action}` of rule `{rule}` failed on {resource_id}")]
    Action {
        /// Resource the action was applied to.
        resource_id: String,
        /// Rule the action belongs to.
        rule: String,
        /// Action type, e.g. `addTag`.
        action: String,
        /// Underlying provider error.
        #[source]
        source: armkit::Error,
    },

    /// Reading a resource's current tags for a backup failed.
    #[error("cannot snapshot tags of {resource_id}")]
    Snapshot {
        resource_id: String,
        #[source]
        source: armkit::Error,
    },

    /// Restoring an entry failed; earlier entries stay restored.
    #[error("cannot restore tags of {resource_id} ({restored} entries restored before the failure)")]
    Restore {
        resource_id: String,
        /// Entries successfully restored before this one.
        restored: usize,
        #[source]
        source: armkit::Error,
    },

    /// Backup file is unreadable or corrupt.
    #[error("invalid backup file {path}: {message}")]
    BackupFormat { path: PathBuf, message: String },

    /// Rules file could not be parsed.
    #[error("invalid rules file {path}: {message}")]
    RuleFile { path: PathBuf, message: String },

    /// A rule is structurally invalid.
    #[error("invalid rule `{rule}`: {message}")]
    RuleDefinition { rule: String, message: String },

    /// IO error with path context.
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Create an IO error with path context.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The provider error underneath, if any.
    pub fn provider_error(&self) -> Option<&armkit::Error> {
        match self {
            Error::Provider(e) | Error::GroupListing(e) => Some(e),
            Error::Action { source, .. }
            | Error::Snapshot { source, .. }
            | Error::Restore { source, .. } => Some(source),
            _ => None,
        }
    }
}
