//! Failure modes surfaced by an archive run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors; everything else degrades into normalized data.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Neither the primary JSON dataset nor the delimited-text fallback was usable.
    #[error(
        "no valid current dataset in {} or {}",
        json.display(),
        csv.display()
    )]
    MissingSource {
        /// Primary JSON dataset path.
        json: PathBuf,
        /// Delimited-text fallback path.
        csv: PathBuf,
    },
    /// Writing the change log, a snapshot or the baseline failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A document could not be serialized.
    #[error("failed to encode document: {0}")]
    Encode(#[from] serde_json::Error),
    /// An existing per-date snapshot could not be parsed and would be clobbered by a merge.
    #[error("existing snapshot {} is unreadable: {reason}", path.display())]
    CorruptSnapshot {
        /// Snapshot file.
        path: PathBuf,
        /// Parse or IO failure description.
        reason: String,
    },
}

impl ArchiveError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
