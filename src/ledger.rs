//! Append-only JSONL change log.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::diff::Change;
use crate::error::ArchiveError;

/// Durable, line-oriented audit trail of change records.
#[derive(Debug, Clone)]
pub struct ChangeLog {
    path: PathBuf,
}

impl ChangeLog {
    /// Log stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one JSON line per change, keeping existing content. Returns the
    /// number of lines written; nothing is touched when `changes` is empty.
    pub fn append(&self, changes: &[Change]) -> Result<usize, ArchiveError> {
        if changes.is_empty() {
            return Ok(0);
        }
        let mut lines = Vec::with_capacity(changes.len());
        for change in changes {
            lines.push(serde_json::to_string(&change.record)?);
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| ArchiveError::write(parent, err))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| ArchiveError::write(&self.path, err))?;
        let mut writer = BufWriter::new(file);
        for line in &lines {
            writeln!(writer, "{line}").map_err(|err| ArchiveError::write(&self.path, err))?;
        }
        writer
            .flush()
            .map_err(|err| ArchiveError::write(&self.path, err))?;
        Ok(lines.len())
    }
}
