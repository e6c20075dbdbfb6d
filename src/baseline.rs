//! The working baseline document, `{ "urls": [Entry, ...] }`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entry::Entry;
use crate::error::ArchiveError;

/// Document layout shared by the baseline and the per-date snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryDocument {
    /// Entries in order.
    pub urls: Vec<Entry>,
}

impl EntryDocument {
    /// Pretty-printed JSON with a trailing newline.
    pub fn to_pretty_json(&self) -> Result<String, ArchiveError> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}

/// Writes `document` to `path`, creating parent directories.
pub(crate) fn write_document(path: &Path, document: &EntryDocument) -> Result<(), ArchiveError> {
    let text = document.to_pretty_json()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| ArchiveError::write(parent, err))?;
    }
    fs::write(path, text).map_err(|err| ArchiveError::write(path, err))
}

/// Working copy of the baseline; replaced wholesale at the end of every run.
#[derive(Debug, Clone)]
pub struct BaselineFile {
    path: PathBuf,
}

impl BaselineFile {
    /// Baseline stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the baseline document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the baseline with the full current entry set.
    pub fn persist(&self, entries: &[Entry]) -> Result<(), ArchiveError> {
        write_document(
            &self.path,
            &EntryDocument {
                urls: entries.to_vec(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{parse_baseline, BaselineLookup};
    use tempfile::tempdir;

    #[test]
    fn persist_replaces_previous_content() {
        let dir = tempdir().unwrap();
        let baseline = BaselineFile::new(dir.path().join("data/latest.json"));
        let first = vec![
            Entry {
                url: "https://a.no/".into(),
                ..Entry::default()
            },
            Entry {
                url: "https://b.no/".into(),
                ..Entry::default()
            },
        ];
        baseline.persist(&first).unwrap();
        baseline.persist(&first[1..]).unwrap();

        let text = fs::read_to_string(baseline.path()).unwrap();
        let document: EntryDocument = serde_json::from_str(&text).unwrap();
        assert_eq!(document.urls, first[1..].to_vec());
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn persisted_document_reads_back_as_a_baseline() {
        let dir = tempdir().unwrap();
        let baseline = BaselineFile::new(dir.path().join("latest.json"));
        baseline.persist(&[Entry::default()]).unwrap();
        let text = fs::read_to_string(baseline.path()).unwrap();
        match parse_baseline(&text) {
            BaselineLookup::Found(records) => assert_eq!(records.len(), 1),
            other => panic!("unexpected {other:?}"),
        }
    }
}
