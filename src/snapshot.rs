//! Per-date snapshot buckets of changed entries.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use crate::baseline::{write_document, EntryDocument};
use crate::diff::Change;
use crate::entry::Entry;
use crate::error::ArchiveError;
use crate::history::{parse_baseline, BaselineLookup};
use crate::identity::IdentityKey;
use crate::normalizer::Normalizer;

/// Directory of `<date>.json` snapshot documents.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Snapshots kept under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File holding the bucket for `date`.
    pub fn path_for(&self, date: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(date)))
    }

    /// Reads the bucket for `date`; an absent file is an empty bucket.
    pub fn load(&self, date: &str, normalizer: &Normalizer) -> Result<Vec<Entry>, ArchiveError> {
        let path = self.path_for(date);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(ArchiveError::CorruptSnapshot {
                    path,
                    reason: err.to_string(),
                })
            }
        };
        match parse_baseline(&text) {
            BaselineLookup::Found(records) => Ok(records
                .iter()
                .map(|raw| normalizer.normalize(raw))
                .collect()),
            BaselineLookup::NotFound { reason } => {
                Err(ArchiveError::CorruptSnapshot { path, reason })
            }
        }
    }

    /// Groups the current-side entry of every change by its effective date and
    /// merges each group into that date's bucket. Removals are skipped.
    /// Returns the files written.
    pub fn materialize(
        &self,
        changes: &[Change],
        normalizer: &Normalizer,
    ) -> Result<Vec<PathBuf>, ArchiveError> {
        let mut by_date: BTreeMap<&str, Vec<(&IdentityKey, &Entry)>> = BTreeMap::new();
        for change in changes {
            if let Some(entry) = &change.current {
                by_date
                    .entry(change.record.updated_date.as_str())
                    .or_default()
                    .push((&change.key, entry));
            }
        }

        let mut written = Vec::with_capacity(by_date.len());
        for (date, updates) in by_date {
            let existing = self.load(date, normalizer)?;
            let merged = overlay(existing, updates);
            let path = self.path_for(date);
            write_document(&path, &EntryDocument { urls: merged })?;
            debug!(path = %path.display(), "wrote snapshot");
            written.push(path);
        }
        Ok(written)
    }
}

/// Replaces entries with matching identity in place and appends the rest.
fn overlay(mut existing: Vec<Entry>, updates: Vec<(&IdentityKey, &Entry)>) -> Vec<Entry> {
    let mut positions: BTreeMap<IdentityKey, usize> = existing
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| IdentityKey::of(entry).map(|key| (key, idx)))
        .collect();
    for (key, entry) in updates {
        match positions.get(key) {
            Some(&idx) => existing[idx] = entry.clone(),
            None => {
                positions.insert(key.clone(), existing.len());
                existing.push(entry.clone());
            }
        }
    }
    existing
}

/// Dates become file names; anything outside `[A-Za-z0-9-]` is replaced.
fn file_stem(date: &str) -> String {
    date.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}
