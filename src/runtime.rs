//! One archive run: read, resolve a baseline, record changes, persist.
//!
//! Strictly sequential. The baseline is persisted last, exactly once, whether
//! or not changes were found. A dry run is the one exception: it writes
//! nothing at all.

use std::path::PathBuf;

use tracing::info;

use crate::backtrack::resolve;
use crate::baseline::BaselineFile;
use crate::controls::ArchiveControls;
use crate::diff::{trace_codes, ChangeKind, RunStamp};
use crate::error::ArchiveError;
use crate::history::HistoricalStore;
use crate::ledger::ChangeLog;
use crate::normalizer::Normalizer;
use crate::snapshot::SnapshotStore;
use crate::source::{read_current, SourceKind};

/// Summary of what a run observed and wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Input form the current dataset came from.
    pub source: SourceKind,
    /// Entries in the current dataset.
    pub entries: usize,
    /// Candidate references evaluated.
    pub candidates_tried: usize,
    /// Reference whose baseline produced the changes.
    pub reference: Option<String>,
    /// Identities that appeared.
    pub new_entries: usize,
    /// Identities present on both sides with differences.
    pub changed_entries: usize,
    /// Identities that disappeared.
    pub removed_entries: usize,
    /// Lines appended to the change log.
    pub log_lines: usize,
    /// Snapshot files written.
    pub snapshots: Vec<PathBuf>,
    /// Whether the working baseline was replaced; false only on dry runs.
    pub baseline_persisted: bool,
}

impl RunReport {
    /// Total number of change records.
    pub fn total_changes(&self) -> usize {
        self.new_entries + self.changed_entries + self.removed_entries
    }
}

/// Executes one run against `store`, stamping records with `stamp`.
pub fn run(
    controls: &ArchiveControls,
    store: &dyn HistoricalStore,
    stamp: &RunStamp,
) -> Result<RunReport, ArchiveError> {
    let normalizer = Normalizer::new(controls.rules.clone());
    let current = read_current(&controls.source_json, &controls.source_csv, &normalizer)?;

    let references = controls.plan.references();
    let resolution = resolve(store, &references, &current.entries, &normalizer, stamp);

    if let Some(needle) = &controls.debug_key {
        for trace in trace_codes(needle, &resolution.baseline, &current.entries) {
            info!(
                key = %trace.key,
                before = ?trace.before,
                after = ?trace.after,
                "traced codes"
            );
        }
    }

    let mut report = RunReport {
        source: current.kind,
        entries: current.entries.len(),
        candidates_tried: resolution.tried,
        reference: resolution.reference.clone(),
        new_entries: 0,
        changed_entries: 0,
        removed_entries: 0,
        log_lines: 0,
        snapshots: Vec::new(),
        baseline_persisted: false,
    };
    for change in &resolution.changes {
        match change.kind() {
            ChangeKind::New => report.new_entries += 1,
            ChangeKind::Changed => report.changed_entries += 1,
            ChangeKind::Removed => report.removed_entries += 1,
        }
    }

    if controls.dry_run {
        info!("dry run enabled; skipping change log, snapshots and baseline");
        return Ok(report);
    }

    if resolution.changes.is_empty() {
        info!("no changes detected");
    } else {
        let log = ChangeLog::new(&controls.change_log);
        report.log_lines = log.append(&resolution.changes)?;
        info!(lines = report.log_lines, path = %log.path().display(), "appended change log");

        let snapshots = SnapshotStore::new(&controls.snapshot_dir);
        report.snapshots = snapshots.materialize(&resolution.changes, &normalizer)?;
        info!(files = report.snapshots.len(), "updated snapshots");
    }

    let baseline = BaselineFile::new(&controls.baseline);
    baseline.persist(&current.entries)?;
    report.baseline_persisted = true;
    info!(path = %baseline.path().display(), entries = report.entries, "persisted baseline");

    Ok(report)
}
