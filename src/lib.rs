#![warn(missing_docs)]
//! Core library for the accessibility status archive: normalizes each run's
//! dataset, diffs it against a baseline resolved from revision history, and
//! records the changes.

pub mod backtrack;
pub mod baseline;
pub mod controls;
pub mod diff;
pub mod entry;
pub mod error;
pub mod history;
pub mod identity;
pub mod ledger;
pub mod normalizer;
pub mod runtime;
pub mod snapshot;
pub mod source;

pub use backtrack::{first_divergence, resolve, CandidatePlan, Resolution};
pub use baseline::{BaselineFile, EntryDocument};
pub use controls::{ArchiveControls, Cli};
pub use diff::{diff, Change, ChangeKind, ChangeRecord, FieldChanges, FieldDelta, RunStamp};
pub use entry::{Entry, RawRecord};
pub use error::ArchiveError;
pub use history::{BaselineLookup, GitHistoricalStore, HistoricalStore, MemoryHistoricalStore};
pub use identity::IdentityKey;
pub use ledger::ChangeLog;
pub use normalizer::{ExtractionRules, FieldLocator, Normalizer};
pub use runtime::{run as run_archive, RunReport};
pub use snapshot::SnapshotStore;
pub use source::{read_current, CurrentDataset, SourceKind};
