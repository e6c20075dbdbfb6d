//! Per-identity comparison of a baseline against the current dataset.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::entry::Entry;
use crate::identity::IdentityKey;

/// Fields compared between two sightings of the same identity.
pub const CHECKED_FIELDS: [&str; 4] = ["title", "status", "updatedAt", "totalNonConformities"];

const TOTAL_FIELD: &str = "totalNonConformities";

/// Timestamp and date of the run that detected a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStamp {
    /// UTC timestamp, second precision.
    pub ts: String,
    /// UTC date, `YYYY-MM-DD`.
    pub date: String,
}

impl RunStamp {
    /// Stamp for the given instant.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            ts: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            date: now.format("%Y-%m-%d").to_string(),
        }
    }

    /// Stamp for the current wall-clock time.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}

/// Before/after pair for one changed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    /// Value in the baseline.
    pub before: Value,
    /// Value in the current dataset.
    pub after: Value,
}

/// Field-level changes plus the new/removed markers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldChanges {
    /// Identity absent from the baseline.
    #[serde(rename = "newEntry", default, skip_serializing_if = "is_false")]
    pub new_entry: bool,
    /// Identity absent from the current dataset.
    #[serde(rename = "removedEntry", default, skip_serializing_if = "is_false")]
    pub removed_entry: bool,
    /// Changed fields by name.
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldDelta>,
}

impl FieldChanges {
    /// No markers and no field deltas.
    pub fn is_empty(&self) -> bool {
        !self.new_entry && !self.removed_entry && self.fields.is_empty()
    }

    fn record(&mut self, field: &str, before: Value, after: Value) {
        self.fields
            .insert(field.to_string(), FieldDelta { before, after });
    }
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

/// One line of the change log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Run timestamp.
    pub ts: String,
    /// Date the run executed.
    #[serde(rename = "detectedDate")]
    pub detected_date: String,
    /// Page URL.
    pub url: String,
    /// Page domain.
    pub domain: String,
    /// Fingerprint of the baseline entry, `null` for new entries.
    pub before_hash: Option<String>,
    /// Fingerprint of the current entry, `null` for removed entries.
    pub after_hash: Option<String>,
    /// Codes present now but not before, sorted.
    pub added: Vec<String>,
    /// Codes present before but not now, sorted.
    pub removed: Vec<String>,
    /// Field deltas and markers.
    pub changed: FieldChanges,
    /// Date this change is attributed to.
    #[serde(rename = "updatedDate")]
    pub updated_date: String,
}

/// Classification of a change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Identity appeared.
    New,
    /// Identity present on both sides with differences.
    Changed,
    /// Identity disappeared.
    Removed,
}

/// A detected change together with the data downstream stages need.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Identity the change belongs to.
    pub key: IdentityKey,
    /// Log record.
    pub record: ChangeRecord,
    /// Current-side entry; `None` for removals.
    pub current: Option<Entry>,
}

impl Change {
    /// Kind of transition this change describes.
    pub fn kind(&self) -> ChangeKind {
        if self.record.changed.new_entry {
            ChangeKind::New
        } else if self.record.changed.removed_entry {
            ChangeKind::Removed
        } else {
            ChangeKind::Changed
        }
    }
}

/// Entries of one side indexed by identity key.
#[derive(Debug, Default)]
pub struct IndexedEntries<'a> {
    /// Last-seen entry per key.
    pub by_key: BTreeMap<IdentityKey, &'a Entry>,
    /// Keys that occurred more than once; the later entry won.
    pub duplicates: Vec<IdentityKey>,
    /// Entries with neither url nor title.
    pub unkeyed: usize,
}

/// Indexes entries by identity key. Later duplicates overwrite earlier ones.
pub fn index_entries(entries: &[Entry]) -> IndexedEntries<'_> {
    let mut indexed = IndexedEntries::default();
    for entry in entries {
        let Some(key) = IdentityKey::of(entry) else {
            indexed.unkeyed += 1;
            continue;
        };
        if indexed.by_key.insert(key.clone(), entry).is_some() {
            indexed.duplicates.push(key);
        }
    }
    indexed
}

/// Compares `previous` against `current`: new identities first, then
/// changed ones, then removed ones.
pub fn diff(previous: &[Entry], current: &[Entry], stamp: &RunStamp) -> Vec<Change> {
    let before = index_entries(previous);
    let after = index_entries(current);
    for key in &after.duplicates {
        warn!(%key, "duplicate identity in current dataset; last record wins");
    }
    for key in &before.duplicates {
        warn!(%key, "duplicate identity in baseline; last record wins");
    }

    let mut changes = Vec::new();

    for (key, entry) in &after.by_key {
        if !before.by_key.contains_key(key) {
            changes.push(new_entry(key, entry, stamp));
        }
    }

    for (key, entry) in &after.by_key {
        if let Some(prior) = before.by_key.get(key) {
            if let Some(change) = changed_entry(key, prior, entry, stamp) {
                changes.push(change);
            }
        }
    }

    for (key, prior) in &before.by_key {
        if !after.by_key.contains_key(key) {
            changes.push(removed_entry(key, prior, stamp));
        }
    }

    changes
}

fn new_entry(key: &IdentityKey, entry: &Entry, stamp: &RunStamp) -> Change {
    let mut changed = FieldChanges {
        new_entry: true,
        ..FieldChanges::default()
    };
    changed.record(TOTAL_FIELD, json!(0), json!(entry.total_non_conformities));
    Change {
        key: key.clone(),
        record: ChangeRecord {
            ts: stamp.ts.clone(),
            detected_date: stamp.date.clone(),
            url: entry.url.clone(),
            domain: entry.domain.clone(),
            before_hash: None,
            after_hash: Some(entry.fingerprint()),
            added: entry.non_conformities.clone(),
            removed: Vec::new(),
            changed,
            updated_date: effective_date(entry, stamp),
        },
        current: Some(entry.clone()),
    }
}

fn changed_entry(
    key: &IdentityKey,
    prior: &Entry,
    entry: &Entry,
    stamp: &RunStamp,
) -> Option<Change> {
    let before_codes: BTreeSet<&String> = prior.non_conformities.iter().collect();
    let after_codes: BTreeSet<&String> = entry.non_conformities.iter().collect();
    let added: Vec<String> = after_codes
        .difference(&before_codes)
        .map(|code| (*code).clone())
        .collect();
    let removed: Vec<String> = before_codes
        .difference(&after_codes)
        .map(|code| (*code).clone())
        .collect();

    let mut changed = FieldChanges::default();
    for field in CHECKED_FIELDS {
        let (was, now) = (field_value(prior, field), field_value(entry, field));
        if was != now {
            changed.record(field, was, now);
        }
    }
    // Totals can be miscomputed at the source; fall back to the code-set sizes.
    if (!added.is_empty() || !removed.is_empty())
        && !changed.fields.contains_key(TOTAL_FIELD)
        && before_codes.len() != after_codes.len()
    {
        changed.record(
            TOTAL_FIELD,
            json!(before_codes.len()),
            json!(after_codes.len()),
        );
    }

    if changed.is_empty() && added.is_empty() && removed.is_empty() {
        return None;
    }

    Some(Change {
        key: key.clone(),
        record: ChangeRecord {
            ts: stamp.ts.clone(),
            detected_date: stamp.date.clone(),
            url: entry.url.clone(),
            domain: entry.domain.clone(),
            before_hash: Some(prior.fingerprint()),
            after_hash: Some(entry.fingerprint()),
            added,
            removed,
            changed,
            updated_date: effective_date(entry, stamp),
        },
        current: Some(entry.clone()),
    })
}

fn removed_entry(key: &IdentityKey, prior: &Entry, stamp: &RunStamp) -> Change {
    let mut changed = FieldChanges {
        removed_entry: true,
        ..FieldChanges::default()
    };
    changed.record(TOTAL_FIELD, json!(prior.total_non_conformities), json!(0));
    Change {
        key: key.clone(),
        record: ChangeRecord {
            ts: stamp.ts.clone(),
            detected_date: stamp.date.clone(),
            url: prior.url.clone(),
            domain: prior.domain.clone(),
            before_hash: Some(prior.fingerprint()),
            after_hash: None,
            added: Vec::new(),
            removed: prior.non_conformities.clone(),
            changed,
            updated_date: effective_date(prior, stamp),
        },
        current: None,
    }
}

fn field_value(entry: &Entry, field: &str) -> Value {
    match field {
        "title" => json!(entry.title),
        "status" => json!(entry.status),
        "updatedAt" => json!(entry.updated_at),
        TOTAL_FIELD => json!(entry.total_non_conformities),
        _ => Value::Null,
    }
}

fn effective_date(entry: &Entry, stamp: &RunStamp) -> String {
    entry.updated_date().unwrap_or_else(|| stamp.date.clone())
}

/// Before/after code sets of one identity, for targeted debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeTrace {
    /// Matching identity.
    pub key: IdentityKey,
    /// Codes in the baseline, if the identity existed there.
    pub before: Option<Vec<String>>,
    /// Codes in the current dataset, if the identity exists there.
    pub after: Option<Vec<String>>,
}

/// Code sets of every identity whose rendered key contains `needle`.
pub fn trace_codes(needle: &str, previous: &[Entry], current: &[Entry]) -> Vec<CodeTrace> {
    let before = index_entries(previous);
    let after = index_entries(current);
    let keys: BTreeSet<&IdentityKey> = before
        .by_key
        .keys()
        .chain(after.by_key.keys())
        .filter(|key| key.matches(needle))
        .collect();
    keys.into_iter()
        .map(|key| CodeTrace {
            key: key.clone(),
            before: before.by_key.get(key).map(|e| e.non_conformities.clone()),
            after: after.by_key.get(key).map(|e| e.non_conformities.clone()),
        })
        .collect()
}
