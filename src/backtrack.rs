//! Choosing which historical baseline to diff against.
//!
//! Candidates are tried in order and the first one whose diff against the
//! current dataset is non-empty wins. Comparing only with the latest run
//! misses real change when an intermediate run captured identical data;
//! walking back finds the last point of divergence.

use tracing::{debug, info};

use crate::diff::{diff, Change, RunStamp};
use crate::entry::Entry;
use crate::history::{BaselineLookup, HistoricalStore};
use crate::normalizer::Normalizer;

/// Default number of steps walked back past the base reference.
pub const DEFAULT_BACKTRACK_DEPTH: usize = 5;

/// How the candidate reference list is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidatePlan {
    /// Exactly one reference; backtracking is disabled.
    Forced(String),
    /// `base`, then `base~1` … `base~depth`.
    Walk {
        /// Most recent committed baseline.
        base: String,
        /// Steps walked back past `base`.
        depth: usize,
    },
    /// Only the most recent committed baseline.
    Latest(String),
}

impl CandidatePlan {
    /// Ordered candidate references, most recent first.
    pub fn references(&self) -> Vec<String> {
        match self {
            Self::Forced(reference) | Self::Latest(reference) => vec![reference.clone()],
            Self::Walk { base, depth } => std::iter::once(base.clone())
                .chain((1..=*depth).map(|step| format!("{base}~{step}")))
                .collect(),
        }
    }
}

/// First candidate whose evaluation is non-empty, with that evaluation.
///
/// Stops evaluating as soon as a candidate qualifies. Returns the number of
/// candidates evaluated alongside the hit.
pub fn first_divergence<C, T, F>(
    candidates: C,
    mut evaluate: F,
) -> (Option<(C::Item, Vec<T>)>, usize)
where
    C: IntoIterator,
    F: FnMut(&C::Item) -> Vec<T>,
{
    let mut tried = 0;
    for candidate in candidates {
        tried += 1;
        let outcome = evaluate(&candidate);
        if !outcome.is_empty() {
            return (Some((candidate, outcome)), tried);
        }
    }
    (None, tried)
}

/// Result of baseline resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Reference whose baseline produced the changes, if any did.
    pub reference: Option<String>,
    /// Normalized baseline of the last candidate evaluated.
    pub baseline: Vec<Entry>,
    /// Changes against that baseline.
    pub changes: Vec<Change>,
    /// Candidates evaluated.
    pub tried: usize,
}

/// Walks `references` through `store` and returns the first non-empty diff.
///
/// An unavailable reference yields no diff and the walk moves on; a document
/// that exists but lists no entries still diffs as "nothing existed".
pub fn resolve(
    store: &dyn HistoricalStore,
    references: &[String],
    current: &[Entry],
    normalizer: &Normalizer,
    stamp: &RunStamp,
) -> Resolution {
    let mut baseline = Vec::new();
    let (hit, tried) = first_divergence(references, |reference| {
        let records = match store.load_at(reference) {
            BaselineLookup::Found(records) => records,
            BaselineLookup::NotFound { reason } => {
                debug!(%reference, %reason, "baseline unavailable; trying next candidate");
                baseline.clear();
                return Vec::new();
            }
        };
        baseline = records.iter().map(|raw| normalizer.normalize(raw)).collect();
        let changes = diff(&baseline, current, stamp);
        debug!(
            %reference,
            baseline = baseline.len(),
            changes = changes.len(),
            "evaluated candidate"
        );
        changes
    });

    match hit {
        Some((reference, changes)) => {
            info!(%reference, tried, changes = changes.len(), "selected baseline");
            Resolution {
                reference: Some(reference.clone()),
                baseline,
                changes,
                tried,
            }
        }
        None => {
            info!(tried, "no candidate baseline differs from the current dataset");
            Resolution {
                reference: None,
                baseline,
                changes: Vec::new(),
                tried,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistoricalStore;
    use chrono::{TimeZone, Utc};

    fn stamp() -> RunStamp {
        RunStamp::at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
    }

    const CURRENT: &str = r#"{"urls": [{"url": "https://a.no/x", "violations": ["1.1.1"]}]}"#;

    fn current() -> Vec<Entry> {
        let store = MemoryHistoricalStore::new().with_document("now", CURRENT);
        let normalizer = Normalizer::default();
        store
            .load_at("now")
            .into_records()
            .iter()
            .map(|raw| normalizer.normalize(raw))
            .collect()
    }

    #[test]
    fn plans_produce_ordered_references() {
        assert_eq!(CandidatePlan::Latest("HEAD".into()).references(), vec!["HEAD"]);
        assert_eq!(CandidatePlan::Forced("abc123".into()).references(), vec!["abc123"]);
        assert_eq!(
            CandidatePlan::Walk {
                base: "HEAD".into(),
                depth: 2
            }
            .references(),
            vec!["HEAD", "HEAD~1", "HEAD~2"]
        );
        assert_eq!(
            CandidatePlan::Walk {
                base: "HEAD".into(),
                depth: 0
            }
            .references(),
            vec!["HEAD"]
        );
    }

    #[test]
    fn first_divergence_stops_at_first_hit() {
        let mut seen = Vec::new();
        let (hit, tried) = first_divergence(vec![0, 1, 2], |n| {
            seen.push(*n);
            if *n == 0 {
                Vec::new()
            } else {
                vec![*n]
            }
        });
        assert_eq!(hit, Some((1, vec![1])));
        assert_eq!(tried, 2);
        assert_eq!(seen, vec![0, 1]);
    }

    #[test]
    fn selects_first_differing_baseline_and_ignores_older_ones() {
        let store = MemoryHistoricalStore::new()
            .with_document("B0", CURRENT)
            .with_document(
                "B1",
                r#"{"urls": [{"url": "https://a.no/x", "violations": ["1.1.1", "1.3.1"]}]}"#,
            )
            .with_document("B2", r#"{"urls": []}"#);
        let references: Vec<String> = ["B0", "B1", "B2"].iter().map(|r| r.to_string()).collect();
        let resolution = resolve(&store, &references, &current(), &Normalizer::default(), &stamp());
        assert_eq!(resolution.reference.as_deref(), Some("B1"));
        assert_eq!(resolution.tried, 2);
        assert_eq!(resolution.changes.len(), 1);
        assert_eq!(resolution.changes[0].record.removed, vec!["1.3.1"]);
        assert_eq!(resolution.baseline[0].non_conformities.len(), 2);
    }

    #[test]
    fn unavailable_references_are_skipped() {
        let store = MemoryHistoricalStore::new().with_document("HEAD", CURRENT);
        let references: Vec<String> =
            ["HEAD", "HEAD~1", "HEAD~2"].iter().map(|r| r.to_string()).collect();
        let resolution = resolve(&store, &references, &current(), &Normalizer::default(), &stamp());
        assert_eq!(resolution.reference, None);
        assert_eq!(resolution.tried, 3);
        assert!(resolution.changes.is_empty());
    }

    #[test]
    fn walk_continues_past_unavailable_reference() {
        let store = MemoryHistoricalStore::new()
            .with_document("HEAD", CURRENT)
            .with_document("HEAD~2", r#"{"urls": []}"#);
        let references: Vec<String> =
            ["HEAD", "HEAD~1", "HEAD~2"].iter().map(|r| r.to_string()).collect();
        let resolution = resolve(&store, &references, &current(), &Normalizer::default(), &stamp());
        assert_eq!(resolution.reference.as_deref(), Some("HEAD~2"));
        assert_eq!(resolution.changes.len(), 1);
        assert!(resolution.changes[0].record.changed.new_entry);
    }

    #[test]
    fn exhausted_candidates_report_no_changes() {
        let store = MemoryHistoricalStore::new()
            .with_document("B0", CURRENT)
            .with_document("B1", CURRENT);
        let references = vec!["B0".to_string(), "B1".to_string()];
        let resolution = resolve(&store, &references, &current(), &Normalizer::default(), &stamp());
        assert_eq!(resolution.reference, None);
        assert!(resolution.changes.is_empty());
        assert_eq!(resolution.tried, 2);
    }

    #[test]
    fn no_candidates_means_no_changes() {
        let resolution = resolve(
            &MemoryHistoricalStore::new(),
            &[],
            &current(),
            &Normalizer::default(),
            &stamp(),
        );
        assert_eq!(resolution.tried, 0);
        assert!(resolution.changes.is_empty());
    }
}
