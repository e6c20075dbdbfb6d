//! Run configuration: file locations, baseline selection and debugging knobs.

use std::path::PathBuf;

use clap::Parser;

use crate::backtrack::{CandidatePlan, DEFAULT_BACKTRACK_DEPTH};
use crate::normalizer::ExtractionRules;

/// Everything one archive run needs to know, passed explicitly into
/// [`crate::runtime::run`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveControls {
    /// Primary dataset (`{ "urls": [...] }`).
    pub source_json: PathBuf,
    /// Delimited-text fallback dataset.
    pub source_csv: PathBuf,
    /// Working baseline document.
    pub baseline: PathBuf,
    /// Append-only change log.
    pub change_log: PathBuf,
    /// Directory of per-date snapshot documents.
    pub snapshot_dir: PathBuf,
    /// Root of the revision history holding earlier baselines.
    pub repo_root: PathBuf,
    /// Historical references to diff against.
    pub plan: CandidatePlan,
    /// Substring selecting identity keys whose code sets are traced.
    pub debug_key: Option<String>,
    /// Compute and report without writing anything, the baseline included.
    pub dry_run: bool,
    /// Field extraction strategies used to normalize every dataset.
    pub rules: ExtractionRules,
}

impl Default for ArchiveControls {
    fn default() -> Self {
        Self {
            source_json: PathBuf::from("docs/uu-status-details.json"),
            source_csv: PathBuf::from("docs/uu-status.csv"),
            baseline: PathBuf::from("docs/data/uustatus/latest.json"),
            change_log: PathBuf::from("docs/data/uustatus/logs/changes.jsonl"),
            snapshot_dir: PathBuf::from("docs/data/uustatus/snapshots_by_updated"),
            repo_root: PathBuf::from("."),
            plan: CandidatePlan::Latest("HEAD".to_string()),
            debug_key: None,
            dry_run: false,
            rules: ExtractionRules::default(),
        }
    }
}

/// Command-line interface; every option can also come from the environment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "uu-archive",
    about = "Diff the accessibility status dataset against its history and archive the changes"
)]
pub struct Cli {
    /// Current dataset as JSON with a `urls` array
    #[arg(long, env = "UU_SOURCE_JSON", default_value = "docs/uu-status-details.json")]
    pub source_json: PathBuf,

    /// Delimited-text fallback when the JSON dataset is unusable
    #[arg(long, env = "UU_SOURCE_CSV", default_value = "docs/uu-status.csv")]
    pub source_csv: PathBuf,

    /// Working baseline, replaced at the end of every run
    #[arg(long, env = "UU_BASELINE", default_value = "docs/data/uustatus/latest.json")]
    pub baseline: PathBuf,

    /// Append-only JSONL change log
    #[arg(
        long,
        env = "UU_CHANGE_LOG",
        default_value = "docs/data/uustatus/logs/changes.jsonl"
    )]
    pub change_log: PathBuf,

    /// Directory for per-date snapshots of changed entries
    #[arg(
        long,
        env = "UU_SNAPSHOT_DIR",
        default_value = "docs/data/uustatus/snapshots_by_updated"
    )]
    pub snapshot_dir: PathBuf,

    /// Root of the git repository holding earlier baselines
    #[arg(long, env = "UU_REPO_ROOT", default_value = ".")]
    pub repo_root: PathBuf,

    /// Most recent committed baseline
    #[arg(long, env = "UU_BASE_REF", default_value = "HEAD")]
    pub base_ref: String,

    /// Diff against exactly this reference (disables backtracking)
    #[arg(long, env = "UU_BASELINE_REF")]
    pub baseline_ref: Option<String>,

    /// Walk back through older baselines until one differs
    #[arg(long, env = "UU_BACKTRACK", default_value_t = false)]
    pub backtrack: bool,

    /// Steps walked back past the base reference when backtracking
    #[arg(long, env = "UU_BACKTRACK_DEPTH", default_value_t = DEFAULT_BACKTRACK_DEPTH)]
    pub backtrack_depth: usize,

    /// Log before/after codes for identity keys containing this text
    #[arg(long, env = "UU_DEBUG_KEY")]
    pub debug_key: Option<String>,

    /// Report changes without writing anything; unlike a normal run the
    /// baseline is not persisted either
    #[arg(long, env = "UU_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,
}

impl Cli {
    /// Converts the parsed CLI into `ArchiveControls`.
    pub fn build_controls(&self) -> ArchiveControls {
        ArchiveControls {
            source_json: self.source_json.clone(),
            source_csv: self.source_csv.clone(),
            baseline: self.baseline.clone(),
            change_log: self.change_log.clone(),
            snapshot_dir: self.snapshot_dir.clone(),
            repo_root: self.repo_root.clone(),
            plan: self.candidate_plan(),
            debug_key: self
                .debug_key
                .as_ref()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
            dry_run: self.dry_run,
            rules: ExtractionRules::default(),
        }
    }

    /// A forced reference wins over backtracking; otherwise only the base reference.
    pub fn candidate_plan(&self) -> CandidatePlan {
        let forced = self
            .baseline_ref
            .as_ref()
            .map(|reference| reference.trim())
            .filter(|reference| !reference.is_empty());
        match forced {
            Some(reference) => CandidatePlan::Forced(reference.to_string()),
            None if self.backtrack => CandidatePlan::Walk {
                base: self.base_ref.clone(),
                depth: self.backtrack_depth,
            },
            None => CandidatePlan::Latest(self.base_ref.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("uu-archive").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn defaults_diff_against_latest_commit() {
        let cli = parse(&[]);
        assert_eq!(cli.candidate_plan(), CandidatePlan::Latest("HEAD".into()));
        let controls = cli.build_controls();
        assert_eq!(controls.baseline, ArchiveControls::default().baseline);
        assert!(!controls.dry_run);
    }

    #[test]
    fn backtracking_walks_configured_depth() {
        let cli = parse(&["--backtrack", "--backtrack-depth", "3", "--base-ref", "main"]);
        assert_eq!(
            cli.candidate_plan(),
            CandidatePlan::Walk {
                base: "main".into(),
                depth: 3
            }
        );
    }

    #[test]
    fn forced_reference_overrides_backtracking() {
        let cli = parse(&["--backtrack", "--baseline-ref", "abc123"]);
        assert_eq!(cli.candidate_plan(), CandidatePlan::Forced("abc123".into()));
    }

    #[test]
    fn dry_run_flag_reaches_controls() {
        let controls = parse(&["--dry-run"]).build_controls();
        assert!(controls.dry_run);
        assert_eq!(controls.rules, ExtractionRules::default());
    }

    #[test]
    fn blank_debug_key_is_ignored() {
        let cli = parse(&["--debug-key", "  "]);
        assert_eq!(cli.build_controls().debug_key, None);
    }
}
