use std::fs;
use std::path::Path;
use std::process::Command;

use chrono::{TimeZone, Utc};
use uuarchive::{
    run_archive, ArchiveControls, BaselineLookup, CandidatePlan, ExtractionRules,
    GitHistoricalStore, HistoricalStore, RunStamp,
};

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

fn run_git(root: &Path, args: &[&str]) {
    let status = Command::new("git")
        .arg("-C")
        .arg(root)
        .args([
            "-c",
            "user.name=Archive Test",
            "-c",
            "user.email=archive@example.invalid",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .status()
        .expect("run git");
    assert!(status.success(), "git command failed: {args:?}");
}

fn commit_baseline(root: &Path, text: &str, message: &str) {
    let path = root.join("docs/latest.json");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, text).unwrap();
    run_git(root, &["add", "docs/latest.json"]);
    run_git(root, &["commit", "-q", "--allow-empty", "-m", message]);
}

const WITH_TWO: &str =
    r#"{"urls": [{"url": "https://a.no/x", "nonConformities": ["1.1.1", "1.3.1"]}]}"#;
const WITH_ONE: &str = r#"{"urls": [{"url": "https://a.no/x", "nonConformities": ["1.1.1"]}]}"#;

#[test]
fn loads_baselines_at_historical_references() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    run_git(root, &["init", "-q"]);
    commit_baseline(root, WITH_TWO, "first");
    commit_baseline(root, WITH_ONE, "second");

    let store = GitHistoricalStore::new(root, root.join("docs/latest.json"));
    match store.load_at("HEAD~1") {
        BaselineLookup::Found(records) => {
            assert_eq!(records[0]["nonConformities"].as_array().unwrap().len(), 2)
        }
        other => panic!("expected baseline at HEAD~1, got {other:?}"),
    }
    assert!(matches!(store.load_at("HEAD~5"), BaselineLookup::NotFound { .. }));
}

#[test]
fn backtracks_through_git_history() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    run_git(root, &["init", "-q"]);
    commit_baseline(root, WITH_TWO, "first");
    commit_baseline(root, WITH_ONE, "second");

    fs::write(root.join("current.json"), WITH_ONE).unwrap();
    let controls = ArchiveControls {
        source_json: root.join("current.json"),
        source_csv: root.join("current.csv"),
        baseline: root.join("docs/latest.json"),
        change_log: root.join("docs/logs/changes.jsonl"),
        snapshot_dir: root.join("docs/snapshots"),
        repo_root: root.to_path_buf(),
        plan: CandidatePlan::Walk {
            base: "HEAD".into(),
            depth: 4,
        },
        debug_key: Some("a.no".into()),
        dry_run: false,
        rules: ExtractionRules::default(),
    };
    let store = GitHistoricalStore::new(&controls.repo_root, &controls.baseline);
    let stamp = RunStamp::at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());

    let report = run_archive(&controls, &store, &stamp).unwrap();
    assert_eq!(report.reference.as_deref(), Some("HEAD~1"));
    assert_eq!(report.changed_entries, 1);
}

#[test]
fn absolute_baseline_with_relative_repo_root() {
    if !git_available() {
        eprintln!("git not available; skipping");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    run_git(root, &["init", "-q"]);
    commit_baseline(root, WITH_TWO, "first");
    fs::write(root.join("current.json"), WITH_ONE).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_uu-archive"))
        .current_dir(root)
        .env_remove("UU_BASELINE_REF")
        .env_remove("UU_DRY_RUN")
        .env_remove("UU_BACKTRACK")
        .args(["--repo-root", "."])
        .arg("--source-json")
        .arg(root.join("current.json"))
        .arg("--baseline")
        .arg(root.join("docs/latest.json"))
        .output()
        .expect("run CLI");

    assert!(
        output.status.success(),
        "cli exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("baseline reference: HEAD"), "{stdout}");
    assert!(stdout.contains("changed entries: 1"), "{stdout}");
}
