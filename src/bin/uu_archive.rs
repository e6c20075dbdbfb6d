use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use uuarchive::{run_archive, Cli, GitHistoricalStore, RunReport, RunStamp};

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let controls = cli.build_controls();
    let store = GitHistoricalStore::new(&controls.repo_root, &controls.baseline);
    let stamp = RunStamp::now();

    let report = run_archive(&controls, &store, &stamp).context("archive run failed")?;
    render_stats(&report, &stamp);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn render_stats(report: &RunReport, stamp: &RunStamp) {
    println!("--- Conformance Archive ({}) ---", stamp.ts);
    println!("current entries: {}", report.entries);
    println!("baselines tried: {}", report.candidates_tried);
    println!(
        "baseline reference: {}",
        report.reference.as_deref().unwrap_or("none")
    );
    println!("new entries: {}", report.new_entries);
    println!("changed entries: {}", report.changed_entries);
    println!("removed entries: {}", report.removed_entries);
    if report.total_changes() == 0 {
        println!("no changes detected");
    } else {
        println!("change log lines appended: {}", report.log_lines);
        println!("snapshot files written: {}", report.snapshots.len());
    }
    println!("baseline persisted: {}", report.baseline_persisted);
}
