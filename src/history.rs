//! Access to baselines as they existed at earlier points of the data's
//! revision history.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use tracing::debug;

use crate::entry::RawRecord;

/// Outcome of looking up a baseline at a historical reference.
#[derive(Debug, Clone, PartialEq)]
pub enum BaselineLookup {
    /// Raw records of the baseline document at that reference.
    Found(Vec<RawRecord>),
    /// Reference unknown, document absent there, or unreadable.
    NotFound {
        /// Human-readable cause, for logs.
        reason: String,
    },
}

impl BaselineLookup {
    fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    /// Records when found, otherwise an empty dataset ("nothing existed yet").
    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            Self::Found(records) => records,
            Self::NotFound { .. } => Vec::new(),
        }
    }
}

/// Capability to load the full baseline dataset at a named reference.
pub trait HistoricalStore {
    /// Loads the baseline at `reference`. Expected misses are `NotFound`, never panics.
    fn load_at(&self, reference: &str) -> BaselineLookup;
}

/// Reads baselines out of a git repository with `git show <ref>:<path>`.
#[derive(Debug, Clone)]
pub struct GitHistoricalStore {
    repo_root: PathBuf,
    document: PathBuf,
}

impl GitHistoricalStore {
    /// `document` is the baseline path; relative paths are taken from `repo_root`.
    pub fn new(repo_root: impl Into<PathBuf>, document: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            document: document.into(),
        }
    }

    /// Revision spec handed to `git show`, or `None` when the document does
    /// not live inside the repository.
    ///
    /// Both paths are resolved first, so a relative root and an absolute
    /// document (or `..` segments) still meet on a common prefix.
    pub fn object_spec(&self, reference: &str) -> Option<String> {
        let root = resolve_path(&self.repo_root);
        let document = self.repo_root.join(&self.document);
        let document = match (document.parent(), document.file_name()) {
            (Some(parent), Some(name)) => resolve_path(parent).join(name),
            _ => resolve_path(&document),
        };
        let relative = document.strip_prefix(&root).ok()?;
        let path = relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if path.is_empty() {
            return None;
        }
        Some(format!("{reference}:./{path}"))
    }
}

/// Canonical path when it exists, otherwise the lexically normalized absolute path.
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    let absolute = match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    };
    let mut resolved = PathBuf::new();
    for part in absolute.components() {
        match part {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

impl HistoricalStore for GitHistoricalStore {
    fn load_at(&self, reference: &str) -> BaselineLookup {
        let Some(spec) = self.object_spec(reference) else {
            return BaselineLookup::not_found(format!(
                "{} is outside repository {}",
                self.document.display(),
                self.repo_root.display()
            ));
        };
        let output = match Command::new("git")
            .arg("-C")
            .arg(&self.repo_root)
            .args(["show", spec.as_str()])
            .output()
        {
            Ok(output) => output,
            Err(err) => return BaselineLookup::not_found(format!("git show failed: {err}")),
        };
        if !output.status.success() {
            return BaselineLookup::not_found(format!(
                "git show {spec} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        match std::str::from_utf8(&output.stdout) {
            Ok(text) => parse_baseline(text),
            Err(err) => BaselineLookup::not_found(format!("{spec} is not UTF-8: {err}")),
        }
    }
}

/// In-memory history keyed by reference name.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistoricalStore {
    baselines: HashMap<String, Vec<RawRecord>>,
}

impl MemoryHistoricalStore {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the baseline document text at `reference`; unparseable text is ignored.
    pub fn with_document(mut self, reference: impl Into<String>, document: &str) -> Self {
        if let BaselineLookup::Found(records) = parse_baseline(document) {
            self.baselines.insert(reference.into(), records);
        }
        self
    }
}

impl HistoricalStore for MemoryHistoricalStore {
    fn load_at(&self, reference: &str) -> BaselineLookup {
        match self.baselines.get(reference) {
            Some(records) => BaselineLookup::Found(records.clone()),
            None => BaselineLookup::not_found(format!("no baseline recorded at {reference}")),
        }
    }
}

/// Parses a baseline document: `{ "urls": [...] }`, `{ "rows": [...] }` or a bare array.
/// Non-object elements are dropped.
pub fn parse_baseline(text: &str) -> BaselineLookup {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            return BaselineLookup::not_found(format!("baseline is not valid JSON: {err}"));
        }
    };
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut document) => {
            let rows = document.remove("urls").or_else(|| document.remove("rows"));
            match rows {
                Some(Value::Array(items)) => items,
                _ => return BaselineLookup::not_found("baseline has no `urls` array"),
            }
        }
        _ => return BaselineLookup::not_found("baseline is neither an object nor an array"),
    };
    let total = items.len();
    let records: Vec<RawRecord> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect();
    if records.len() < total {
        debug!(dropped = total - records.len(), "ignoring non-object baseline rows");
    }
    BaselineLookup::Found(records)
}
