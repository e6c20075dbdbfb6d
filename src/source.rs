//! Reading the freshly produced dataset: a JSON document with a `urls`
//! collection, or a delimited-text table as fallback.

use std::fs;
use std::mem::take;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::entry::{Entry, RawRecord};
use crate::error::ArchiveError;
use crate::normalizer::Normalizer;

/// Which input form produced the current dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `{ "urls": [...] }` document.
    Json,
    /// Delimited text table with a header row.
    Delimited,
}

/// Normalized current dataset plus its origin.
#[derive(Debug, Clone)]
pub struct CurrentDataset {
    /// Input form that was used.
    pub kind: SourceKind,
    /// Normalized entries in source order.
    pub entries: Vec<Entry>,
}

/// Reads the current dataset, preferring `json_path` and falling back to `csv_path`.
pub fn read_current(
    json_path: &Path,
    csv_path: &Path,
    normalizer: &Normalizer,
) -> Result<CurrentDataset, ArchiveError> {
    if let Some(values) = read_json_urls(json_path) {
        let entries = normalizer.normalize_values(&values);
        info!(path = %json_path.display(), entries = entries.len(), "read JSON dataset");
        return Ok(CurrentDataset {
            kind: SourceKind::Json,
            entries,
        });
    }

    if let Some(records) = read_delimited(csv_path) {
        let entries: Vec<Entry> = records
            .iter()
            .map(|record| normalizer.normalize(record))
            .collect();
        info!(path = %csv_path.display(), entries = entries.len(), "read delimited dataset");
        return Ok(CurrentDataset {
            kind: SourceKind::Delimited,
            entries,
        });
    }

    Err(ArchiveError::MissingSource {
        json: json_path.to_path_buf(),
        csv: csv_path.to_path_buf(),
    })
}

fn read_json_urls(path: &Path) -> Option<Vec<Value>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            debug!(path = %path.display(), %err, "JSON dataset unavailable");
            return None;
        }
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(mut document)) => match document.remove("urls") {
            Some(Value::Array(urls)) => Some(urls),
            _ => {
                warn!(path = %path.display(), "JSON dataset has no `urls` array");
                None
            }
        },
        Ok(_) => {
            warn!(path = %path.display(), "JSON dataset is not an object");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "JSON dataset is not valid JSON");
            None
        }
    }
}

fn read_delimited(path: &Path) -> Option<Vec<RawRecord>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            debug!(path = %path.display(), %err, "delimited dataset unavailable");
            return None;
        }
    };
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    let separator = detect_separator(text);
    let mut rows = parse_rows(text, separator).into_iter();
    let header: Vec<String> = rows
        .next()?
        .into_iter()
        .map(|cell| cell.trim().to_string())
        .collect();
    if header.iter().all(|cell| cell.is_empty()) {
        warn!(path = %path.display(), "delimited dataset has an empty header row");
        return None;
    }
    Some(rows.map(|row| record_from_row(&header, row)).collect())
}

/// Builds a raw record from one table row. Missing trailing cells are empty strings.
pub fn record_from_row(header: &[String], row: Vec<String>) -> RawRecord {
    let mut cells = row.into_iter();
    let mut record = RawRecord::new();
    for name in header {
        let cell = cells.next().unwrap_or_default();
        if name.is_empty() {
            continue;
        }
        record.insert(name.clone(), Value::String(cell));
    }
    record
}

/// Picks the separator that occurs most often in the header line; `,` on ties.
pub fn detect_separator(text: &str) -> char {
    let header = text.lines().next().unwrap_or_default();
    [',', ';', '\t']
        .into_iter()
        .map(|sep| (sep, header.matches(sep).count()))
        .fold((',', 0), |best, candidate| {
            if candidate.1 > best.1 {
                candidate
            } else {
                best
            }
        })
        .0
}

/// Quote-aware delimited-text parser tolerant of CRLF; blank rows are skipped.
pub fn parse_rows(text: &str, sep: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            c if c == sep && !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                push_row(&mut rows, take(&mut row));
            }
            _ => field.push(ch),
        }
    }

    // Unterminated quotes still flush the trailing row.
    row.push(field);
    push_row(&mut rows, row);
    rows
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    if row.iter().any(|cell| !cell.is_empty()) {
        rows.push(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn parses_quotes_and_crlf() {
        let rows = parse_rows("a,b\r\n\"x, y\",\"say \"\"hi\"\"\"\r\n\r\n", ',');
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["x, y".to_string(), "say \"hi\"".to_string()],
            ]
        );
    }

    #[test]
    fn detects_separator_from_header() {
        assert_eq!(detect_separator("url;title;violations\n"), ';');
        assert_eq!(detect_separator("url\ttitle\n"), '\t');
        assert_eq!(detect_separator("url,title\n"), ',');
        assert_eq!(detect_separator("url\n"), ',');
    }

    #[test]
    fn short_rows_fill_missing_cells() {
        let header = vec!["url".to_string(), "title".to_string()];
        let record = record_from_row(&header, vec!["https://a.no".to_string()]);
        assert_eq!(record["title"], Value::String(String::new()));
    }

    #[test]
    fn prefers_json_document() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("details.json");
        let csv = dir.path().join("status.csv");
        fs::write(
            &json,
            r#"{"urls": [{"url": "https://a.no/x", "violations": ["1.1.1"]}, "noise"]}"#,
        )
        .unwrap();
        fs::write(&csv, "url\nhttps://b.no\n").unwrap();

        let dataset = read_current(&json, &csv, &Normalizer::default()).unwrap();
        assert_eq!(dataset.kind, SourceKind::Json);
        assert_eq!(dataset.entries.len(), 1);
        assert_eq!(dataset.entries[0].non_conformities, vec!["1.1.1"]);
    }

    #[test]
    fn falls_back_to_delimited_table_when_json_lacks_urls() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("details.json");
        let csv = dir.path().join("status.csv");
        fs::write(&json, r#"{"rows": []}"#).unwrap();
        fs::write(
            &csv,
            "url,title,violations,totalNonConformities\nhttps://b.no/side,B,\"1.1.1;2.4.4\",\n",
        )
        .unwrap();

        let dataset = read_current(&json, &csv, &Normalizer::default()).unwrap();
        assert_eq!(dataset.kind, SourceKind::Delimited);
        let entry = &dataset.entries[0];
        assert_eq!(entry.domain, "b.no");
        assert_eq!(entry.non_conformities, vec!["1.1.1", "2.4.4"]);
        assert_eq!(entry.total_non_conformities, 2);
    }

    #[test]
    fn header_only_table_is_a_valid_empty_dataset() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("status.csv");
        fs::write(&csv, "url,title\n").unwrap();
        let dataset =
            read_current(&dir.path().join("missing.json"), &csv, &Normalizer::default()).unwrap();
        assert!(dataset.entries.is_empty());
    }

    #[test]
    fn missing_both_sources_is_fatal() {
        let dir = tempdir().unwrap();
        let err = read_current(
            &dir.path().join("missing.json"),
            &dir.path().join("missing.csv"),
            &Normalizer::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::MissingSource { .. }));
    }
}
