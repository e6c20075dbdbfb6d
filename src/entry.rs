//! Canonical conformance record shared by every stage of the archive.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Raw record of unknown shape, as read from a dataset or a historical baseline.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Normalized per-page conformance record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Page URL, trimmed; may be empty.
    pub url: String,
    /// Host of the page, explicit or derived from `url`.
    pub domain: String,
    /// Page or declaration title.
    pub title: String,
    /// Free-form date string reported by the source.
    pub updated_at: String,
    /// Optional status label reported by the source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Sorted, deduplicated nonconformity codes.
    pub non_conformities: Vec<String>,
    /// Reported total, or the number of codes when the source gave none.
    pub total_non_conformities: u64,
}

impl Entry {
    /// SHA-256 over the entry's JSON form with keys sorted, as lower-case hex.
    pub fn fingerprint(&self) -> String {
        // serde_json's default map is ordered by key, so the encoding is canonical.
        let canonical = serde_json::to_value(self)
            .map(|value| value.to_string())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Effective date of this entry: the first ten characters of `updated_at`.
    pub fn updated_date(&self) -> Option<String> {
        let trimmed = self.updated_at.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.chars().take(10).collect())
    }
}
