//! Record normalization: heterogeneous raw records into canonical [`Entry`] values.
//!
//! Every field is located by an ordered list of strategies kept as data in
//! [`ExtractionRules`]; the first strategy that yields a value wins.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::entry::{Entry, RawRecord};
use crate::identity::domain_of;

/// Where to look for a field inside a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLocator {
    /// Exact key name.
    Key(&'static str),
    /// Any key whose lower-cased name contains the fragment, in key order.
    KeyContaining(&'static str),
}

/// Ordered extraction strategies for every canonical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRules {
    /// Alternatives for the page URL.
    pub url: Vec<FieldLocator>,
    /// Alternatives for an explicit domain.
    pub domain: Vec<FieldLocator>,
    /// Alternatives for the title.
    pub title: Vec<FieldLocator>,
    /// Alternatives for the source's update date.
    pub updated_at: Vec<FieldLocator>,
    /// Alternatives for the status label.
    pub status: Vec<FieldLocator>,
    /// Prioritized code containers, then suggestive key fragments.
    pub codes: Vec<FieldLocator>,
    /// Sub-fields that carry the code when a container holds objects.
    pub code_subfields: Vec<&'static str>,
    /// Numeric-looking total fields.
    pub total: Vec<FieldLocator>,
    /// Separators used when a code container is a single string.
    pub code_separators: Vec<char>,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        use FieldLocator::{Key, KeyContaining};
        Self {
            url: vec![Key("url"), Key("href"), Key("link"), Key("uri")],
            domain: vec![Key("domain"), Key("host"), Key("hostname")],
            title: vec![Key("title"), Key("name"), Key("heading")],
            updated_at: vec![
                Key("updatedAt"),
                Key("updated_at"),
                Key("updated"),
                Key("lastChecked"),
                Key("lastUpdated"),
                Key("date"),
            ],
            status: vec![Key("status"), Key("state")],
            codes: vec![
                Key("nonConformities"),
                Key("nonconformities"),
                Key("violations"),
                Key("wcag"),
                Key("requirements"),
                Key("issues"),
                Key("codes"),
                KeyContaining("nonconform"),
                KeyContaining("violation"),
                KeyContaining("issue"),
                KeyContaining("wcag"),
                KeyContaining("brudd"),
            ],
            code_subfields: vec![
                "code",
                "id",
                "criterion",
                "successCriterion",
                "sc",
                "wcag",
                "name",
            ],
            total: vec![
                Key("totalNonConformities"),
                Key("total_non_conformities"),
                Key("nonConformityCount"),
                Key("violationCount"),
                Key("total"),
                Key("count"),
            ],
            code_separators: vec![';', ',', '|', '\n'],
        }
    }
}

/// Stateless record normalization service.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    rules: ExtractionRules,
}

impl Normalizer {
    /// Builds a normalizer over the given rules.
    pub fn new(rules: ExtractionRules) -> Self {
        Self { rules }
    }

    /// Converts one raw record into an [`Entry`]. Never fails; malformed
    /// fields fall back to computed defaults.
    pub fn normalize(&self, raw: &RawRecord) -> Entry {
        let url = first_text(raw, &self.rules.url).unwrap_or_default();
        let domain = first_text(raw, &self.rules.domain).unwrap_or_else(|| domain_of(&url));
        let title = first_text(raw, &self.rules.title).unwrap_or_default();
        let updated_at = first_text(raw, &self.rules.updated_at).unwrap_or_default();
        let status = first_text(raw, &self.rules.status);

        let non_conformities = self.codes(raw);
        let total_non_conformities = self.total(raw).unwrap_or(non_conformities.len() as u64);

        Entry {
            url,
            domain,
            title,
            updated_at,
            status,
            non_conformities,
            total_non_conformities,
        }
    }

    /// Normalizes every object in a JSON array-like dataset, skipping non-objects.
    pub fn normalize_values<'a, I>(&self, values: I) -> Vec<Entry>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(raw) => Some(self.normalize(raw)),
                other => {
                    debug!(kind = value_kind(other), "skipping non-object record");
                    None
                }
            })
            .collect()
    }

    fn codes(&self, raw: &RawRecord) -> Vec<String> {
        let Some((key, value)) = locate(raw, &self.rules.codes, is_present) else {
            return Vec::new();
        };
        let mut codes = BTreeSet::new();
        match value {
            Value::String(text) => {
                for piece in text.split(self.rules.code_separators.as_slice()) {
                    insert_code(&mut codes, piece);
                }
            }
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::Object(fields) => {
                            if let Some(code) = self
                                .rules
                                .code_subfields
                                .iter()
                                .find_map(|name| fields.get(*name).and_then(scalar_text))
                            {
                                insert_code(&mut codes, &code);
                            }
                        }
                        other => {
                            if let Some(code) = scalar_text(other) {
                                insert_code(&mut codes, &code);
                            }
                        }
                    }
                }
            }
            Value::Object(fields) => {
                for code in fields.keys() {
                    insert_code(&mut codes, code);
                }
            }
            other => {
                debug!(key, kind = value_kind(other), "unsupported code container");
            }
        }
        codes.into_iter().collect()
    }

    fn total(&self, raw: &RawRecord) -> Option<u64> {
        for locator in &self.rules.total {
            for (key, value) in candidates(raw, *locator) {
                if let Some(total) = parse_count(value) {
                    return Some(total);
                }
                if !value.is_null() {
                    debug!(key, "ignoring non-numeric count field");
                }
            }
        }
        None
    }
}

fn candidates<'r>(
    raw: &'r RawRecord,
    locator: FieldLocator,
) -> Box<dyn Iterator<Item = (&'r str, &'r Value)> + 'r> {
    match locator {
        FieldLocator::Key(name) => {
            Box::new(raw.get(name).map(|value| (name, value)).into_iter())
        }
        FieldLocator::KeyContaining(fragment) => Box::new(
            raw.iter()
                .filter(move |(key, _)| key.to_lowercase().contains(fragment))
                .map(|(k, v)| (k.as_str(), v)),
        ),
    }
}

fn locate<'r>(
    raw: &'r RawRecord,
    locators: &[FieldLocator],
    accept: fn(&Value) -> bool,
) -> Option<(&'r str, &'r Value)> {
    locators
        .iter()
        .find_map(|locator| candidates(raw, *locator).find(|(_, value)| accept(value)))
}

fn first_text(raw: &RawRecord, locators: &[FieldLocator]) -> Option<String> {
    locators.iter().find_map(|locator| {
        candidates(raw, *locator).find_map(|(_, value)| {
            scalar_text(value)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
        })
    })
}

/// Empty containers and `false` count as absent so later alternatives are tried.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Number(_) => true,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn insert_code(codes: &mut BTreeSet<String>, raw: &str) {
    let code = raw.trim();
    if !code.is_empty() {
        codes.insert(code.to_string());
    }
}

fn parse_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
