//! File and job key catalogs.
//!
//! Upload endpoints and orchestrator jobs are addressed by fixed string
//! keys. The defaults below mirror the orchestrator deployment; callers
//! inject their own catalog through configuration when it differs.

use crate::error::CoreError;

/// A key plus its human-readable label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub key: String,
    pub label: String,
}

impl CatalogEntry {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

/// Ordered set of keys of one kind (`"file"` or `"job"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    kind: &'static str,
    entries: Vec<CatalogEntry>,
}

pub const FILE_KIND: &str = "file";
pub const JOB_KIND: &str = "job";

/// Job whose completion refreshes the bond results table.
pub const BOND_ENRICHMENT_JOB: &str = "bond_enrichment_dag";

const DEFAULT_FILE_KEYS: [(&str, &str); 7] = [
    ("bond", "Bond CSV"),
    ("interestrate", "Interest Rate CSV"),
    ("inflationindex", "Inflation Index CSV"),
    ("inflationexpectation", "Inflation Expectation CSV"),
    ("exchangerate", "Exchange Rate CSV"),
    ("foreignexchange", "Foreign Exchange CSV"),
    ("forwardcurve", "Forward Curve CSV"),
];

const DEFAULT_JOB_KEYS: [(&str, &str); 8] = [
    ("bond_ingestion_dag", "Bond Ingestion DAG"),
    ("interest_rate_dag", "Interest Rate DAG"),
    ("inflation_index_dag", "Inflation Index DAG"),
    ("inflation_expectation_dag", "Inflation Expectation DAG"),
    ("exchange_rate_dag", "Exchange Rate DAG"),
    ("foreign_exchange_dag", "Foreign Exchange DAG"),
    ("forward_curve_dag", "Forward Curve DAG"),
    (BOND_ENRICHMENT_JOB, "Bond Enrichment DAG"),
];

impl Catalog {
    pub fn new(kind: &'static str, entries: Vec<CatalogEntry>) -> Self {
        Self { kind, entries }
    }

    /// The upload file keys known to the orchestrator.
    pub fn default_files() -> Self {
        Self::from_pairs(FILE_KIND, &DEFAULT_FILE_KEYS)
    }

    /// The orchestrator jobs the console can trigger.
    pub fn default_jobs() -> Self {
        Self::from_pairs(JOB_KIND, &DEFAULT_JOB_KEYS)
    }

    /// Build a catalog from a comma-separated key list.
    ///
    /// Keys that appear in the matching default catalog keep their label;
    /// others get a label derived from the key. Blank items are ignored
    /// and an empty list is rejected.
    pub fn from_keys(kind: &'static str, list: &str) -> Result<Self, CoreError> {
        let defaults = match kind {
            FILE_KIND => Self::default_files(),
            _ => Self::default_jobs(),
        };

        let mut entries: Vec<CatalogEntry> = Vec::new();
        for key in list.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            if entries.iter().any(|e| e.key == key) {
                continue;
            }
            let label = defaults
                .label(key)
                .map(str::to_owned)
                .unwrap_or_else(|| label_from_key(key));
            entries.push(CatalogEntry::new(key, label));
        }

        if entries.is_empty() {
            return Err(CoreError::Validation(format!("{kind} key list is empty")));
        }
        Ok(Self { kind, entries })
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.label.as_str())
    }

    /// Look up a key, failing with [`CoreError::UnknownKey`].
    pub fn require(&self, key: &str) -> Result<&CatalogEntry, CoreError> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .ok_or_else(|| CoreError::UnknownKey {
                kind: self.kind,
                key: key.to_owned(),
            })
    }

    fn from_pairs(kind: &'static str, pairs: &[(&str, &str)]) -> Self {
        Self {
            kind,
            entries: pairs
                .iter()
                .map(|(key, label)| CatalogEntry::new(*key, *label))
                .collect(),
        }
    }
}

/// `forward_curve_dag` -> `Forward Curve Dag`.
fn label_from_key(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
