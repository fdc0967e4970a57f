//! Header normalization.
//!
//! Spreadsheet headers arrive with arbitrary case, punctuation and vendor
//! misspellings. Every header and every column-name source is reduced to
//! uppercase alphanumerics, then corrected against a [`CorrectionTable`].

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Z0-9]").unwrap());

/// Built-in spelling corrections, applied after stripping.
///
/// No entry's target may contain any entry's source, otherwise
/// normalization stops being idempotent.
const BUILTIN_CORRECTIONS: &[(&str, &str)] = &[
    ("ADRESS", "ADDRESS"),
    ("ADDRES1", "ADDRESS1"),
    ("DELIVARY", "DELIVERY"),
    ("DELIEVRY", "DELIVERY"),
    ("COLECTION", "COLLECTION"),
    ("REFRENCE", "REFERENCE"),
    ("REFERNCE", "REFERENCE"),
    ("POSTCDE", "POSTCODE"),
];

/// Versioned header spelling corrections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionTable {
    version: u32,
    entries: Vec<(String, String)>,
}

impl CorrectionTable {
    /// Current built-in table.
    pub fn builtin() -> Self {
        Self {
            version: 1,
            entries: BUILTIN_CORRECTIONS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    /// A table without corrections.
    pub fn empty() -> Self {
        Self {
            version: 0,
            entries: Vec::new(),
        }
    }

    /// Add a correction. Both sides are normalized first.
    pub fn with_entry(mut self, from: &str, to: &str) -> Self {
        let from = strip(from);
        let to = strip(to);
        if !from.is_empty() {
            self.entries.push((from, to));
        }
        self
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    fn apply(&self, text: String) -> String {
        self.entries
            .iter()
            .fold(text, |acc, (from, to)| acc.replace(from.as_str(), to))
    }
}

impl Default for CorrectionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Canonicalizes header text for comparison.
#[derive(Debug, Clone, Default)]
pub struct HeaderNormalizer {
    corrections: CorrectionTable,
}

impl HeaderNormalizer {
    pub fn new(corrections: CorrectionTable) -> Self {
        Self { corrections }
    }

    /// Uppercase, strip everything outside `[A-Z0-9]`, apply corrections.
    pub fn normalize(&self, text: &str) -> String {
        self.corrections.apply(strip(text))
    }

    pub fn corrections(&self) -> &CorrectionTable {
        &self.corrections
    }
}

fn strip(text: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&text.to_uppercase(), "")
        .into_owned()
}

/// Normalize with the built-in correction table.
pub fn normalize(text: &str) -> String {
    static DEFAULT: Lazy<HeaderNormalizer> = Lazy::new(HeaderNormalizer::default);
    DEFAULT.normalize(text)
}
