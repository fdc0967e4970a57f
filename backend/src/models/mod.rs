//! Domain models for the Shipload conversion pipeline.
//!
//! - [`Section`] - Output section a field belongs to
//! - [`SourceRef`] - Where a field's value comes from
//! - [`FieldSpec`] - One mapping table entry

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Section
// =============================================================================

/// Output section a field specification targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// Booking-level fields under `transportbooking`.
    Header,
    /// Shipment-level fields (the shipment reference).
    Shipment,
    /// Fields under `pickupaddress`.
    Pickup,
    /// Fields under `deliveryaddress`.
    Delivery,
    /// Fields under `cargo`.
    Cargo,
    /// Unit-bearing columns expanded into unit lines.
    Unit,
}

impl Section {
    /// All sections in document order.
    pub const ALL: [Section; 6] = [
        Section::Header,
        Section::Shipment,
        Section::Pickup,
        Section::Delivery,
        Section::Cargo,
        Section::Unit,
    ];

    /// Parse a section name (case-insensitive, surrounding whitespace ignored).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "header" => Some(Section::Header),
            "shipment" => Some(Section::Shipment),
            "pickup" => Some(Section::Pickup),
            "delivery" => Some(Section::Delivery),
            "cargo" => Some(Section::Cargo),
            "unit" | "units" => Some(Section::Unit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Header => "header",
            Section::Shipment => "shipment",
            Section::Pickup => "pickup",
            Section::Delivery => "delivery",
            Section::Cargo => "cargo",
            Section::Unit => "unit",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Source Reference
// =============================================================================

/// Where a field's value is read from.
///
/// Parsed once from the mapping text, then matched exhaustively by the
/// resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SourceRef {
    /// Literal text.
    Constant(String),
    /// Absolute cell address such as `D2`.
    Cell(String),
    /// Positional column such as `C` or `AA`.
    ColumnLetter(String),
    /// Header text, stored normalized.
    ColumnName(String),
}

impl SourceRef {
    /// Parse mapping source text.
    ///
    /// | Text              | Result                                  |
    /// |-------------------|-----------------------------------------|
    /// | `CELL D2`         | `Cell("D2")`                            |
    /// | `COLUMN C`        | `ColumnLetter("C")`                     |
    /// | `CONST Acme Ltd`  | `Constant("Acme Ltd")`                  |
    /// | `"Acme Ltd"`      | `Constant("Acme Ltd")`                  |
    /// | anything else     | `Constant` in header, else `ColumnName` |
    ///
    /// `CELL`/`COLUMN` text whose operand is not a valid address or letter
    /// falls through to `ColumnName`; the resolver never fuzzy-matches it.
    pub fn parse(text: &str, section: Section) -> Self {
        let trimmed = text.trim();
        let upper = trimmed.to_uppercase();
        let operand = upper.split_whitespace().last().unwrap_or("");

        if upper.starts_with("CELL") && is_cell_address(operand) {
            return SourceRef::Cell(operand.to_string());
        }
        if upper.starts_with("COLUMN") && is_column_letter(operand) {
            return SourceRef::ColumnLetter(operand.to_string());
        }
        if let Some(rest) = strip_prefix_ci(trimmed, "CONST ") {
            return SourceRef::Constant(rest.trim().to_string());
        }
        if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
            return SourceRef::Constant(trimmed[1..trimmed.len() - 1].to_string());
        }

        match section {
            Section::Header => SourceRef::Constant(trimmed.to_string()),
            _ => SourceRef::ColumnName(crate::transform::normalize::normalize(trimmed)),
        }
    }

    /// Build a source from the index-based mapping variant.
    ///
    /// `column_index` is 0-based, `row` is the 1-based spreadsheet row.
    pub fn from_index(column_index: usize, row: Option<usize>) -> Self {
        let letters = column_letters(column_index);
        match row {
            Some(r) if r > 0 => SourceRef::Cell(format!("{}{}", letters, r)),
            _ => SourceRef::ColumnLetter(letters),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::Constant(text) => write!(f, "CONST {}", text),
            SourceRef::Cell(address) => write!(f, "CELL {}", address),
            SourceRef::ColumnLetter(letter) => write!(f, "COLUMN {}", letter),
            SourceRef::ColumnName(name) => f.write_str(name),
        }
    }
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

// =============================================================================
// Column letters and cell addresses
// =============================================================================

/// `true` for one to three ASCII letters.
pub fn is_column_letter(text: &str) -> bool {
    !text.is_empty() && text.len() <= 3 && text.chars().all(|c| c.is_ascii_alphabetic())
}

/// `true` for an A1-style address with a row of at least 1.
pub fn is_cell_address(text: &str) -> bool {
    parse_cell_address(text).is_some()
}

/// Zero-based column index of a column letter (`A` → 0, `AA` → 26).
pub fn column_index(letters: &str) -> Option<usize> {
    if !is_column_letter(letters) {
        return None;
    }
    let index = letters
        .chars()
        .map(|c| c.to_ascii_uppercase() as usize - 'A' as usize + 1)
        .fold(0usize, |acc, digit| acc * 26 + digit);
    Some(index - 1)
}

/// Column letters for a zero-based index (0 → `A`, 26 → `AA`).
pub fn column_letters(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Parse an A1 address into zero-based `(row, column)`.
///
/// `$` anchors are ignored, so `$D$2` reads the same cell as `D2`.
pub fn parse_cell_address(address: &str) -> Option<(usize, usize)> {
    let cleaned: String = address.trim().chars().filter(|c| *c != '$').collect();
    let split = cleaned.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cleaned.split_at(split);
    let col = column_index(letters)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col))
}

// =============================================================================
// Field Specification
// =============================================================================

/// One mapping table entry. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Output section.
    pub section: Section,
    /// Output element name (or unit label for the `unit` section).
    pub tag: String,
    /// Value source.
    pub source: SourceRef,
    /// Optional `matchmode` attribute value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matchmode: Option<String>,
}

impl FieldSpec {
    pub fn new(section: Section, tag: impl Into<String>, source: SourceRef) -> Self {
        Self {
            section,
            tag: tag.into(),
            source,
            matchmode: None,
        }
    }

    /// Set the matchmode attribute.
    pub fn with_matchmode(mut self, matchmode: impl Into<String>) -> Self {
        let value = matchmode.into();
        self.matchmode = if value.trim().is_empty() {
            None
        } else {
            Some(value.trim().to_string())
        };
        self
    }

    /// Whether this spec is the shipment/booking reference field.
    pub fn is_reference(&self) -> bool {
        self.tag.eq_ignore_ascii_case("reference")
    }
}
