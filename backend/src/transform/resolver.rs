//! Source resolution.
//!
//! Every [`FieldSpec`] is bound once per file against the sheet's columns,
//! giving a [`Binding`]. Row values are then read per row from the binding,
//! so header lookups and fuzzy matching never run inside the row loop.

use rapidfuzz::distance::indel;

use crate::api::logs::log_warning;
use crate::error::ConversionWarning;
use crate::models::{column_index, FieldSpec, SourceRef};
use crate::sheet::{clean_str, clean_text, SheetRow, SheetTable, Workbook};

/// Default similarity a fuzzy header match must reach.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.7;

/// Prefixes that mark an explicit reference; such sources are never fuzzy-matched.
const RESERVED_PREFIXES: [&str; 2] = ["CELL", "COLUMN"];

/// How a field is read once bound to a sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Same cleaned value for every row (constants and cell reads).
    Value(String),
    /// Per-row read of a column position.
    Column(usize),
    /// No source could be located; the field is omitted.
    Unresolved,
}

impl Binding {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Binding::Unresolved)
    }
}

/// Fuzzy matching switches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub fuzzy: bool,
    pub threshold: f64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            fuzzy: true,
            threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

/// Resolves field sources against one loaded sheet.
pub struct SourceResolver<'a> {
    workbook: &'a Workbook,
    table: &'a SheetTable,
    options: MatchOptions,
}

impl<'a> SourceResolver<'a> {
    pub fn new(workbook: &'a Workbook, table: &'a SheetTable, options: MatchOptions) -> Self {
        Self {
            workbook,
            table,
            options,
        }
    }

    /// Bind a spec to this sheet. Failures come back as a warning with an
    /// [`Binding::Unresolved`] binding.
    pub fn bind(&self, spec: &FieldSpec) -> (Binding, Option<ConversionWarning>) {
        let failed = |reason: String| {
            let warning = ConversionWarning::HeaderResolution {
                section: spec.section.to_string(),
                tag: spec.tag.clone(),
                source: spec.source.to_string(),
                reason,
            };
            (Binding::Unresolved, Some(warning))
        };

        match &spec.source {
            SourceRef::Constant(text) => (Binding::Value(clean_str(text)), None),
            SourceRef::Cell(address) => match self.workbook.cell(address) {
                Some(value) => (Binding::Value(clean_text(value)), None),
                None => failed(format!("cell {} is outside the sheet", address)),
            },
            SourceRef::ColumnLetter(letters) => match column_index(letters) {
                Some(index) if index < self.table.columns().len() => (Binding::Column(index), None),
                _ => failed(format!(
                    "column {} is outside the {} sheet columns",
                    letters,
                    self.table.columns().len()
                )),
            },
            SourceRef::ColumnName(name) => match self.match_column(name) {
                Some(index) => (Binding::Column(index), None),
                None => failed("no matching column".to_string()),
            },
        }
    }

    /// Exact, then fuzzy, match of a normalized column name.
    pub fn match_column(&self, normalized: &str) -> Option<usize> {
        if normalized.is_empty() {
            return None;
        }
        if let Some(index) = self.table.position(normalized) {
            return Some(index);
        }
        if !self.options.fuzzy || RESERVED_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
            return None;
        }
        best_fuzzy_match(normalized, self.table.column_names(), self.options.threshold)
    }

    /// Read a bound field for one row.
    pub fn read(&self, binding: &Binding, row: &SheetRow) -> String {
        match binding {
            Binding::Value(value) => value.clone(),
            Binding::Column(index) => row.text(*index),
            Binding::Unresolved => String::new(),
        }
    }

    /// Bind and read in one step. A resolution warning goes to the log.
    pub fn resolve(&self, spec: &FieldSpec, row: &SheetRow) -> String {
        let (binding, warning) = self.bind(spec);
        if let Some(warning) = warning {
            log_warning(warning.to_string());
        }
        self.read(&binding, row)
    }
}

/// Leftmost candidate with the highest indel similarity at or above `threshold`.
pub fn best_fuzzy_match<'c>(
    needle: &str,
    candidates: impl IntoIterator<Item = &'c str>,
    threshold: f64,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.into_iter().enumerate() {
        if candidate.is_empty() {
            continue;
        }
        let score = indel::normalized_similarity(needle.chars(), candidate.chars());
        if score < threshold {
            continue;
        }
        // strict comparison keeps the leftmost column on ties
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Section;
    use crate::sheet::CellValue;
    use crate::transform::normalize::HeaderNormalizer;

    fn sheet() -> (Workbook, SheetTable) {
        let rows: Vec<Vec<CellValue>> = [
            vec!["Booking", "", "", "PO12345"],
            vec!["Collection Reference", "Collection Town", "Delivery Adress", "Pallets"],
            vec!["C1", "Belfast", "1 Main St", "12.0"],
        ]
        .iter()
        .map(|r| r.iter().map(|v| CellValue::from(*v)).collect())
        .collect();
        let workbook = Workbook::from_rows("Sheet1", rows);
        let table = SheetTable::from_workbook(&workbook, 2, &HeaderNormalizer::default()).unwrap();
        (workbook, table)
    }

    fn spec(section: Section, source: &str) -> FieldSpec {
        FieldSpec::new(section, "field", SourceRef::parse(source, section))
    }

    #[test]
    fn test_constant_and_cell() {
        let (wb, table) = sheet();
        let resolver = SourceResolver::new(&wb, &table, MatchOptions::default());
        let row = &table.rows()[0];

        assert_eq!(resolver.resolve(&spec(Section::Header, "Kettyle Foods"), row), "Kettyle Foods");
        assert_eq!(resolver.resolve(&spec(Section::Header, "CELL D1"), row), "PO12345");
    }

    #[test]
    fn test_cell_out_of_range_warns() {
        let (wb, table) = sheet();
        let resolver = SourceResolver::new(&wb, &table, MatchOptions::default());
        let (binding, warning) = resolver.bind(&spec(Section::Header, "CELL Z99"));
        assert_eq!(binding, Binding::Unresolved);
        assert!(matches!(warning, Some(ConversionWarning::HeaderResolution { .. })));
    }

    #[test]
    fn test_column_letter() {
        let (wb, table) = sheet();
        let resolver = SourceResolver::new(&wb, &table, MatchOptions::default());
        let row = &table.rows()[0];
        assert_eq!(resolver.resolve(&spec(Section::Pickup, "COLUMN B"), row), "Belfast");
        assert_eq!(resolver.resolve(&spec(Section::Cargo, "COLUMN D"), row), "12");

        let (binding, warning) = resolver.bind(&spec(Section::Pickup, "COLUMN F"));
        assert_eq!(binding, Binding::Unresolved);
        assert!(warning.is_some());
    }

    #[test]
    fn test_exact_name_after_normalization() {
        let (wb, table) = sheet();
        let resolver = SourceResolver::new(&wb, &table, MatchOptions::default());
        let row = &table.rows()[0];
        assert_eq!(resolver.resolve(&spec(Section::Delivery, "delivery address"), row), "1 Main St");
        assert_eq!(resolver.resolve(&spec(Section::Pickup, "COLLECTION-TOWN"), row), "Belfast");
    }

    #[test]
    fn test_fuzzy_match() {
        let (wb, table) = sheet();
        let resolver = SourceResolver::new(&wb, &table, MatchOptions::default());
        let (binding, warning) = resolver.bind(&spec(Section::Pickup, "Collection Towns"));
        assert_eq!(binding, Binding::Column(1));
        assert!(warning.is_none());
    }

    #[test]
    fn test_fuzzy_disabled() {
        let (wb, table) = sheet();
        let options = MatchOptions {
            fuzzy: false,
            ..MatchOptions::default()
        };
        let resolver = SourceResolver::new(&wb, &table, options);
        let (binding, _) = resolver.bind(&spec(Section::Pickup, "Collection Towns"));
        assert_eq!(binding, Binding::Unresolved);
    }

    #[test]
    fn test_reserved_prefix_is_not_fuzzy_matched() {
        let (wb, table) = sheet();
        let resolver = SourceResolver::new(&wb, &table, MatchOptions::default());
        // "COLUMN TOWN" is not a column letter, stays a column name
        let (binding, warning) = resolver.bind(&spec(Section::Pickup, "Column Town"));
        assert_eq!(binding, Binding::Unresolved);
        assert!(warning.is_some());
    }

    #[test]
    fn test_unmatched_name_warns() {
        let (wb, table) = sheet();
        let resolver = SourceResolver::new(&wb, &table, MatchOptions::default());
        let (binding, warning) = resolver.bind(&spec(Section::Cargo, "Weight Kg"));
        assert_eq!(binding, Binding::Unresolved);
        match warning {
            Some(ConversionWarning::HeaderResolution { section, source, .. }) => {
                assert_eq!(section, "cargo");
                assert_eq!(source, "WEIGHTKG");
            }
            other => panic!("unexpected warning: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_logs_unresolved_source() {
        use crate::api::logs::{LogLevel, LOG_BROADCASTER};
        use tokio::sync::broadcast::error::TryRecvError;

        let (wb, table) = sheet();
        let resolver = SourceResolver::new(&wb, &table, MatchOptions::default());
        let mut rx = LOG_BROADCASTER.subscribe();
        let spec = FieldSpec::new(
            Section::Delivery,
            "tail_lift",
            SourceRef::parse("Tail Lift Required", Section::Delivery),
        );
        assert_eq!(resolver.resolve(&spec, &table.rows()[0]), "");

        let mut logged = false;
        loop {
            match rx.try_recv() {
                Ok(entry) => {
                    if entry.level == LogLevel::Warning && entry.message.contains("tail_lift") {
                        logged = true;
                    }
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        assert!(logged);
    }

    #[test]
    fn test_best_fuzzy_ties_go_left() {
        let names = ["ABCX", "ABCY"];
        assert_eq!(best_fuzzy_match("ABC", names, 0.5), Some(0));
        assert_eq!(best_fuzzy_match("QQQ", names, 0.7), None);
    }
}
