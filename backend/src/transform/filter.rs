//! Row validity filter.

use crate::error::ConversionWarning;
use crate::sheet::{SheetRow, SheetTable};
use crate::transform::normalize::normalize;

/// Key columns a real shipment row fills in at least one of.
pub const DEFAULT_KEY_COLUMNS: [&str; 3] =
    ["COLLECTIONREFERENCE", "DELIVERYREFERENCE", "GOODSDESCRIPTION"];

/// Decides which data rows are shipment records.
#[derive(Debug, Clone)]
pub struct RowFilter {
    candidates: Vec<String>,
    keys: Vec<usize>,
}

impl RowFilter {
    /// Intersect the candidate keys with the sheet's columns.
    ///
    /// Returns a warning when no candidate is present, in which case any
    /// row with a non-empty cell passes.
    pub fn new(table: &SheetTable, candidates: &[String]) -> (Self, Option<ConversionWarning>) {
        let candidates: Vec<String> = if candidates.is_empty() {
            DEFAULT_KEY_COLUMNS.iter().map(|k| k.to_string()).collect()
        } else {
            candidates.iter().map(|k| normalize(k)).collect()
        };
        let keys: Vec<usize> = candidates
            .iter()
            .filter_map(|name| table.position(name))
            .collect();

        let warning = if keys.is_empty() {
            Some(ConversionWarning::NoKeyColumns {
                candidates: candidates.clone(),
            })
        } else {
            None
        };
        (Self { candidates, keys }, warning)
    }

    /// Whether the filter fell back to "any non-empty cell".
    pub fn is_degraded(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn is_valid_row(&self, row: &SheetRow) -> bool {
        if self.keys.is_empty() {
            return !row.is_blank();
        }
        self.keys.iter().any(|&index| !row.text(index).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{CellValue, Workbook};
    use crate::transform::normalize::HeaderNormalizer;

    fn table(rows: &[&[&str]]) -> SheetTable {
        let cells = rows
            .iter()
            .map(|r| r.iter().map(|v| CellValue::from(*v)).collect())
            .collect();
        let wb = Workbook::from_rows("Sheet1", cells);
        SheetTable::from_workbook(&wb, 1, &HeaderNormalizer::default()).unwrap()
    }

    #[test]
    fn test_row_with_key_value_passes() {
        let t = table(&[
            &["Collection Reference", "Goods Description", "Notes"],
            &["", "Chilled beef", ""],
            &["", "nan", "subtotal"],
            &["C9", "", ""],
        ]);
        let (filter, warning) = RowFilter::new(&t, &[]);
        assert!(warning.is_none());

        let accepted: Vec<bool> = t.rows().iter().map(|r| filter.is_valid_row(r)).collect();
        assert_eq!(accepted, vec![true, false, true]);
    }

    #[test]
    fn test_degrades_without_key_columns() {
        let t = table(&[&["Name", "Town"], &["Acme", ""], &["", "None"]]);
        let (filter, warning) = RowFilter::new(&t, &[]);
        assert!(filter.is_degraded());
        assert!(matches!(warning, Some(ConversionWarning::NoKeyColumns { .. })));

        assert!(filter.is_valid_row(&t.rows()[0]));
        let blank = SheetRow {
            number: 9,
            cells: vec![CellValue::from(""), CellValue::from("None")],
        };
        assert!(!filter.is_valid_row(&blank));
    }

    #[test]
    fn test_custom_keys_are_normalized() {
        let t = table(&[&["Order No", "Qty"], &["", "3"], &["A1", ""]]);
        let (filter, _) = RowFilter::new(&t, &["order-no".to_string()]);
        assert_eq!(filter.candidates(), ["ORDERNO"]);
        assert!(!filter.is_valid_row(&t.rows()[0]));
        assert!(filter.is_valid_row(&t.rows()[1]));
    }
}
