//! Spreadsheet loading.
//!
//! A [`Workbook`] is the raw, unfiltered cell grid of one worksheet. It
//! answers arbitrary cell reads by address. A [`SheetTable`] is the view
//! below a chosen header row: normalized column names, original labels and
//! the non-blank data rows.
//!
//! ```text
//! .xlsx/.xls/.ods ──calamine──┐
//!                             ├──▶ Workbook (grid) ──header row──▶ SheetTable
//! .csv ─────────parser────────┘
//! ```

pub mod cell;

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use crate::error::{SheetError, SheetResult};
use crate::models::parse_cell_address;
use crate::parser::parse_bytes_auto;
use crate::transform::normalize::HeaderNormalizer;

pub use cell::{clean_str, clean_text, CellValue, EMPTY_SENTINELS};

// =============================================================================
// Workbook (unfiltered grid)
// =============================================================================

/// Supported input kinds, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    /// Anything calamine can open.
    Workbook,
    /// Delimited text.
    Csv,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> SheetResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        Self::from_extension(&ext)
    }

    pub fn from_extension(ext: &str) -> SheetResult<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "xla" | "xlam" | "ods" => Ok(SheetFormat::Workbook),
            "csv" | "txt" => Ok(SheetFormat::Csv),
            other => Err(SheetError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// One worksheet as an absolute grid, row 0 / column 0 being cell `A1`.
///
/// Formula cells hold their cached results.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    sheet_name: String,
    cells: Vec<Vec<CellValue>>,
}

impl Workbook {
    /// Build from rows of values, first row being spreadsheet row 1.
    pub fn from_rows(sheet_name: impl Into<String>, cells: Vec<Vec<CellValue>>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            cells,
        }
    }

    /// Open a spreadsheet file; `sheet` selects a worksheet by name, else the first.
    pub fn open(path: &Path, sheet: Option<&str>) -> SheetResult<Self> {
        match SheetFormat::from_path(path)? {
            SheetFormat::Workbook => {
                let mut workbook = open_workbook_auto(path)?;
                let name = pick_sheet(&workbook.sheet_names(), sheet)?;
                let range = workbook.worksheet_range(&name)?;
                Ok(Self::from_range(name, &range))
            }
            SheetFormat::Csv => {
                let bytes = std::fs::read(path).map_err(|source| SheetError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                let name = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("Sheet1");
                Self::from_csv_bytes(name, &bytes)
            }
        }
    }

    /// Open in-memory bytes of the given format.
    pub fn from_bytes(bytes: Vec<u8>, format: SheetFormat, sheet: Option<&str>) -> SheetResult<Self> {
        match format {
            SheetFormat::Workbook => {
                let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
                let name = pick_sheet(&workbook.sheet_names(), sheet)?;
                let range = workbook.worksheet_range(&name)?;
                Ok(Self::from_range(name, &range))
            }
            SheetFormat::Csv => Self::from_csv_bytes(sheet.unwrap_or("Sheet1"), &bytes),
        }
    }

    /// Parse delimited text; every field becomes text or empty.
    pub fn from_csv_bytes(name: &str, bytes: &[u8]) -> SheetResult<Self> {
        let table = parse_bytes_auto(bytes).map_err(|e| SheetError::Csv(e.to_string()))?;
        let cells = table
            .records
            .iter()
            .map(|record| record.iter().map(|v| CellValue::from(v.as_str())).collect())
            .collect();
        Ok(Self::from_rows(name, cells))
    }

    fn from_range(name: String, range: &Range<Data>) -> Self {
        let (row_offset, col_offset) = range
            .start()
            .map(|(r, c)| (r as usize, c as usize))
            .unwrap_or((0, 0));

        let mut cells: Vec<Vec<CellValue>> = vec![Vec::new(); row_offset];
        for row in range.rows() {
            let mut values = vec![CellValue::Empty; col_offset];
            values.extend(row.iter().map(convert_data));
            cells.push(values);
        }
        Self::from_rows(name, cells)
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Number of rows in the grid.
    pub fn height(&self) -> usize {
        self.cells.len()
    }

    /// Value at zero-based `(row, col)`; outside the grid reads as empty.
    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Read a cell by A1 address. `None` if the address is malformed or
    /// outside the used area of the sheet.
    pub fn cell(&self, address: &str) -> Option<&CellValue> {
        let (row, col) = parse_cell_address(address)?;
        // Short rows inside the used area read as empty.
        if row < self.height() && col < self.width() {
            Some(self.get(row, col))
        } else {
            None
        }
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.cells.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    /// Raw rows, row 0 being spreadsheet row 1.
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.cells
    }
}

fn pick_sheet(names: &[String], wanted: Option<&str>) -> SheetResult<String> {
    match wanted {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted || n.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| SheetError::MissingSheet(wanted.to_string())),
        None => names
            .first()
            .cloned()
            .ok_or_else(|| SheetError::MissingSheet("workbook has no worksheets".to_string())),
    }
}

fn convert_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => {
            CellValue::from_excel_serial(dt.as_f64()).unwrap_or(CellValue::Float(dt.as_f64()))
        }
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
    }
}

fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

// =============================================================================
// SheetTable (headered view)
// =============================================================================

/// A column of the headered view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Normalized name used for matching.
    pub name: String,
    /// Header text as found in the sheet (after blank/duplicate handling).
    pub label: String,
}

/// A data row below the header.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// 1-based spreadsheet row number.
    pub number: usize,
    pub cells: Vec<CellValue>,
}

impl SheetRow {
    /// Value at a column position; missing trailing cells read as empty.
    pub fn get(&self, index: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cells.get(index).unwrap_or(&EMPTY)
    }

    /// Cleaned text at a column position.
    pub fn text(&self, index: usize) -> String {
        clean_text(self.get(index))
    }

    /// Whether every cell cleans to empty.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(CellValue::is_blank)
    }
}

/// The sheet seen from a header row: named columns and data rows.
#[derive(Debug, Clone)]
pub struct SheetTable {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    rows: Vec<SheetRow>,
    header_row: usize,
    blank_rows: usize,
}

impl SheetTable {
    /// Build the view with `header_row` (1-based) as column names.
    ///
    /// Blank header cells become `Unnamed: <n>`, repeated headers get `.1`,
    /// `.2` suffixes, and fully blank data rows are dropped.
    pub fn from_workbook(
        workbook: &Workbook,
        header_row: usize,
        normalizer: &HeaderNormalizer,
    ) -> SheetResult<Self> {
        if header_row == 0 || header_row > workbook.height() {
            return Err(SheetError::HeaderRowOutOfRange {
                row: header_row,
                rows: workbook.height(),
            });
        }

        let width = workbook.width();
        let labels = header_labels(workbook, header_row - 1, width);

        let mut columns = Vec::with_capacity(width);
        let mut index = HashMap::new();
        for (position, label) in labels.into_iter().enumerate() {
            let name = normalizer.normalize(&label);
            index.entry(name.clone()).or_insert(position);
            columns.push(Column { name, label });
        }

        let mut rows = Vec::new();
        let mut blank_rows = 0;
        for (offset, raw) in workbook.rows().iter().enumerate().skip(header_row) {
            let row = SheetRow {
                number: offset + 1,
                cells: raw.iter().take(width).cloned().collect(),
            };
            if row.is_blank() {
                blank_rows += 1;
                continue;
            }
            rows.push(row);
        }

        Ok(Self {
            columns,
            index,
            rows,
            header_row,
            blank_rows,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Normalized column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of the first column with this normalized name.
    pub fn position(&self, normalized: &str) -> Option<usize> {
        self.index.get(normalized).copied()
    }

    pub fn column(&self, position: usize) -> Option<&Column> {
        self.columns.get(position)
    }

    pub fn rows(&self) -> &[SheetRow] {
        &self.rows
    }

    /// 1-based header row this view was built from.
    pub fn header_row(&self) -> usize {
        self.header_row
    }

    /// Fully blank rows dropped at load.
    pub fn blank_rows(&self) -> usize {
        self.blank_rows
    }
}

fn header_labels(workbook: &Workbook, row: usize, width: usize) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    (0..width)
        .map(|col| {
            let text = clean_text(workbook.get(row, col));
            let base = if text.is_empty() {
                format!("Unnamed: {}", col)
            } else {
                text
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let label = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            label
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_rows(rows: &[&[&str]]) -> Workbook {
        Workbook::from_rows(
            "Sheet1",
            rows.iter()
                .map(|r| r.iter().map(|v| CellValue::from(*v)).collect())
                .collect(),
        )
    }

    #[test]
    fn test_cell_lookup_by_address() {
        let wb = text_rows(&[&["", "", "", ""], &["", "", "", "PO12345"]]);
        assert_eq!(wb.cell("D2"), Some(&CellValue::Text("PO12345".into())));
        assert_eq!(wb.cell("$D$2"), Some(&CellValue::Text("PO12345".into())));
        assert_eq!(wb.cell("D9"), None);
        assert_eq!(wb.cell("not-an-address"), None);
    }

    #[test]
    fn test_short_row_inside_sheet_reads_empty() {
        let wb = text_rows(&[&["a", "b", "c"], &["x"]]);
        assert_eq!(wb.cell("C2"), Some(&CellValue::Empty));
        assert_eq!(wb.cell("D2"), None);
    }

    #[test]
    fn test_table_from_header_row() {
        let wb = text_rows(&[
            &["Booking form", "", ""],
            &["Collection Ref", "Delivery Adress", ""],
            &["C1", "1 Main St", ""],
            &["", "", ""],
            &["C2", "2 High St", "x"],
        ]);
        let table = SheetTable::from_workbook(&wb, 2, &HeaderNormalizer::default()).unwrap();

        assert_eq!(
            table.column_names(),
            vec!["COLLECTIONREF", "DELIVERYADDRESS", "UNNAMED2"]
        );
        assert_eq!(table.columns()[1].label, "Delivery Adress");
        assert_eq!(table.rows().len(), 2);
        assert_eq!(table.rows()[0].number, 3);
        assert_eq!(table.rows()[1].number, 5);
        assert_eq!(table.blank_rows(), 1);
    }

    #[test]
    fn test_duplicate_headers_are_suffixed() {
        let wb = text_rows(&[&["Pallets", "Pallets", "Pallets"], &["1", "2", "3"]]);
        let table = SheetTable::from_workbook(&wb, 1, &HeaderNormalizer::default()).unwrap();
        assert_eq!(table.column_names(), vec!["PALLETS", "PALLETS1", "PALLETS2"]);
        assert_eq!(table.position("PALLETS1"), Some(1));
    }

    #[test]
    fn test_header_row_out_of_range() {
        let wb = text_rows(&[&["a"]]);
        let err = SheetTable::from_workbook(&wb, 4, &HeaderNormalizer::default()).unwrap_err();
        assert!(matches!(err, SheetError::HeaderRowOutOfRange { row: 4, rows: 1 }));
    }

    #[test]
    fn test_csv_sheet() {
        let wb = Workbook::from_csv_bytes("orders", b"Ref;Qty\nA1;12.0\n").unwrap();
        assert_eq!(wb.sheet_name(), "orders");
        assert_eq!(clean_text(wb.get(1, 1)), "12");
    }

    /// Booking workbook whose used range starts at `B2`: reference in `D2`,
    /// headers on row 4, one data row with a date-formatted serial.
    fn booking_xlsx() -> Vec<u8> {
        use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

        let date = Format::new().set_num_format("yyyy-mm-dd");
        let mut workbook = XlsxWorkbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Bookings").unwrap();
        sheet.write_string(1, 1, "Kettyle booking").unwrap();
        sheet.write_string(1, 3, "PO12345").unwrap();
        for (col, header) in ["Collection Reference", "Collection Date", "Goods Description", "PALLET_EURO"]
            .iter()
            .enumerate()
        {
            sheet.write_string(3, col as u16 + 1, *header).unwrap();
        }
        sheet.write_string(4, 1, "C1").unwrap();
        sheet.write_number_with_format(4, 2, 45352.0, &date).unwrap();
        sheet.write_string(4, 3, "Beef").unwrap();
        sheet.write_number(4, 4, 12.0).unwrap();
        workbook.save_to_buffer().unwrap()
    }

    fn assert_booking_grid(wb: &Workbook) {
        assert_eq!(wb.sheet_name(), "Bookings");
        assert_eq!(wb.cell("D2"), Some(&CellValue::Text("PO12345".into())));
        assert_eq!(wb.cell("A1"), Some(&CellValue::Empty));
        assert_eq!(wb.height(), 5);
        assert_eq!(wb.width(), 5);

        let table = SheetTable::from_workbook(wb, 4, &HeaderNormalizer::default()).unwrap();
        assert_eq!(
            table.column_names(),
            vec![
                "UNNAMED0",
                "COLLECTIONREFERENCE",
                "COLLECTIONDATE",
                "GOODSDESCRIPTION",
                "PALLETEURO"
            ]
        );
        let row = &table.rows()[0];
        assert_eq!(row.number, 5);
        assert_eq!(row.text(1), "C1");
        assert!(matches!(row.get(2), CellValue::DateTime(_)));
        assert_eq!(row.text(2), "2024-03-01");
        assert_eq!(row.text(4), "12");
    }

    #[test]
    fn test_xlsx_from_bytes_keeps_absolute_addresses() {
        let wb = Workbook::from_bytes(booking_xlsx(), SheetFormat::Workbook, None).unwrap();
        assert_booking_grid(&wb);
    }

    #[test]
    fn test_xlsx_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bookings.xlsx");
        std::fs::write(&path, booking_xlsx()).unwrap();

        let wb = Workbook::open(&path, Some("bookings")).unwrap();
        assert_booking_grid(&wb);

        let err = Workbook::open(&path, Some("Invoices")).unwrap_err();
        assert!(matches!(err, SheetError::MissingSheet(name) if name == "Invoices"));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SheetFormat::from_extension("XLSX").unwrap(), SheetFormat::Workbook);
        assert_eq!(SheetFormat::from_extension(".csv").unwrap(), SheetFormat::Csv);
        assert!(SheetFormat::from_extension("pdf").is_err());
    }

    #[test]
    fn test_convert_data_dates_and_errors() {
        let iso = convert_data(&Data::DateTimeIso("2024-03-01T08:30:00".into()));
        assert_eq!(clean_text(&iso), "2024-03-01");

        let err = convert_data(&Data::Error(calamine::CellErrorType::NA));
        assert_eq!(clean_text(&err), "");
    }
}
