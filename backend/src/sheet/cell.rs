//! Cell values and the text cleaning rule.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::document::strip_invalid_chars;

/// Values that mean "nothing here" once trimmed.
pub const EMPTY_SENTINELS: [&str; 5] = ["", "nan", "NaT", "None", "#N/A"];

/// A single spreadsheet value, independent of the workbook backend.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    /// Excel error such as `#N/A` or `#DIV/0!`
    Error(String),
}

impl CellValue {
    /// Whether the value cleans to an empty string.
    pub fn is_blank(&self) -> bool {
        clean_text(self).is_empty()
    }

    /// Build a value from an Excel date serial (days since 1899-12-30).
    pub fn from_excel_serial(serial: f64) -> Option<Self> {
        excel_serial_to_datetime(serial).map(CellValue::DateTime)
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        if text.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text.to_string())
        }
    }
}

/// Convert an Excel serial date to a naive datetime.
///
/// Uses the 1900 date system with the customary 1899-12-30 epoch, which
/// absorbs Excel's phantom 1900-02-29 for every date after February 1900.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // 2958465 is 9999-12-31, the last date Excel can represent
    if !serial.is_finite() || !(0.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let days = serial.trunc() as i64;
    let millis = ((serial - serial.trunc()) * 86_400_000.0).round() as i64;
    epoch
        .checked_add_signed(Duration::days(days))?
        .checked_add_signed(Duration::milliseconds(millis))
}

/// Render a raw cell value as output text.
///
/// - null-like values and the [`EMPTY_SENTINELS`] become `""`
/// - dates render as `YYYY-MM-DD`
/// - integral numbers lose their `.0`
/// - control characters XML cannot carry are removed
/// - everything else is trimmed
pub fn clean_text(value: &CellValue) -> String {
    match value {
        CellValue::Empty => String::new(),
        CellValue::Text(text) => clean_str(text),
        CellValue::Int(n) => n.to_string(),
        CellValue::Float(f) => format_float(*f),
        CellValue::Bool(true) => "True".to_string(),
        CellValue::Bool(false) => "False".to_string(),
        CellValue::DateTime(dt) => dt.format("%Y-%m-%d").to_string(),
        CellValue::Error(text) => clean_str(text),
    }
}

/// Cleaning rule for free text, including textual `"12.0"`.
pub fn clean_str(text: &str) -> String {
    let text = strip_invalid_chars(text);
    let trimmed = text.trim();
    if EMPTY_SENTINELS.contains(&trimmed) {
        return String::new();
    }
    if let Some(stem) = trimmed.strip_suffix(".0") {
        if !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()) {
            return stem.to_string();
        }
    }
    trimmed.to_string()
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        return String::new();
    }
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_clean_to_empty() {
        for sentinel in ["", "  ", "nan", "NaT", "None", " #N/A "] {
            assert_eq!(clean_str(sentinel), "", "sentinel {:?}", sentinel);
        }
        assert_eq!(clean_text(&CellValue::Error("#N/A".into())), "");
        assert_eq!(clean_text(&CellValue::Float(f64::NAN)), "");
    }

    #[test]
    fn test_integral_float_has_no_fraction() {
        assert_eq!(clean_text(&CellValue::Float(12.0)), "12");
        assert_eq!(clean_text(&CellValue::Float(-3.0)), "-3");
        assert_eq!(clean_text(&CellValue::Float(12.5)), "12.5");
        assert_eq!(clean_text(&CellValue::Int(7)), "7");
    }

    #[test]
    fn test_textual_integral_float() {
        assert_eq!(clean_str("12.0"), "12");
        assert_eq!(clean_str(" 40.0 "), "40");
        assert_eq!(clean_str("v1.0"), "v1.0");
        assert_eq!(clean_str("12.05"), "12.05");
    }

    #[test]
    fn test_excel_serial_date() {
        let value = CellValue::from_excel_serial(45352.0).unwrap();
        assert_eq!(clean_text(&value), "2024-03-01");
    }

    #[test]
    fn test_excel_serial_with_time_keeps_date() {
        let value = CellValue::from_excel_serial(45352.75).unwrap();
        assert_eq!(clean_text(&value), "2024-03-01");
    }

    #[test]
    fn test_text_is_trimmed() {
        assert_eq!(clean_text(&CellValue::Text("  Belfast \n".into())), "Belfast");
    }

    #[test]
    fn test_control_characters_are_removed() {
        assert_eq!(clean_str("Beef\u{0b}x"), "Beefx");
        assert_eq!(clean_text(&CellValue::Text("\u{01}Lamb\u{1f} ".into())), "Lamb");
        assert_eq!(clean_str("Line 1\tLine 2"), "Line 1\tLine 2");
        assert_eq!(clean_str("\u{0c}"), "");
    }

    #[test]
    fn test_bool_rendering() {
        assert_eq!(clean_text(&CellValue::Bool(true)), "True");
    }
}
