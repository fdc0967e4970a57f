//! Error types for the Shipload conversion pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`ConfigError`] - Mapping table could not be loaded
//! - [`SheetError`] - Spreadsheet could not be opened or read
//! - [`SerializationError`] - XML output could not be produced or written
//! - [`SettingsError`] - Environment configuration is invalid
//! - [`ConvertError`] - Top-level conversion errors
//! - [`ServerError`] - HTTP surface errors
//!
//! Only file-level failures are errors. Problems with a single field or row
//! are reported as [`ConversionWarning`] values and never abort a conversion.

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Mapping Table Errors
// =============================================================================

/// Errors while loading the mapping table. Fatal for the whole batch.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the mapping file.
    #[error("Failed to read mapping file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file could not be parsed as a table.
    #[error("Mapping file is not tabular: {0}")]
    NotTabular(String),

    /// Required columns are absent from the header.
    #[error("Mapping file is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// The file has no content at all.
    #[error("Mapping file is empty")]
    Empty,
}

// =============================================================================
// Spreadsheet Errors
// =============================================================================

/// Errors while opening or reading the input spreadsheet.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Failed to read the file.
    #[error("Failed to read spreadsheet '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Unknown file extension.
    #[error("Unsupported spreadsheet format: {0} (expected .xlsx/.xlsm/.xlsb/.xls/.ods/.csv)")]
    UnsupportedFormat(String),

    /// The workbook could not be decoded.
    #[error("Failed to open workbook: {0}")]
    Workbook(String),

    /// The workbook has no worksheet (or not the requested one).
    #[error("Worksheet not found: {0}")]
    MissingSheet(String),

    /// The configured header row lies outside the sheet.
    #[error("Header row {row} is outside the sheet ({rows} rows)")]
    HeaderRowOutOfRange { row: usize, rows: usize },

    /// CSV sheet could not be parsed.
    #[error("Failed to parse CSV sheet: {0}")]
    Csv(String),
}

impl From<calamine::Error> for SheetError {
    fn from(err: calamine::Error) -> Self {
        SheetError::Workbook(err.to_string())
    }
}

// =============================================================================
// Serialization Errors
// =============================================================================

/// Errors while writing the output document. Fatal for the current file only.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// XML writer failure.
    #[error("XML write error: {0}")]
    Xml(#[from] std::io::Error),

    /// An element or attribute name is not a valid XML name.
    #[error("Invalid XML name: '{0}'")]
    InvalidName(String),

    /// Writer produced invalid UTF-8.
    #[error("XML output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// The output file could not be created or moved into place.
    #[error("Failed to write '{path}': {message}")]
    Persist { path: String, message: String },
}

// =============================================================================
// Settings Errors
// =============================================================================

/// Errors while reading environment configuration.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A variable holds a value that cannot be used.
    #[error("Invalid value for {key}: '{value}' ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    /// A variable that is needed for the requested operation is unset.
    #[error("Missing setting: {0}")]
    Missing(String),
}

// =============================================================================
// Conversion Errors (top-level)
// =============================================================================

/// Top-level conversion errors.
///
/// This is the error type returned by [`crate::transform::pipeline::convert`]
/// and [`crate::transform::pipeline::convert_file`].
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Mapping table error.
    #[error("Mapping error: {0}")]
    Config(#[from] ConfigError),

    /// Spreadsheet error.
    #[error("Spreadsheet error: {0}")]
    Sheet(#[from] SheetError),

    /// Output error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Settings error.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Conversion error.
    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Conversion Warnings
// =============================================================================

/// A recoverable problem found during a conversion.
///
/// Warnings never abort the conversion; the affected field is omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConversionWarning {
    /// A configured column or cell could not be located.
    #[serde(rename_all = "camelCase")]
    HeaderResolution {
        section: String,
        tag: String,
        source: String,
        reason: String,
    },

    /// None of the key columns exist; every non-blank row is accepted.
    #[serde(rename_all = "camelCase")]
    NoKeyColumns { candidates: Vec<String> },

    /// The row filter accepted zero rows.
    #[serde(rename_all = "camelCase")]
    EmptyResult { rows_read: usize },
}

impl std::fmt::Display for ConversionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversionWarning::HeaderResolution {
                section,
                tag,
                source,
                reason,
            } => write!(f, "[{}] '{}' from '{}': {}", section, tag, source, reason),
            ConversionWarning::NoKeyColumns { candidates } => write!(
                f,
                "none of the key columns ({}) exist, accepting any non-blank row",
                candidates.join(", ")
            ),
            ConversionWarning::EmptyResult { rows_read } => {
                write!(f, "no shipment rows accepted out of {} data rows", rows_read)
            }
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for mapping operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for spreadsheet operations.
pub type SheetResult<T> = Result<T, SheetError>;

/// Result type for serialization.
pub type SerializationResult<T> = Result<T, SerializationError>;

/// Result type for conversions.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let cfg_err = ConfigError::Empty;
        let convert_err: ConvertError = cfg_err.into();
        assert!(convert_err.to_string().contains("empty"));

        let sheet_err = SheetError::HeaderRowOutOfRange { row: 9, rows: 3 };
        let convert_err: ConvertError = sheet_err.into();
        assert!(convert_err.to_string().contains("Header row 9"));
    }

    #[test]
    fn test_missing_columns_format() {
        let err = ConfigError::MissingColumns(vec!["tag".into(), "source".into()]);
        assert_eq!(
            err.to_string(),
            "Mapping file is missing required column(s): tag, source"
        );
    }

    #[test]
    fn test_warning_display() {
        let warning = ConversionWarning::HeaderResolution {
            section: "pickup".into(),
            tag: "city".into(),
            source: "COLLECTION TOWN".into(),
            reason: "no matching column".into(),
        };
        let msg = warning.to_string();
        assert!(msg.contains("[pickup]"));
        assert!(msg.contains("COLLECTION TOWN"));
    }

    #[test]
    fn test_warning_serializes_with_kind() {
        let warning = ConversionWarning::EmptyResult { rows_read: 4 };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "emptyResult");
        assert_eq!(json["rowsRead"], 4);
    }
}
