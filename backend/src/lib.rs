//! # Shipload - shipment spreadsheets to transport booking XML
//!
//! Shipload converts loosely structured shipment spreadsheets (title rows
//! above the header, blank and subtotal rows, inconsistent column names)
//! into a transport booking XML document. What goes where is described by
//! an editable mapping table, not by code.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Spreadsheet │────▶│    Sheet    │────▶│  Transform  │────▶│ Booking XML │
//! │ (xlsx/csv)  │     │ (grid+view) │     │ (mapping)   │     │ (quick-xml) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shipload::{convert_file, ConvertOptions};
//! use std::path::Path;
//!
//! let conversion = convert_file(
//!     Path::new("bookings.xlsx"),
//!     Path::new("columns.csv"),
//!     Path::new("bookings.xml"),
//!     &ConvertOptions::default(),
//! )?;
//! println!("{} shipments", conversion.stats.shipments);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types and conversion warnings
//! - [`models`] - Sections, source references, field specs
//! - [`parser`] - Delimited text with encoding/delimiter detection
//! - [`mapping`] - Mapping table loading
//! - [`sheet`] - Workbook loading and the headered sheet view
//! - [`transform`] - Normalization, resolution, filtering, assembly
//! - [`document`] - Output tree and XML serialization
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server and log sink

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Input
pub mod mapping;
pub mod parser;
pub mod sheet;

// Transformation
pub mod transform;

// Output
pub mod document;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConversionWarning, ConvertError, SerializationError, ServerError, SettingsError,
    SheetError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{FieldSpec, Section, SourceRef};

// =============================================================================
// Re-exports - Input
// =============================================================================

pub use mapping::MappingTable;
pub use parser::{detect_delimiter, detect_encoding, parse_bytes_auto, parse_file_auto, CsvError};
pub use sheet::{clean_text, CellValue, SheetFormat, SheetTable, Workbook};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    convert, convert_bytes, convert_file, normalize, write_atomic, Conversion, ConversionStats,
    ConvertOptions, HeaderNormalizer, MatchOptions,
};

// =============================================================================
// Re-exports - Output and settings
// =============================================================================

pub use config::Settings;
pub use document::{OutputDocument, XmlElement};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
