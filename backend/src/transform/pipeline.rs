//! High-level conversion API.
//!
//! Combines all steps: sheet loading, binding every mapping field once,
//! row filtering, per-row resolution, unit expansion and document assembly.
//!
//! # Example
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

use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::api::logs::{log_info, log_success, log_warning};
use crate::config::Settings;
use crate::document::OutputDocument;
use crate::error::{ConversionWarning, ConvertResult, SerializationError, SerializationResult};
use crate::mapping::MappingTable;
use crate::models::{FieldSpec, Section};
use crate::sheet::{SheetFormat, SheetRow, SheetTable, Workbook};
use crate::transform::builder::{DocumentBuilder, FieldValue, MatchmodeTable, ShipmentRecord};
use crate::transform::filter::RowFilter;
use crate::transform::normalize::{CorrectionTable, HeaderNormalizer};
use crate::transform::resolver::{Binding, MatchOptions, SourceResolver};
use crate::transform::units::{UnitAggregator, UnitColumn};

/// Default 1-based header row.
pub const DEFAULT_HEADER_ROW: usize = 4;

/// Options for a conversion.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// 1-based row holding the column headers.
    pub header_row: usize,

    /// Worksheet name; first sheet when `None`.
    pub sheet: Option<String>,

    /// Fuzzy header matching.
    pub matching: MatchOptions,

    /// Row filter key columns; built-in list when empty.
    pub key_columns: Vec<String>,

    pub matchmodes: MatchmodeTable,

    pub corrections: CorrectionTable,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            header_row: DEFAULT_HEADER_ROW,
            sheet: None,
            matching: MatchOptions::default(),
            key_columns: Vec::new(),
            matchmodes: MatchmodeTable::default(),
            corrections: CorrectionTable::builtin(),
        }
    }
}

impl From<&Settings> for ConvertOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            header_row: settings.header_row,
            sheet: settings.sheet_name.clone(),
            matching: MatchOptions {
                fuzzy: settings.fuzzy_match,
                threshold: settings.fuzzy_threshold,
            },
            key_columns: settings.key_columns.clone(),
            ..Self::default()
        }
    }
}

/// Counters reported alongside the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStats {
    pub sheet: String,
    pub header_row: usize,
    pub columns: usize,
    /// Non-blank data rows below the header.
    pub rows_read: usize,
    pub shipments: usize,
    /// Rows rejected by the row filter.
    pub rows_skipped: usize,
}

/// Result of one conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub document: OutputDocument,
    pub warnings: Vec<ConversionWarning>,
    pub stats: ConversionStats,
}

impl Conversion {
    pub fn to_xml(&self) -> SerializationResult<String> {
        self.document.to_xml_string()
    }

    pub fn to_bytes(&self) -> SerializationResult<Vec<u8>> {
        self.document.to_bytes()
    }
}

// =============================================================================
// Binding
// =============================================================================

struct BoundField {
    spec: FieldSpec,
    binding: Binding,
}

impl BoundField {
    fn value(&self, resolver: &SourceResolver<'_>, row: &SheetRow) -> FieldValue {
        FieldValue::new(self.spec.tag.as_str(), resolver.read(&self.binding, row))
            .with_matchmode(self.spec.matchmode.clone())
    }
}

/// Every mapping field bound to the current sheet.
struct BoundMapping {
    header: Vec<BoundField>,
    reference: Option<BoundField>,
    shipment: Vec<BoundField>,
    pickup: Vec<BoundField>,
    delivery: Vec<BoundField>,
    cargo: Vec<BoundField>,
    units: UnitAggregator,
}

impl BoundMapping {
    fn bind(
        mapping: &MappingTable,
        resolver: &SourceResolver<'_>,
        table: &SheetTable,
        warnings: &mut Vec<ConversionWarning>,
    ) -> Self {
        let mut bind_section = |section: Section| -> Vec<BoundField> {
            mapping
                .section(section)
                .iter()
                .map(|spec| {
                    let (binding, warning) = resolver.bind(spec);
                    warnings.extend(warning);
                    BoundField {
                        spec: spec.clone(),
                        binding,
                    }
                })
                .collect()
        };

        let header = bind_section(Section::Header);
        let mut shipment = bind_section(Section::Shipment);
        let pickup = bind_section(Section::Pickup);
        let delivery = bind_section(Section::Delivery);
        let cargo = bind_section(Section::Cargo);
        let unit_fields = bind_section(Section::Unit);

        let reference = shipment
            .iter()
            .position(|f| f.spec.is_reference())
            .map(|index| shipment.remove(index));

        let units = if unit_fields.is_empty() {
            let excluded: Vec<usize> = header
                .iter()
                .chain(reference.iter())
                .chain(&shipment)
                .chain(&pickup)
                .chain(&delivery)
                .chain(&cargo)
                .filter_map(|f| match f.binding {
                    Binding::Column(index) => Some(index),
                    _ => None,
                })
                .collect();
            UnitAggregator::heuristic(table, &excluded)
        } else {
            UnitAggregator::explicit(
                unit_fields
                    .into_iter()
                    .map(|f| UnitColumn::new(f.spec.tag, f.binding).with_matchmode(f.spec.matchmode))
                    .collect(),
            )
        };

        Self {
            header,
            reference,
            shipment,
            pickup,
            delivery,
            cargo,
            units,
        }
    }

    fn record(&self, resolver: &SourceResolver<'_>, row: &SheetRow) -> ShipmentRecord {
        let values = |fields: &[BoundField]| -> Vec<FieldValue> {
            fields.iter().map(|f| f.value(resolver, row)).collect()
        };
        ShipmentRecord {
            row: row.number,
            reference: self.reference.as_ref().map(|f| f.value(resolver, row)),
            fields: values(&self.shipment),
            pickup: values(&self.pickup),
            delivery: values(&self.delivery),
            cargo: values(&self.cargo),
            units: self.units.collect_units(resolver, row),
        }
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// Convert a loaded worksheet with a loaded mapping.
///
/// Column-bound header fields are read from the first accepted row.
pub fn convert(
    workbook: &Workbook,
    mapping: &MappingTable,
    options: &ConvertOptions,
) -> ConvertResult<Conversion> {
    let normalizer = HeaderNormalizer::new(options.corrections.clone());
    let table = SheetTable::from_workbook(workbook, options.header_row, &normalizer)?;
    log_info(format!(
        "Sheet '{}': {} columns, {} data rows below header row {}",
        workbook.sheet_name(),
        table.columns().len(),
        table.rows().len(),
        options.header_row
    ));

    let resolver = SourceResolver::new(workbook, &table, options.matching);
    let mut warnings = Vec::new();
    let bound = BoundMapping::bind(mapping, &resolver, &table, &mut warnings);

    let (filter, filter_warning) = RowFilter::new(&table, &options.key_columns);
    warnings.extend(filter_warning);

    let accepted: Vec<&SheetRow> = table
        .rows()
        .iter()
        .filter(|row| filter.is_valid_row(row))
        .collect();
    if accepted.is_empty() {
        warnings.push(ConversionWarning::EmptyResult {
            rows_read: table.rows().len(),
        });
    }

    let empty_row = SheetRow {
        number: 0,
        cells: Vec::new(),
    };
    let first_row = accepted.first().copied().unwrap_or(&empty_row);
    let header: Vec<FieldValue> = bound
        .header
        .iter()
        .map(|f| f.value(&resolver, first_row))
        .collect();
    let shipments: Vec<ShipmentRecord> = accepted
        .iter()
        .map(|row| bound.record(&resolver, row))
        .collect();

    let document = DocumentBuilder::new(options.matchmodes.clone()).build(&header, &shipments);

    for warning in &warnings {
        log_warning(warning.to_string());
    }

    let stats = ConversionStats {
        sheet: workbook.sheet_name().to_string(),
        header_row: options.header_row,
        columns: table.columns().len(),
        rows_read: table.rows().len(),
        shipments: shipments.len(),
        rows_skipped: table.rows().len() - shipments.len(),
    };
    log_success(format!(
        "Built {} shipment(s) from {} row(s)",
        stats.shipments, stats.rows_read
    ));

    Ok(Conversion {
        document,
        warnings,
        stats,
    })
}

/// Convert in-memory spreadsheet bytes.
pub fn convert_bytes(
    bytes: Vec<u8>,
    format: SheetFormat,
    mapping: &MappingTable,
    options: &ConvertOptions,
) -> ConvertResult<Conversion> {
    let workbook = Workbook::from_bytes(bytes, format, options.sheet.as_deref())?;
    convert(&workbook, mapping, options)
}

/// Convert a spreadsheet file and write the XML to `output`.
///
/// The output is written only once the whole document is built, through a
/// temporary file in the target directory that is then renamed into place.
pub fn convert_file(
    input: &Path,
    mapping: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> ConvertResult<Conversion> {
    log_info(format!("Converting {}", input.display()));
    let mapping = MappingTable::load(mapping)?;
    let workbook = Workbook::open(input, options.sheet.as_deref())?;
    let conversion = convert(&workbook, &mapping, options)?;

    write_atomic(output, &conversion.to_bytes()?)?;
    log_success(format!("XML written: {}", output.display()));
    Ok(conversion)
}

/// Write bytes to `path` via a sibling temporary file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> SerializationResult<()> {
    let persist_error = |message: String| SerializationError::Persist {
        path: path.display().to_string(),
        message,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| persist_error(e.to_string()))?;
    file.write_all(bytes).map_err(|e| persist_error(e.to_string()))?;
    file.flush().map_err(|e| persist_error(e.to_string()))?;
    file.persist(path).map_err(|e| persist_error(e.error.to_string()))?;
    Ok(())
}
