//! Transformation module.
//!
//! - Normalize: header canonicalization
//! - Resolver: binding mapping sources to the sheet
//! - Filter: shipment row selection
//! - Units: unit line expansion
//! - Builder: output tree assembly
//! - Pipeline: end-to-end conversion

pub mod builder;
pub mod filter;
pub mod normalize;
pub mod pipeline;
pub mod resolver;
pub mod units;

pub use builder::{DocumentBuilder, FieldValue, MatchmodeTable, ShipmentRecord};
pub use filter::{RowFilter, DEFAULT_KEY_COLUMNS};
pub use normalize::{normalize, CorrectionTable, HeaderNormalizer};
pub use pipeline::*;
pub use resolver::{Binding, MatchOptions, SourceResolver, DEFAULT_FUZZY_THRESHOLD};
pub use units::{UnitAggregator, UnitColumn, UnitLine};
