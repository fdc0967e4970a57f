//! Document assembly.
//!
//! Turns resolved values into the output tree:
//!
//! ```text
//! transportbookings
//! └── transportbooking
//!     ├── {header fields}, edireference
//!     └── shipments
//!         └── shipment*
//!             ├── reference, edireference, {shipment fields}
//!             ├── pickupaddress
//!             ├── deliveryaddress
//!             └── cargo ── {cargo fields}, unit lines
//! ```

use serde::Serialize;

use crate::document::{OutputDocument, XmlElement};
use crate::transform::units::{append_units, UnitLine};

pub(crate) const MATCHMODE: &str = "matchmode";

/// Built-in `matchmode` values by tag.
const DEFAULT_MATCHMODES: &[(&str, &str)] = &[("customer_id", "1"), ("city_id", "4")];

/// Resolves the `matchmode` attribute of an element.
///
/// A value declared in the mapping wins over the built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchmodeTable {
    defaults: Vec<(String, String)>,
}

impl Default for MatchmodeTable {
    fn default() -> Self {
        Self {
            defaults: DEFAULT_MATCHMODES
                .iter()
                .map(|(tag, mode)| (tag.to_string(), mode.to_string()))
                .collect(),
        }
    }
}

impl MatchmodeTable {
    /// A table without defaults; only mapping values apply.
    pub fn empty() -> Self {
        Self {
            defaults: Vec::new(),
        }
    }

    pub fn with_default(mut self, tag: &str, mode: &str) -> Self {
        self.defaults.push((tag.to_string(), mode.to_string()));
        self
    }

    pub fn lookup<'a>(&'a self, tag: &str, declared: Option<&'a str>) -> Option<&'a str> {
        declared.filter(|m| !m.is_empty()).or_else(|| {
            self.defaults
                .iter()
                .find(|(t, _)| t.eq_ignore_ascii_case(tag))
                .map(|(_, mode)| mode.as_str())
        })
    }
}

/// A field value ready for emission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    pub tag: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matchmode: Option<String>,
}

impl FieldValue {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
            matchmode: None,
        }
    }

    pub fn with_matchmode(mut self, matchmode: Option<String>) -> Self {
        self.matchmode = matchmode;
        self
    }
}

/// Resolved values of one accepted row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShipmentRecord {
    /// 1-based spreadsheet row the record came from.
    pub row: usize,
    /// `Some` whenever a shipment reference is configured, even if empty.
    pub reference: Option<FieldValue>,
    pub fields: Vec<FieldValue>,
    pub pickup: Vec<FieldValue>,
    pub delivery: Vec<FieldValue>,
    pub cargo: Vec<FieldValue>,
    pub units: Vec<UnitLine>,
}

/// Assembles the output tree from resolved values.
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    matchmodes: MatchmodeTable,
}

impl DocumentBuilder {
    pub fn new(matchmodes: MatchmodeTable) -> Self {
        Self { matchmodes }
    }

    pub fn build(&self, header: &[FieldValue], shipments: &[ShipmentRecord]) -> OutputDocument {
        let mut booking = XmlElement::new("transportbooking");
        for field in header {
            if let Some(element) = self.leaf(field) {
                booking.push(element);
                if field.tag.eq_ignore_ascii_case("reference") {
                    booking.push(XmlElement::leaf("edireference", field.value.as_str()));
                }
            }
        }

        let mut container = XmlElement::new("shipments");
        for record in shipments {
            container.push(self.shipment(record));
        }
        booking.push(container);

        let mut root = XmlElement::new("transportbookings");
        root.push(booking);
        OutputDocument::new(root)
    }

    fn shipment(&self, record: &ShipmentRecord) -> XmlElement {
        let mut shipment = XmlElement::new("shipment");
        if let Some(reference) = &record.reference {
            if let Some(element) = self.leaf(reference) {
                shipment.push(element);
            }
            shipment.push(XmlElement::leaf("edireference", reference.value.as_str()));
        }
        self.extend(&mut shipment, &record.fields);

        let mut pickup = XmlElement::new("pickupaddress");
        self.extend(&mut pickup, &record.pickup);
        shipment.push(pickup);

        let mut delivery = XmlElement::new("deliveryaddress");
        self.extend(&mut delivery, &record.delivery);
        shipment.push(delivery);

        let mut cargo = XmlElement::new("cargo");
        self.extend(&mut cargo, &record.cargo);
        append_units(&mut cargo, &record.units, &self.matchmodes);
        shipment.push(cargo);

        shipment
    }

    fn extend(&self, parent: &mut XmlElement, fields: &[FieldValue]) {
        for element in fields.iter().filter_map(|f| self.leaf(f)) {
            parent.push(element);
        }
    }

    /// Leaf for a field, `None` when its value is empty.
    fn leaf(&self, field: &FieldValue) -> Option<XmlElement> {
        if field.value.is_empty() {
            return None;
        }
        let element = XmlElement::leaf(field.tag.as_str(), field.value.as_str());
        Some(
            match self.matchmodes.lookup(&field.tag, field.matchmode.as_deref()) {
                Some(mode) => element.with_attribute(MATCHMODE, mode),
                None => element,
            },
        )
    }
}
