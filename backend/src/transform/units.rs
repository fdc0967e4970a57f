//! Unit line expansion.
//!
//! Quantity-bearing columns become cargo unit lines. With explicit `unit`
//! specs the configured tag is the label; otherwise any column whose
//! normalized name contains `PALLET` or `UNIT` is picked up and labelled
//! with its original header text.

use serde::Serialize;

use crate::document::XmlElement;
use crate::sheet::{SheetRow, SheetTable};
use crate::transform::builder::{MatchmodeTable, MATCHMODE};
use crate::transform::resolver::{Binding, SourceResolver};

const UNIT_MARKERS: [&str; 2] = ["PALLET", "UNIT"];

/// A cargo sub-record pairing a unit label with a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitLine {
    pub label: String,
    pub amount: String,
    /// Declared on the `unit` spec; applies to `unit_id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matchmode: Option<String>,
}

impl UnitLine {
    pub fn new(label: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            amount: amount.into(),
            matchmode: None,
        }
    }

    pub fn with_matchmode(mut self, matchmode: Option<String>) -> Self {
        self.matchmode = matchmode;
        self
    }

    fn elements(&self, matchmodes: &MatchmodeTable) -> [XmlElement; 2] {
        [
            unit_leaf(matchmodes, "unit_id", &self.label, self.matchmode.as_deref()),
            unit_leaf(matchmodes, "unitamount", &self.amount, None),
        ]
    }
}

fn unit_leaf(matchmodes: &MatchmodeTable, tag: &str, text: &str, declared: Option<&str>) -> XmlElement {
    let element = XmlElement::leaf(tag, text);
    match matchmodes.lookup(tag, declared) {
        Some(mode) => element.with_attribute(MATCHMODE, mode),
        None => element,
    }
}

/// One unit-bearing column, bound to the sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitColumn {
    pub label: String,
    pub binding: Binding,
    pub matchmode: Option<String>,
}

impl UnitColumn {
    pub fn new(label: impl Into<String>, binding: Binding) -> Self {
        Self {
            label: label.into(),
            binding,
            matchmode: None,
        }
    }

    pub fn with_matchmode(mut self, matchmode: Option<String>) -> Self {
        self.matchmode = matchmode;
        self
    }
}

/// Unit-bearing columns of one file, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct UnitAggregator {
    columns: Vec<UnitColumn>,
}

impl UnitAggregator {
    /// Unit columns from explicit `unit` specs, already bound.
    pub fn explicit(columns: Vec<UnitColumn>) -> Self {
        Self {
            columns: columns
                .into_iter()
                .filter(|column| column.binding.is_resolved())
                .collect(),
        }
    }

    /// Unit columns found by header name, skipping positions in `excluded`.
    pub fn heuristic(table: &SheetTable, excluded: &[usize]) -> Self {
        let columns = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(index, _)| !excluded.contains(index))
            .filter(|(_, column)| UNIT_MARKERS.iter().any(|m| column.name.contains(m)))
            .map(|(index, column)| UnitColumn::new(column.label.clone(), Binding::Column(index)))
            .collect();
        Self { columns }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.label.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Populated unit lines of one row.
    pub fn collect_units(&self, resolver: &SourceResolver<'_>, row: &SheetRow) -> Vec<UnitLine> {
        self.columns
            .iter()
            .filter_map(|column| {
                let amount = resolver.read(&column.binding, row);
                if amount.is_empty() {
                    None
                } else {
                    Some(
                        UnitLine::new(column.label.as_str(), amount)
                            .with_matchmode(column.matchmode.clone()),
                    )
                }
            })
            .collect()
    }
}

/// Append unit lines to a cargo element.
///
/// One line sits directly under cargo; several are wrapped in
/// `goodslines/goodsline`.
pub fn append_units(cargo: &mut XmlElement, lines: &[UnitLine], matchmodes: &MatchmodeTable) {
    match lines {
        [] => {}
        [line] => {
            for element in line.elements(matchmodes) {
                cargo.push(element);
            }
        }
        _ => {
            let mut goodslines = XmlElement::new("goodslines");
            for line in lines {
                let mut goodsline = XmlElement::new("goodsline");
                for element in line.elements(matchmodes) {
                    goodsline.push(element);
                }
                goodslines.push(goodsline);
            }
            cargo.push(goodslines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{CellValue, Workbook};
    use crate::transform::normalize::HeaderNormalizer;
    use crate::transform::resolver::MatchOptions;

    fn fixture() -> (Workbook, SheetTable) {
        let rows: Vec<Vec<CellValue>> = [
            vec!["Goods Description", "PALLET_EURO", "PALLET_BLOCK", "Units"],
            vec!["Beef", "5", "2", ""],
            vec!["Lamb", "", "3.0", ""],
            vec!["Pork", "", "", "nan"],
        ]
        .iter()
        .map(|r| r.iter().map(|v| CellValue::from(*v)).collect())
        .collect();
        let wb = Workbook::from_rows("Sheet1", rows);
        let table = SheetTable::from_workbook(&wb, 1, &HeaderNormalizer::default()).unwrap();
        (wb, table)
    }

    #[test]
    fn test_heuristic_columns_use_original_labels() {
        let (_, table) = fixture();
        let units = UnitAggregator::heuristic(&table, &[]);
        assert_eq!(
            units.labels().collect::<Vec<_>>(),
            vec!["PALLET_EURO", "PALLET_BLOCK", "Units"]
        );
    }

    #[test]
    fn test_heuristic_skips_excluded_columns() {
        let (_, table) = fixture();
        let units = UnitAggregator::heuristic(&table, &[3]);
        assert_eq!(units.labels().count(), 2);
    }

    #[test]
    fn test_collect_only_populated_columns() {
        let (wb, table) = fixture();
        let resolver = SourceResolver::new(&wb, &table, MatchOptions::default());
        let units = UnitAggregator::heuristic(&table, &[]);

        let first = units.collect_units(&resolver, &table.rows()[0]);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].label, "PALLET_EURO");
        assert_eq!(first[1].amount, "2");

        let second = units.collect_units(&resolver, &table.rows()[1]);
        assert_eq!(second, vec![UnitLine::new("PALLET_BLOCK", "3")]);

        assert!(units.collect_units(&resolver, &table.rows()[2]).is_empty());
    }

    #[test]
    fn test_explicit_columns_drop_unresolved() {
        let units = UnitAggregator::explicit(vec![
            UnitColumn::new("EuroPallet", Binding::Column(1)),
            UnitColumn::new("Missing", Binding::Unresolved),
        ]);
        assert_eq!(units.labels().collect::<Vec<_>>(), vec!["EuroPallet"]);
    }

    #[test]
    fn test_two_lines_are_wrapped_in_goodslines() {
        let mut cargo = XmlElement::new("cargo");
        append_units(
            &mut cargo,
            &[UnitLine::new("PALLET_EURO", "5"), UnitLine::new("PALLET_BLOCK", "2")],
            &MatchmodeTable::default(),
        );
        let goodslines = cargo.child("goodslines").unwrap();
        let lines: Vec<_> = goodslines.children_named("goodsline").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text_at("unit_id"), Some("PALLET_EURO"));
        assert_eq!(lines[1].text_at("unitamount"), Some("2"));
        assert!(cargo.child("unit_id").is_none());
    }

    #[test]
    fn test_single_line_sits_under_cargo() {
        let mut cargo = XmlElement::new("cargo");
        append_units(
            &mut cargo,
            &[UnitLine::new("PALLET_EURO", "5")],
            &MatchmodeTable::default(),
        );
        assert_eq!(cargo.text_at("unit_id"), Some("PALLET_EURO"));
        assert_eq!(cargo.text_at("unitamount"), Some("5"));
        assert!(cargo.child("unit_id").unwrap().attributes.is_empty());
        assert!(cargo.child("goodslines").is_none());
    }

    #[test]
    fn test_unit_matchmode_declared_or_default() {
        let mut cargo = XmlElement::new("cargo");
        let matchmodes = MatchmodeTable::empty().with_default("unitamount", "2");
        append_units(
            &mut cargo,
            &[
                UnitLine::new("EuroPallet", "5").with_matchmode(Some("3".into())),
                UnitLine::new("BlockPallet", "2"),
            ],
            &matchmodes,
        );
        let lines: Vec<_> = cargo.find("goodslines").unwrap().children_named("goodsline").collect();
        assert_eq!(lines[0].child("unit_id").unwrap().attribute("matchmode"), Some("3"));
        assert_eq!(lines[0].child("unitamount").unwrap().attribute("matchmode"), Some("2"));
        assert_eq!(lines[1].child("unit_id").unwrap().attribute("matchmode"), None);
    }

    #[test]
    fn test_explicit_column_matchmode_reaches_line() {
        let (wb, table) = fixture();
        let resolver = SourceResolver::new(&wb, &table, MatchOptions::default());
        let units = UnitAggregator::explicit(vec![
            UnitColumn::new("EuroPallet", Binding::Column(1)).with_matchmode(Some("3".into()))
        ]);
        let lines = units.collect_units(&resolver, &table.rows()[0]);
        assert_eq!(lines, vec![UnitLine::new("EuroPallet", "5").with_matchmode(Some("3".into()))]);
    }

    #[test]
    fn test_no_lines_no_elements() {
        let mut cargo = XmlElement::new("cargo");
        append_units(&mut cargo, &[], &MatchmodeTable::default());
        assert!(cargo.children.is_empty());
    }
}
