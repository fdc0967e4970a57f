//! Mapping table loading.
//!
//! The mapping file is a delimited table with at least the columns
//! `section`, `tag` and `source`, plus optional `matchmode`, `column_index`
//! and `row`. Column names are matched case- and whitespace-insensitively.
//!
//! ```text
//! section;tag;source;matchmode
//! header;reference;CELL D2;
//! pickup;name;Collection Name;
//! pickup;city_id;Collection Town;4
//! cargo;goodsdescription;Goods Description;
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use crate::api::logs::log_warning;
use crate::document::is_xml_name;
use crate::error::{ConfigError, ConfigResult};
use crate::models::{FieldSpec, Section, SourceRef};
use crate::parser::parse_bytes_auto;

const REQUIRED_COLUMNS: [&str; 3] = ["section", "tag", "source"];

/// Loaded mapping: section → field specs in file order.
///
/// Each load is an immutable snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingTable {
    sections: BTreeMap<Section, Vec<FieldSpec>>,
    skipped: Vec<String>,
}

/// Positions of the recognized columns in the header record.
struct ColumnLayout {
    section: usize,
    tag: usize,
    source: usize,
    matchmode: Option<usize>,
    column_index: Option<usize>,
    row: Option<usize>,
}

impl ColumnLayout {
    fn from_header(header: &[String]) -> ConfigResult<Self> {
        let keys: Vec<String> = header.iter().map(|h| column_key(h)).collect();
        let find = |name: &str| keys.iter().position(|k| k == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| find(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingColumns(missing));
        }

        Ok(Self {
            section: find("section").unwrap_or_default(),
            tag: find("tag").unwrap_or_default(),
            source: find("source").unwrap_or_default(),
            matchmode: find("matchmode"),
            column_index: find("columnindex"),
            row: find("row"),
        })
    }
}

/// Lowercase with whitespace, `_` and `-` removed.
fn column_key(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

impl MappingTable {
    /// Load a mapping file from disk.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse mapping content with encoding and delimiter detection.
    pub fn from_bytes(bytes: &[u8]) -> ConfigResult<Self> {
        let table = parse_bytes_auto(bytes).map_err(|e| ConfigError::NotTabular(e.to_string()))?;
        let header = match table.header() {
            Some(header) if header.iter().any(|h| !h.trim().is_empty()) => header,
            _ => return Err(ConfigError::Empty),
        };
        let layout = ColumnLayout::from_header(header)?;

        let mut mapping = MappingTable::default();
        for record in table.body() {
            mapping.push_record(record, &layout);
        }
        Ok(mapping)
    }

    fn push_record(&mut self, record: &[String], layout: &ColumnLayout) {
        let field = |index: usize| record.get(index).map(|v| v.trim()).unwrap_or("");
        let optional = |index: Option<usize>| index.map(field).unwrap_or("");

        let section_text = field(layout.section);
        let tag = field(layout.tag);
        let source_text = field(layout.source);
        let column_index = optional(layout.column_index).parse::<usize>().ok();
        let row = optional(layout.row).parse::<usize>().ok();

        if section_text.is_empty() || tag.is_empty() {
            return;
        }
        if source_text.is_empty() && column_index.is_none() {
            return;
        }

        let Some(section) = Section::parse(section_text) else {
            let note = format!("unknown section '{}' for tag '{}'", section_text, tag);
            log_warning(format!("Mapping: {}, row ignored", note));
            self.skipped.push(note);
            return;
        };

        // unit tags are emitted as text, every other tag becomes an element name
        if section != Section::Unit && !is_xml_name(tag) {
            let note = format!("tag '{}' in section '{}' is not a valid XML name", tag, section);
            log_warning(format!("Mapping: {}, row ignored", note));
            self.skipped.push(note);
            return;
        }

        let source = if source_text.is_empty() {
            column_index
                .map(|index| SourceRef::from_index(index, row))
                .unwrap_or_else(|| SourceRef::Constant(String::new()))
        } else {
            SourceRef::parse(source_text, section)
        };

        let spec = FieldSpec::new(section, tag, source).with_matchmode(optional(layout.matchmode));
        self.sections.entry(section).or_default().push(spec);
    }

    /// Build directly from specs, preserving their order per section.
    pub fn from_specs(specs: impl IntoIterator<Item = FieldSpec>) -> Self {
        let mut mapping = MappingTable::default();
        for spec in specs {
            mapping.sections.entry(spec.section).or_default().push(spec);
        }
        mapping
    }

    /// Specs of one section in file order.
    pub fn section(&self, section: Section) -> &[FieldSpec] {
        self.sections.get(&section).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All specs, grouped by section in document order.
    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.sections.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows dropped because of an unknown section or an unusable tag.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}
