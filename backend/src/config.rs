//! Environment configuration.
//!
//! Values come from the process environment, after loading `.env` if one
//! exists. Command-line flags override them.
//!
//! | Variable          | Default | Meaning                                 |
//! |-------------------|---------|-----------------------------------------|
//! | `MAPPING_FILE`    | none    | Mapping table (alias `COLUMNS_FILE`)    |
//! | `HEADER_ROW`      | `4`     | 1-based header row                      |
//! | `SHEET_NAME`      | first   | Worksheet to read                       |
//! | `FUZZY_MATCH`     | `true`  | Fuzzy header matching                   |
//! | `FUZZY_THRESHOLD` | `0.7`   | Minimum similarity, `0..=1`             |
//! | `KEY_COLUMNS`     | built-in| Comma-separated row filter keys         |
//! | `SERVER_PORT`     | `3000`  | HTTP port                               |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::SettingsError;
use crate::transform::pipeline::DEFAULT_HEADER_ROW;
use crate::transform::resolver::DEFAULT_FUZZY_THRESHOLD;

pub const DEFAULT_SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mapping_file: Option<PathBuf>,
    pub header_row: usize,
    pub sheet_name: Option<String>,
    pub fuzzy_match: bool,
    pub fuzzy_threshold: f64,
    pub key_columns: Vec<String>,
    pub server_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mapping_file: None,
            header_row: DEFAULT_HEADER_ROW,
            sheet_name: None,
            fuzzy_match: true,
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            key_columns: Vec::new(),
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl Settings {
    /// Load `.env` (if present) and read the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        let header_row = match get("HEADER_ROW") {
            Some(value) => {
                let row: usize = parse_value("HEADER_ROW", &value)?;
                if row == 0 {
                    return Err(invalid("HEADER_ROW", &value, "rows are numbered from 1"));
                }
                row
            }
            None => defaults.header_row,
        };

        let fuzzy_threshold = match get("FUZZY_THRESHOLD") {
            Some(value) => {
                let threshold: f64 = parse_value("FUZZY_THRESHOLD", &value)?;
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(invalid("FUZZY_THRESHOLD", &value, "must be between 0 and 1"));
                }
                threshold
            }
            None => defaults.fuzzy_threshold,
        };

        let fuzzy_match = match get("FUZZY_MATCH") {
            Some(value) => parse_bool("FUZZY_MATCH", &value)?,
            None => defaults.fuzzy_match,
        };

        let server_port = match get("SERVER_PORT") {
            Some(value) => parse_value("SERVER_PORT", &value)?,
            None => defaults.server_port,
        };

        let key_columns = get("KEY_COLUMNS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            mapping_file: get("MAPPING_FILE").or_else(|| get("COLUMNS_FILE")).map(PathBuf::from),
            header_row,
            sheet_name: get("SHEET_NAME"),
            fuzzy_match,
            fuzzy_threshold,
            key_columns,
            server_port,
        })
    }

    /// Mapping file, or an error naming the variable to set.
    pub fn require_mapping(&self) -> Result<PathBuf, SettingsError> {
        self.mapping_file
            .clone()
            .ok_or_else(|| SettingsError::Missing("MAPPING_FILE (or pass --mapping)".to_string()))
    }
}

fn invalid(key: &str, value: &str, message: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: message.to_string(),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, SettingsError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| invalid(key, value, &e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, SettingsError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.header_row, 4);
        assert!(s.fuzzy_match);
        assert_eq!(s.server_port, 3000);
    }

    #[test]
    fn test_values_are_read() {
        let s = settings(&[
            ("COLUMNS_FILE", "legacy.csv"),
            ("HEADER_ROW", "2"),
            ("SHEET_NAME", "Orders"),
            ("FUZZY_MATCH", "off"),
            ("FUZZY_THRESHOLD", "0.85"),
            ("KEY_COLUMNS", "Order No, Customer ,"),
            ("SERVER_PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(s.mapping_file, Some(PathBuf::from("legacy.csv")));
        assert_eq!(s.header_row, 2);
        assert_eq!(s.sheet_name.as_deref(), Some("Orders"));
        assert!(!s.fuzzy_match);
        assert_eq!(s.fuzzy_threshold, 0.85);
        assert_eq!(s.key_columns, vec!["Order No", "Customer"]);
        assert_eq!(s.server_port, 8080);
    }

    #[test]
    fn test_mapping_file_wins_over_alias() {
        let s = settings(&[("MAPPING_FILE", "new.csv"), ("COLUMNS_FILE", "old.csv")]).unwrap();
        assert_eq!(s.mapping_file, Some(PathBuf::from("new.csv")));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            settings(&[("HEADER_ROW", "0")]),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings(&[("FUZZY_THRESHOLD", "1.5")]),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings(&[("FUZZY_MATCH", "maybe")]),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            settings(&[("SERVER_PORT", "http")]),
            Err(SettingsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_require_mapping() {
        let err = Settings::default().require_mapping().unwrap_err();
        assert!(err.to_string().contains("MAPPING_FILE"));
    }
}
