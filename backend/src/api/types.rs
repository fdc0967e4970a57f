//! REST API types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ConversionWarning;
use crate::transform::pipeline::Conversion;

/// Response sent after a successful conversion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub job_id: String,

    /// `ready`, or `warning` when the conversion reported warnings
    pub status: String,

    /// The serialized booking document
    pub xml: String,

    pub metadata: ConvertMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertMetadata {
    pub file_name: String,
    pub sheet: String,
    pub header_row: usize,
    pub columns: usize,
    pub rows_read: usize,
    pub shipments: usize,
    pub rows_skipped: usize,
    pub warnings: Vec<ConversionWarning>,
}

impl ConvertResponse {
    pub fn new(file_name: impl Into<String>, conversion: Conversion, xml: String) -> Self {
        let status = if conversion.warnings.is_empty() {
            "ready"
        } else {
            "warning"
        };
        let stats = conversion.stats;

        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status.to_string(),
            xml,
            metadata: ConvertMetadata {
                file_name: file_name.into(),
                sheet: stats.sheet,
                header_row: stats.header_row,
                columns: stats.columns,
                rows_read: stats.rows_read,
                shipments: stats.shipments,
                rows_skipped: stats.rows_skipped,
                warnings: conversion.warnings,
            },
        }
    }
}

/// Body of a failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub job_id: String,
    pub status: String,
    pub error: String,
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!(ErrorResponse {
        job_id: Uuid::new_v4().to_string(),
        status: "error".to_string(),
        error: error.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{OutputDocument, XmlElement};
    use crate::transform::pipeline::ConversionStats;

    fn conversion(warnings: Vec<ConversionWarning>) -> Conversion {
        Conversion {
            document: OutputDocument::new(XmlElement::new("transportbookings")),
            warnings,
            stats: ConversionStats {
                sheet: "Sheet1".into(),
                header_row: 4,
                columns: 6,
                rows_read: 3,
                shipments: 2,
                rows_skipped: 1,
            },
        }
    }

    #[test]
    fn test_ready_response_shape() {
        let response = ConvertResponse::new("orders.xlsx", conversion(Vec::new()), "<x/>".into());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["status"], "ready");
        assert_eq!(json["xml"], "<x/>");
        assert_eq!(json["metadata"]["fileName"], "orders.xlsx");
        assert_eq!(json["metadata"]["headerRow"], 4);
        assert_eq!(json["metadata"]["rowsSkipped"], 1);
        assert!(Uuid::parse_str(json["jobId"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_warnings_set_status() {
        let response = ConvertResponse::new(
            "orders.xlsx",
            conversion(vec![ConversionWarning::EmptyResult { rows_read: 0 }]),
            String::new(),
        );
        assert_eq!(response.status, "warning");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["metadata"]["warnings"][0]["kind"], "emptyResult");
    }

    #[test]
    fn test_error_response() {
        let json = error_response("No file provided");
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "No file provided");
        assert!(json["jobId"].is_string());
    }
}
