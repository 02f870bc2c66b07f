//! JSON import/export and CSV export of box rows.
//!
//! Accepted import shapes are a bare array of rows or an object with an
//! `items` array, which is also what `ExportDocument` serializes to. A failed
//! import never touches the rows already held by a session.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::model::BoxSpec;
use crate::volumetric::{VolumetricResult, aggregate, row_cbm};

/// Header of the CSV export.
pub const CSV_HEADER: &str = "length,width,height,unit,qty,cbm";

/// Reasons an import was rejected.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The text is not valid JSON.
    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// Valid JSON, but neither an array of rows nor `{items: [...]}`.
    #[error("JSON format not recognized. Provide an array or {{items:[...]}}")]
    UnrecognizedFormat,
}

impl ImportError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Parse(_) => "parse_error",
            ImportError::UnrecognizedFormat => "format_not_recognized",
        }
    }
}

/// Parses rows from an import document.
///
/// # Parameters
/// * `raw` - JSON text
///
/// # Returns
/// The rows, `ImportError::Parse` for malformed JSON or
/// `ImportError::UnrecognizedFormat` for any other shape
pub fn import_items(raw: &str) -> Result<Vec<BoxSpec>, ImportError> {
    let parsed: Value = serde_json::from_str(raw)?;

    let rows = match parsed {
        Value::Array(rows) => rows,
        Value::Object(mut object) => match object.remove("items") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(ImportError::UnrecognizedFormat),
        },
        _ => return Err(ImportError::UnrecognizedFormat),
    };

    rows.into_iter()
        .map(|row| match row {
            Value::Object(_) => {
                serde_json::from_value(row).map_err(|_| ImportError::UnrecognizedFormat)
            }
            _ => Err(ImportError::UnrecognizedFormat),
        })
        .collect()
}

/// Export document: the rows plus the summary computed from them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "items": [{ "length": 1.2, "width": 1.0, "height": 1.0, "unit": "m", "quantity": 5 }],
    "results": {
        "raw_cbm": 6.0, "billed_cbm": 6.0, "precision": 0.01, "volumetric_weight": 6000.0,
        "actual_weight": 0.0, "chargeable_weight": 6000.0, "recommended_container": "20GP",
        "utilization_percent": 18.18, "containers_needed": 1
    }
}))]
pub struct ExportDocument {
    pub items: Vec<BoxSpec>,
    pub results: VolumetricResult,
}

/// Renders rows as CSV with the per-row volume.
pub fn export_csv(items: &[BoxSpec]) -> String {
    let mut lines = Vec::with_capacity(items.len() + 1);
    lines.push(CSV_HEADER.to_string());

    for item in items {
        lines.push(format!(
            "{},{},{},{},{},{:.6}",
            csv_number(item.length),
            csv_number(item.width),
            csv_number(item.height),
            item.unit,
            item.quantity,
            row_cbm(item)
        ));
    }

    lines.join("\n")
}

fn csv_number(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        String::new()
    }
}

/// The rows and settings of one calculator.
#[derive(Clone, Debug, PartialEq)]
pub struct CalculatorSession {
    pub items: Vec<BoxSpec>,
    pub precision: f64,
    pub actual_weight: Option<f64>,
}

impl CalculatorSession {
    /// Creates a session with the given rows and billing precision.
    pub fn new(items: Vec<BoxSpec>, precision: f64) -> Self {
        Self {
            items,
            precision,
            actual_weight: None,
        }
    }

    /// Sets the declared shipment weight (Builder pattern light).
    pub fn with_actual_weight(mut self, actual_weight: Option<f64>) -> Self {
        self.actual_weight = actual_weight;
        self
    }

    /// Replaces the rows with an imported document.
    ///
    /// On error the current rows stay untouched.
    ///
    /// # Returns
    /// Number of imported rows
    pub fn import_json(&mut self, raw: &str) -> Result<usize, ImportError> {
        let items = import_items(raw)?;
        self.items = items;
        Ok(self.items.len())
    }

    /// Computes the summary for the current rows.
    pub fn results(&self) -> VolumetricResult {
        aggregate(&self.items, self.precision, self.actual_weight)
    }

    /// Builds the export document.
    pub fn export_document(&self) -> ExportDocument {
        ExportDocument {
            items: self.items.clone(),
            results: self.results(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::LengthUnit;

    fn session() -> CalculatorSession {
        CalculatorSession::new(
            vec![
                BoxSpec::new(1.2, 1.0, 1.0, LengthUnit::Meters, 5),
                BoxSpec::new(0.8, 0.6, 0.4, LengthUnit::Meters, 10),
            ],
            0.01,
        )
    }

    #[test]
    fn imports_bare_array() {
        let items = import_items(r#"[{"length": 50, "width": 40, "height": 30, "unit": "cm", "qty": 2}]"#)
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].unit, LengthUnit::Centimeters);
    }

    #[test]
    fn imports_items_object() {
        let items = import_items(r#"{"items": [{"length": 1, "width": 1, "height": 1}], "rawCbm": 1}"#)
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = import_items("not json").unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
        assert_eq!(err.code(), "parse_error");
    }

    #[test]
    fn wrong_shapes_are_format_errors() {
        for raw in [
            r#"{"rows": []}"#,
            r#"{"items": 3}"#,
            "42",
            r#""text""#,
            "[1, 2]",
            r#"[{"length": 1, "unit": 5}]"#,
        ] {
            let err = import_items(raw).unwrap_err();
            assert!(
                matches!(err, ImportError::UnrecognizedFormat),
                "{raw} should be a format error"
            );
            assert_eq!(err.code(), "format_not_recognized");
        }
    }

    #[test]
    fn failed_import_keeps_previous_rows() {
        let mut session = session();
        let before = session.items.clone();

        assert!(matches!(
            session.import_json("not json"),
            Err(ImportError::Parse(_))
        ));
        assert_eq!(session.items, before);

        assert!(matches!(
            session.import_json(r#"{"foo": 1}"#),
            Err(ImportError::UnrecognizedFormat)
        ));
        assert_eq!(session.items, before);
    }

    #[test]
    fn successful_import_replaces_rows() {
        let mut session = session();
        let count = session.import_json(r#"[{"length": 2, "width": 2, "height": 2}]"#).unwrap();
        assert_eq!(count, 1);
        assert_eq!(session.items.len(), 1);
        assert!((session.results().raw_cbm - 8.0).abs() < 1e-9);
    }

    #[test]
    fn export_document_imports_back() {
        let session = session().with_actual_weight(Some(800.0));
        let exported = serde_json::to_string_pretty(&session.export_document()).unwrap();

        let document: ExportDocument = serde_json::from_str(&exported).unwrap();
        assert_eq!(document.results.recommended_container, "20GP");
        assert!((document.results.actual_weight - 800.0).abs() < 1e-9);

        let mut other = CalculatorSession::new(Vec::new(), 0.01);
        other.import_json(&exported).unwrap();
        assert_eq!(other.items, session.items);
    }

    #[test]
    fn csv_lists_rows_with_volume() {
        let items = vec![
            BoxSpec::new(50.0, 40.0, 30.0, LengthUnit::Centimeters, 2),
            BoxSpec::new(f64::NAN, 1.0, 1.0, LengthUnit::Meters, 1),
        ];
        let csv = export_csv(&items);
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "50,40,30,cm,2,0.120000");
        assert_eq!(lines[2], ",1,1,m,1,0.000000");
    }
}
