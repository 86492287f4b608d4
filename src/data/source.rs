//! Data Source Module
//! Reads Socrata `rows.json` exports (column metadata plus row arrays)
//! from a URL or a local file.

use crate::data::loader::{Dataset, StoreError};
use crate::data::schema::{self, REQUIRED_FIELDS};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Row {row} has {found} cells, expected {expected}")]
    RowWidth {
        row: usize,
        found: usize,
        expected: usize,
    },
    #[error("Dataset is missing required field: {0}")]
    MissingField(String),
    #[error("Failed to build dataset: {0}")]
    Store(StoreError),
}

impl From<StoreError> for SourceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Schema(field) => SourceError::MissingField(field),
            other => SourceError::Store(other),
        }
    }
}

/// Anything that can produce the initial dataset.
pub trait DataSource {
    fn fetch(&self) -> Result<Dataset, SourceError>;
}

#[derive(Debug, Deserialize)]
struct SocrataExport {
    meta: SocrataMeta,
    data: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct SocrataMeta {
    view: SocrataView,
}

#[derive(Debug, Deserialize)]
struct SocrataView {
    columns: Vec<SocrataColumn>,
}

#[derive(Debug, Deserialize)]
struct SocrataColumn {
    #[serde(rename = "fieldName")]
    field_name: String,
}

/// A Socrata `rows.json` export, addressed by URL or file path.
#[derive(Debug, Clone)]
pub struct SocrataSource {
    location: String,
}

impl SocrataSource {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn read_body(&self) -> Result<String, SourceError> {
        if self.location.starts_with("http") {
            let resp = reqwest::blocking::get(&self.location)?.error_for_status()?;
            Ok(resp.text()?)
        } else {
            Ok(std::fs::read_to_string(&self.location)?)
        }
    }
}

impl DataSource for SocrataSource {
    #[tracing::instrument(skip(self), fields(source = %self.location))]
    fn fetch(&self) -> Result<Dataset, SourceError> {
        let body = self.read_body()?;
        let dataset = parse_rows_json(&body)?;
        info!(
            rows = dataset.height(),
            columns = dataset.column_names().len(),
            "Dataset fetched"
        );
        Ok(dataset)
    }
}

/// Parse a `rows.json` payload and check the fields the pipeline relies on.
pub fn parse_rows_json(body: &str) -> Result<Dataset, SourceError> {
    let export: SocrataExport = serde_json::from_str(body)?;

    let columns: Vec<String> = export
        .meta
        .view
        .columns
        .iter()
        .map(|c| schema::normalize_field_name(&c.field_name))
        .collect();

    let rows = export
        .data
        .into_iter()
        .enumerate()
        .map(|(row, cells)| {
            if cells.len() != columns.len() {
                return Err(SourceError::RowWidth {
                    row,
                    found: cells.len(),
                    expected: columns.len(),
                });
            }
            Ok(cells.into_iter().map(cell_text).collect())
        })
        .collect::<Result<Vec<Vec<Option<String>>>, SourceError>>()?;

    let dataset = Dataset::from_rows(&columns, &rows)?;
    dataset.require(&REQUIRED_FIELDS)?;
    Ok(dataset)
}

fn cell_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(rows: Value) -> String {
        let mut columns: Vec<Value> = vec![json!({"fieldName": ":sid"})];
        columns.extend(REQUIRED_FIELDS.iter().map(|f| {
            let name = if f.ends_with("_at") {
                format!(":{f}")
            } else {
                f.to_string()
            };
            json!({ "fieldName": name })
        }));
        json!({ "meta": { "view": { "columns": columns } }, "data": rows }).to_string()
    }

    #[test]
    fn strips_sigils_and_keeps_nulls() {
        let body = payload(json!([[
            "row-1",
            "Vaccination Rate",
            "cat",
            "Vaccinated (>=1 dose)",
            "Vaccination uptake and intention",
            "National Estimates",
            "2021",
            "55.2",
            null,
            1200,
            1700000000,
            1700000000
        ]]));

        let ds = parse_rows_json(&body).unwrap();
        assert_eq!(ds.height(), 1);
        assert_eq!(ds.column_names()[0], "sid");
        assert!(ds.has_column("created_at"));
        assert_eq!(ds.numeric_values("sample_size").unwrap(), vec![Some(1200.0)]);
        assert_eq!(ds.numeric_values("coninf_95").unwrap(), vec![None]);
    }

    #[test]
    fn rejects_ragged_rows() {
        let body = payload(json!([["only", "two"]]));
        match parse_rows_json(&body) {
            Err(SourceError::RowWidth { row, found, expected }) => {
                assert_eq!((row, found, expected), (0, 2, 12));
            }
            other => panic!("expected row width error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_missing_required_fields() {
        let body = json!({
            "meta": { "view": { "columns": [{ "fieldName": "estimate" }] } },
            "data": [["1.0"]]
        })
        .to_string();
        assert!(matches!(
            parse_rows_json(&body),
            Err(SourceError::MissingField(_))
        ));
    }

    #[test]
    fn reads_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, payload(json!([]))).unwrap();

        let ds = SocrataSource::new(path.to_string_lossy()).fetch().unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.column_names().len(), 12);
    }
}
