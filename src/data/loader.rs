//! Record Store Module
//! Holds the in-memory dataset over a Polars DataFrame and handles CSV
//! persistence.

use crate::data::schema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Field not found in dataset: {0}")]
    Schema(String),
    #[error("Polars error: {0}")]
    PolarsError(PolarsError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Schema file error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Column {field} has type {dtype}, which cannot be saved")]
    UnsupportedType { field: String, dtype: String },
    #[error("Column {field} holds {value:?}, which is not a valid {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: &'static str,
    },
}

impl From<PolarsError> for StoreError {
    fn from(err: PolarsError) -> Self {
        match err {
            PolarsError::ColumnNotFound(name) | PolarsError::SchemaFieldNotFound(name) => {
                StoreError::Schema(name.to_string())
            }
            PolarsError::Context { error, .. } => StoreError::from(*error),
            other => StoreError::PolarsError(other),
        }
    }
}

/// Values of the key fields for one partition. `None` stands for null.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(pub Vec<Option<String>>);

impl GroupKey {
    pub fn parts(&self) -> &[Option<String>] {
        &self.0
    }

    /// Part at `index`, if present and non-null.
    pub fn part(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|p| p.as_deref())
    }

    pub fn has_null(&self) -> bool {
        self.0.iter().any(Option::is_none)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<&str> = self
            .0
            .iter()
            .map(|p| p.as_deref().unwrap_or("null"))
            .collect();
        write!(f, "({})", rendered.join(", "))
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            let ord = match (a, b) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => natural_cmp(a, b),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

/// Numeric parts sort before text parts. Numbers compare by value (years),
/// text lexically; equal numbers fall back to their text.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Column type as recorded in the schema file written next to a saved CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StoredType {
    Text,
    Float64,
    Int64,
    Boolean,
    DatetimeMs,
}

impl StoredType {
    fn of(column: &Column) -> Result<Self, StoreError> {
        match column.dtype() {
            DataType::String => Ok(Self::Text),
            DataType::Float64 => Ok(Self::Float64),
            DataType::Int64 => Ok(Self::Int64),
            DataType::Boolean => Ok(Self::Boolean),
            DataType::Datetime(TimeUnit::Milliseconds, None) => Ok(Self::DatetimeMs),
            other => Err(StoreError::UnsupportedType {
                field: column.name().to_string(),
                dtype: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredColumn {
    name: String,
    dtype: StoredType,
}

/// Path of the schema file that accompanies the CSV at `path`.
pub fn schema_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".schema.json");
    PathBuf::from(name)
}

/// Build a predicate matching rows whose `field` equals any of `values`.
pub fn is_one_of(field: &str, values: &[&str]) -> Expr {
    values
        .iter()
        .map(|v| col(field).eq(lit(*v)))
        .reduce(|acc, e| acc.or(e))
        .unwrap_or_else(|| lit(false))
}

/// The in-memory dataset: ordered rows sharing one schema.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    df: DataFrame,
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.df.equals_missing(&other.df)
    }
}

impl Dataset {
    pub fn new(df: DataFrame) -> Self {
        Self { df }
    }

    /// Build a text-typed dataset from column names and row cells.
    pub fn from_rows(
        columns: &[String],
        rows: &[Vec<Option<String>>],
    ) -> Result<Self, StoreError> {
        let mut cells: Vec<Vec<Option<String>>> =
            vec![Vec::with_capacity(rows.len()); columns.len()];
        for row in rows {
            for (i, cell) in row.iter().enumerate().take(columns.len()) {
                cells[i].push(cell.clone());
            }
        }

        let cols: Vec<Column> = columns
            .iter()
            .zip(cells)
            .map(|(name, values)| Column::new(name.as_str().into(), values))
            .collect();

        Ok(Self {
            df: DataFrame::new(cols)?,
        })
    }

    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.df.get_column_index(field).is_some()
    }

    /// Fail with a schema error naming the first absent field.
    pub fn require(&self, fields: &[&str]) -> Result<(), StoreError> {
        match fields.iter().find(|f| !self.has_column(f)) {
            Some(missing) => Err(StoreError::Schema(missing.to_string())),
            None => Ok(()),
        }
    }

    pub(crate) fn column(&self, field: &str) -> Result<&Column, StoreError> {
        self.require(&[field])?;
        Ok(self.df.column(field)?)
    }

    /// Replace (or append) a column in place.
    pub(crate) fn replace_column(&mut self, column: Column) -> Result<(), StoreError> {
        self.df.with_column(column)?;
        Ok(())
    }

    /// Rows satisfying `predicate`. The source dataset is untouched.
    pub fn filter(&self, predicate: Expr) -> Result<Dataset, StoreError> {
        let df = self.df.clone().lazy().filter(predicate).collect()?;
        Ok(Self { df })
    }

    /// Rows restricted to `fields`, in the order given.
    pub fn project(&self, fields: &[&str]) -> Result<Dataset, StoreError> {
        self.require(fields)?;
        let df = self.df.select(fields.iter().copied())?;
        Ok(Self { df })
    }

    /// Render the given columns as text for key comparisons.
    fn text_columns(&self, fields: &[&str]) -> Result<Vec<Column>, StoreError> {
        self.require(fields)?;
        fields
            .iter()
            .map(|f| -> Result<Column, StoreError> {
                Ok(self.df.column(f)?.cast(&DataType::String)?)
            })
            .collect()
    }

    /// Key of every row over `fields`, in row order.
    fn row_keys(&self, fields: &[&str]) -> Result<Vec<GroupKey>, StoreError> {
        let columns = self.text_columns(fields)?;
        let chunked: Vec<&StringChunked> = columns
            .iter()
            .map(|c| c.str())
            .collect::<PolarsResult<_>>()?;

        Ok((0..self.df.height())
            .map(|i| {
                GroupKey(
                    chunked
                        .iter()
                        .map(|ca| ca.get(i).map(str::to_string))
                        .collect(),
                )
            })
            .collect())
    }

    /// Partition rows by equality of `key_fields`.
    ///
    /// Groups come back in first-seen order; every row lands in exactly
    /// one group, null keys included.
    pub fn group_by(&self, key_fields: &[&str]) -> Result<Vec<(GroupKey, Dataset)>, StoreError> {
        let keys = self.row_keys(key_fields)?;

        let mut order: Vec<GroupKey> = Vec::new();
        let mut members: HashMap<GroupKey, Vec<IdxSize>> = HashMap::new();
        for (i, key) in keys.into_iter().enumerate() {
            members
                .entry(key)
                .or_insert_with_key(|k| {
                    order.push(k.clone());
                    Vec::new()
                })
                .push(i as IdxSize);
        }

        order
            .into_iter()
            .map(|key| {
                let idx = members.remove(&key).unwrap_or_default();
                let df = self.df.take(&IdxCa::from_vec("idx".into(), idx))?;
                Ok((key, Self { df }))
            })
            .collect()
    }

    /// Drop rows identical to an earlier row, keeping row order.
    /// Returns how many rows were removed.
    pub(crate) fn drop_duplicate_rows(&mut self) -> Result<usize, StoreError> {
        let before = self.df.height();
        self.df = self
            .df
            .unique_stable(None, UniqueKeepStrategy::First, None)?;
        Ok(before - self.df.height())
    }

    /// Values of `field` as numbers. Unparsable and NaN cells are `None`.
    pub fn numeric_values(&self, field: &str) -> Result<Vec<Option<f64>>, StoreError> {
        let column = self.column(field)?;
        let values = match column.dtype() {
            DataType::String => column
                .str()?
                .into_iter()
                .map(|v| v.and_then(schema::parse_number))
                .collect(),
            _ => {
                let as_f64 = column.cast(&DataType::Float64)?;
                as_f64
                    .f64()?
                    .into_iter()
                    .map(|v| v.filter(|x| !x.is_nan()))
                    .collect()
            }
        };
        Ok(values)
    }

    /// Distinct non-null values of `field` rendered as text, sorted.
    pub fn distinct_values(&self, field: &str) -> Result<Vec<String>, StoreError> {
        let unique = self
            .column(field)?
            .cast(&DataType::String)?
            .drop_nulls()
            .unique()?;
        let mut values: Vec<String> = unique
            .str()?
            .into_no_null_iter()
            .map(str::to_string)
            .collect();
        values.sort();
        Ok(values)
    }

    /// Write the dataset as CSV with a header row, plus a schema file at
    /// [`schema_path`] recording each column's type.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let stored: Vec<StoredColumn> = self
            .df
            .get_columns()
            .iter()
            .map(|c| -> Result<StoredColumn, StoreError> {
                Ok(StoredColumn {
                    name: c.name().to_string(),
                    dtype: StoredType::of(c)?,
                })
            })
            .collect::<Result<_, _>>()?;

        let mut file = File::create(path)?;
        let mut df = self.df.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)?;

        let schema_file = BufWriter::new(File::create(schema_path(path))?);
        serde_json::to_writer_pretty(schema_file, &stored)?;
        Ok(())
    }

    /// Read a CSV written by [`Dataset::save`].
    ///
    /// Every column is read as text, then converted back to the type the
    /// schema file recorded at save time. Without a schema file all columns
    /// stay text.
    pub fn load(path: impl AsRef<Path>) -> Result<Dataset, StoreError> {
        let path = path.as_ref();
        let df = LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?;
        let mut dataset = Self { df };

        let schema_file = schema_path(path);
        if schema_file.exists() {
            let stored: Vec<StoredColumn> =
                serde_json::from_reader(BufReader::new(File::open(&schema_file)?))?;
            dataset.restore_types(&stored)?;
        }
        Ok(dataset)
    }

    fn restore_types(&mut self, stored: &[StoredColumn]) -> Result<(), StoreError> {
        for entry in stored {
            let field = entry.name.as_str();
            let text = self.column(field)?.str()?;
            let restored: Column = match entry.dtype {
                StoredType::Text => continue,
                StoredType::Float64 => {
                    let values = parse_all(field, text, "float", |s| s.parse::<f64>().ok())?;
                    Column::new(field.into(), values)
                }
                StoredType::Int64 => {
                    let values = parse_all(field, text, "integer", |s| s.parse::<i64>().ok())?;
                    Column::new(field.into(), values)
                }
                StoredType::Boolean => {
                    let values = parse_all(field, text, "boolean", |s| s.parse::<bool>().ok())?;
                    Column::new(field.into(), values)
                }
                StoredType::DatetimeMs => {
                    let millis = parse_all(field, text, "timestamp", schema::parse_timestamp_millis)?;
                    Int64Chunked::new(field.into(), millis)
                        .into_datetime(TimeUnit::Milliseconds, None)
                        .into_series()
                        .into()
                }
            };
            self.df.with_column(restored)?;
        }
        Ok(())
    }
}

/// Convert every non-null cell with `parse`; the first failure is an error.
fn parse_all<T>(
    field: &str,
    values: &StringChunked,
    expected: &'static str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Vec<Option<T>>, StoreError> {
    values
        .into_iter()
        .map(|cell| match cell {
            None => Ok(None),
            Some(raw) => parse(raw).map(Some).ok_or_else(|| StoreError::InvalidValue {
                field: field.to_string(),
                value: raw.to_string(),
                expected,
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let columns = vec!["name".to_string(), "year".to_string(), "value".to_string()];
        let rows = vec![
            vec![Some("a".into()), Some("2021".into()), Some("1".into())],
            vec![Some("b".into()), Some("2020".into()), Some("2".into())],
            vec![Some("a".into()), Some("2021".into()), Some("3".into())],
            vec![Some("c".into()), None, Some("4".into())],
        ];
        Dataset::from_rows(&columns, &rows).unwrap()
    }

    #[test]
    fn filter_does_not_mutate_source() {
        let ds = sample();
        let filtered = ds.filter(col("name").eq(lit("a"))).unwrap();
        assert_eq!(filtered.height(), 2);
        assert_eq!(ds.height(), 4);
    }

    #[test]
    fn is_one_of_matches_allow_list() {
        let ds = sample();
        let filtered = ds.filter(is_one_of("name", &["b", "c"])).unwrap();
        assert_eq!(filtered.height(), 2);
        let none = ds.filter(is_one_of("name", &[])).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn filter_on_absent_field_is_schema_error() {
        let ds = sample();
        let err = ds.filter(col("missing").eq(lit("x"))).unwrap_err();
        assert!(matches!(err, StoreError::Schema(_)));
    }

    #[test]
    fn project_keeps_order_and_rejects_unknown_fields() {
        let ds = sample();
        let projected = ds.project(&["value", "name"]).unwrap();
        assert_eq!(projected.column_names(), vec!["value", "name"]);
        assert_eq!(projected.height(), 4);

        match ds.project(&["name", "nope"]) {
            Err(StoreError::Schema(field)) => assert_eq!(field, "nope"),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn group_by_partitions_in_first_seen_order() {
        let ds = sample();
        let groups = ds.group_by(&["name", "year"]).unwrap();

        let keys: Vec<String> = groups.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["(a, 2021)", "(b, 2020)", "(c, null)"]);

        let total: usize = groups.iter().map(|(_, g)| g.height()).sum();
        assert_eq!(total, ds.height());
        assert_eq!(groups[0].1.numeric_values("value").unwrap(), vec![Some(1.0), Some(3.0)]);
    }

    #[test]
    fn group_keys_order_years_numerically() {
        let mut keys = vec![
            GroupKey(vec![Some("10".into())]),
            GroupKey(vec![Some("9".into())]),
            GroupKey(vec![None]),
        ];
        keys.sort();
        assert_eq!(keys[0], GroupKey(vec![None]));
        assert_eq!(keys[1].part(0), Some("9"));
        assert_eq!(keys[2].part(0), Some("10"));
    }

    #[test]
    fn group_key_order_is_total_over_mixed_parts() {
        let parts = ["2", "10", "1a", "abc", "2.0", "NaN", "-1"];
        let keys: Vec<GroupKey> = parts
            .iter()
            .map(|p| GroupKey(vec![Some(p.to_string())]))
            .collect();

        for a in &keys {
            for b in &keys {
                assert_eq!(a.cmp(b), b.cmp(a).reverse());
                for c in &keys {
                    if a <= b && b <= c {
                        assert!(a <= c, "{a} <= {b} <= {c} but not {a} <= {c}");
                    }
                }
            }
        }

        let mut sorted = keys.clone();
        sorted.sort();
        let order: Vec<&str> = sorted.iter().filter_map(|k| k.part(0)).collect();
        assert_eq!(order, vec!["-1", "2", "2.0", "10", "NaN", "1a", "abc"]);
    }

    #[test]
    fn duplicate_rows_drop_in_order() {
        let mut ds = sample();
        ds.replace_column(Column::new("value".into(), ["1", "2", "1", "4"]))
            .unwrap();
        assert_eq!(ds.drop_duplicate_rows().unwrap(), 1);
        assert_eq!(ds.distinct_values("name").unwrap(), vec!["a", "b", "c"]);
        assert_eq!(
            ds.numeric_values("value").unwrap(),
            vec![Some(1.0), Some(2.0), Some(4.0)]
        );
    }

    #[test]
    fn text_columns_survive_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");

        let columns = vec!["estimate".to_string(), "created_at".to_string()];
        let rows = vec![
            vec![Some("61.0".into()), Some("2021-05-01".into())],
            vec![None, Some("1700000000".into())],
        ];
        let ds = Dataset::from_rows(&columns, &rows).unwrap();
        ds.save(&path).unwrap();

        let loaded = Dataset::load(&path).unwrap();
        assert_eq!(loaded.dataframe().column("estimate").unwrap().dtype(), &DataType::String);
        assert_eq!(loaded.dataframe().column("created_at").unwrap().dtype(), &DataType::String);
        assert_eq!(loaded, ds);
    }

    #[test]
    fn typed_columns_survive_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typed.csv");

        let created = Int64Chunked::new("created_at".into(), [Some(1_700_000_000_123i64), None])
            .into_datetime(TimeUnit::Milliseconds, None)
            .into_series();
        let df = DataFrame::new(vec![
            Column::new("estimate".into(), [Some(61.5), None]),
            Column::new("sample_size".into(), [Some("1500"), Some("n/a")]),
            Column::new("count".into(), [3i64, 4]),
            Column::new("flag".into(), [true, false]),
            created.into(),
        ])
        .unwrap();
        let ds = Dataset::new(df);
        ds.save(&path).unwrap();
        assert!(schema_path(&path).exists());

        let loaded = Dataset::load(&path).unwrap();
        assert_eq!(loaded.column_names(), ds.column_names());
        assert_eq!(loaded, ds);
    }

    #[test]
    fn csv_without_schema_file_loads_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.csv");
        std::fs::write(&path, "estimate,name\n1.5,a\n2,b\n").unwrap();

        let loaded = Dataset::load(&path).unwrap();
        assert_eq!(loaded.dataframe().column("estimate").unwrap().dtype(), &DataType::String);
        assert_eq!(loaded.numeric_values("estimate").unwrap(), vec![Some(1.5), Some(2.0)]);
    }

    #[test]
    fn schema_file_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.csv");
        let df = DataFrame::new(vec![Column::new("estimate".into(), [1.0f64, 2.0])]).unwrap();
        Dataset::new(df).save(&path).unwrap();
        std::fs::write(&path, "estimate\n1.0\nlots\n").unwrap();

        match Dataset::load(&path) {
            Err(StoreError::InvalidValue { field, value, .. }) => {
                assert_eq!(field, "estimate");
                assert_eq!(value, "lots");
            }
            other => panic!("expected invalid value, got {:?}", other),
        }
    }

    #[test]
    fn distinct_values_skip_nulls() {
        let ds = sample();
        assert_eq!(ds.distinct_values("year").unwrap(), vec!["2020", "2021"]);
    }

    #[test]
    fn numeric_values_map_garbage_to_none() {
        let columns = vec!["v".to_string()];
        let rows = vec![
            vec![Some("1.5".into())],
            vec![Some("".into())],
            vec![Some("abc".into())],
            vec![None],
        ];
        let ds = Dataset::from_rows(&columns, &rows).unwrap();
        assert_eq!(ds.numeric_values("v").unwrap(), vec![Some(1.5), None, None, None]);
    }
}
