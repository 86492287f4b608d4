//! Data Processor Module
//! Cleaning pipeline: timestamp normalization, de-duplication, numeric
//! coercion and invalid-row removal.

use crate::data::loader::{Dataset, StoreError};
use crate::data::schema::{self, ESTIMATE, NUMERIC_FIELDS, TIMESTAMP_FIELDS};
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum TransformationError {
    #[error("{step} failed: {source}")]
    Step {
        step: CleaningStep,
        #[source]
        source: StoreError,
    },
}

/// Cleaning stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleaningStep {
    ParseTimestamps,
    RemoveDuplicates,
    CoerceNumeric,
    DropMissing,
    DropNegative,
}

impl std::fmt::Display for CleaningStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CleaningStep::ParseTimestamps => "timestamp parsing",
            CleaningStep::RemoveDuplicates => "duplicate removal",
            CleaningStep::CoerceNumeric => "numeric coercion",
            CleaningStep::DropMissing => "missing value removal",
            CleaningStep::DropNegative => "negative estimate removal",
        };
        f.write_str(name)
    }
}

/// Row counts observed while cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub duplicates_removed: usize,
    pub missing_removed: usize,
    pub negative_removed: usize,
    pub output_rows: usize,
}

trait StepContext<T> {
    fn during(self, step: CleaningStep) -> Result<T, TransformationError>;
}

impl<T> StepContext<T> for Result<T, StoreError> {
    fn during(self, step: CleaningStep) -> Result<T, TransformationError> {
        self.map_err(|source| TransformationError::Step { step, source })
    }
}

/// Handles data cleaning and transformation operations.
pub struct DataProcessor;

impl DataProcessor {
    /// Clean `dataset` in place.
    ///
    /// Each step commits only when it succeeds, so on error the dataset
    /// holds the state left by the last completed step.
    pub fn clean(dataset: &mut Dataset) -> Result<CleaningReport, TransformationError> {
        let mut report = CleaningReport {
            input_rows: dataset.height(),
            ..Default::default()
        };

        Self::parse_timestamps(dataset).during(CleaningStep::ParseTimestamps)?;

        report.duplicates_removed +=
            Self::remove_duplicates(dataset).during(CleaningStep::RemoveDuplicates)?;

        // Coercion runs before the null drop so unparsable values cannot
        // survive as nulls.
        Self::coerce_numeric(dataset).during(CleaningStep::CoerceNumeric)?;

        report.missing_removed = Self::drop_missing(dataset).during(CleaningStep::DropMissing)?;

        report.negative_removed =
            Self::drop_negative(dataset).during(CleaningStep::DropNegative)?;

        // Coercion can make textually different rows identical.
        report.duplicates_removed +=
            Self::remove_duplicates(dataset).during(CleaningStep::RemoveDuplicates)?;

        report.output_rows = dataset.height();
        Ok(report)
    }

    /// Convert timestamp fields to millisecond datetimes; unparsable cells become null.
    pub fn parse_timestamps(dataset: &mut Dataset) -> Result<(), StoreError> {
        dataset.require(&TIMESTAMP_FIELDS)?;

        let mut parsed: Vec<Series> = Vec::with_capacity(TIMESTAMP_FIELDS.len());
        for field in TIMESTAMP_FIELDS {
            let column = dataset.column(field)?;
            if matches!(column.dtype(), DataType::Datetime(_, _)) {
                continue;
            }

            let text = column.cast(&DataType::String)?;
            let millis: Vec<Option<i64>> = text
                .str()?
                .into_iter()
                .map(|v| v.and_then(schema::parse_timestamp_millis))
                .collect();
            let invalid = millis.iter().filter(|v| v.is_none()).count();
            debug!(field, invalid, "Parsed timestamp column");

            parsed.push(
                Int64Chunked::new(field.into(), millis)
                    .into_datetime(TimeUnit::Milliseconds, None)
                    .into_series(),
            );
        }

        for series in parsed {
            dataset.replace_column(series.into_column())?;
        }
        Ok(())
    }

    /// Drop exact-duplicate rows, keeping the first. Returns the number removed.
    pub fn remove_duplicates(dataset: &mut Dataset) -> Result<usize, StoreError> {
        dataset.drop_duplicate_rows()
    }

    /// Coerce the numeric fields to `Float64`. Blank, unparsable and NaN cells become null.
    pub fn coerce_numeric(dataset: &mut Dataset) -> Result<(), StoreError> {
        dataset.require(&NUMERIC_FIELDS)?;

        let mut coerced: Vec<Column> = Vec::with_capacity(NUMERIC_FIELDS.len());
        for field in NUMERIC_FIELDS {
            let values = dataset.numeric_values(field)?;
            coerced.push(Column::new(field.into(), values));
        }

        for column in coerced {
            dataset.replace_column(column)?;
        }
        Ok(())
    }

    /// Drop rows with a null in any numeric field. Returns the number removed.
    pub fn drop_missing(dataset: &mut Dataset) -> Result<usize, StoreError> {
        let before = dataset.height();
        let predicate = NUMERIC_FIELDS
            .iter()
            .map(|f| col(*f).is_not_null())
            .reduce(|acc, e| acc.and(e))
            .unwrap_or_else(|| lit(true));
        *dataset = dataset.filter(predicate)?;
        Ok(before - dataset.height())
    }

    /// Drop rows with a negative estimate. Returns the number removed.
    pub fn drop_negative(dataset: &mut Dataset) -> Result<usize, StoreError> {
        let before = dataset.height();
        *dataset = dataset.filter(col(ESTIMATE).gt_eq(lit(0.0)))?;
        Ok(before - dataset.height())
    }
}
