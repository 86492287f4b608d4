//! Data module - ingestion, storage and cleaning

mod loader;
mod processor;
pub mod schema;
mod source;

pub use loader::{is_one_of, schema_path, Dataset, GroupKey, StoreError};
pub use processor::{CleaningReport, CleaningStep, DataProcessor, TransformationError};
pub use source::{parse_rows_json, DataSource, SocrataSource, SourceError};
