//! Statistics module - trend calculations

mod calculator;

pub use calculator::{InsufficientData, Trend, TrendCalculator, TrendSummary};
pub(crate) use calculator::serialize_std_dev;
