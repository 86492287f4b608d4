//! Statistics Calculator Module
//! Descriptive statistics and first-difference trend classification.

use serde::{Serialize, Serializer};
use statrs::statistics::Statistics;
use std::fmt;
use thiserror::Error;

/// Raised in place of a standard deviation when a group has fewer than two values.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("insufficient data: {count} value(s), at least 2 needed for a standard deviation")]
pub struct InsufficientData {
    pub count: usize,
}

/// Direction of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        };
        f.write_str(label)
    }
}

/// Statistics for one ordered sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub count: usize,
    pub mean: f64,
    #[serde(serialize_with = "serialize_std_dev")]
    pub std_dev: Result<f64, InsufficientData>,
    pub trend: Trend,
}

pub(crate) fn serialize_std_dev<S: Serializer>(
    std_dev: &Result<f64, InsufficientData>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match std_dev {
        Ok(v) => serializer.serialize_some(v),
        Err(_) => serializer.serialize_none(),
    }
}

/// Handles the trend statistics shared by the reporter and the advisor.
pub struct TrendCalculator;

impl TrendCalculator {
    /// Arithmetic mean. NaN for an empty slice.
    pub fn mean(values: &[f64]) -> f64 {
        values.iter().mean()
    }

    /// Sample (N-1) standard deviation.
    pub fn std_dev(values: &[f64]) -> Result<f64, InsufficientData> {
        if values.len() < 2 {
            return Err(InsufficientData {
                count: values.len(),
            });
        }
        Ok(values.iter().std_dev())
    }

    /// Classify by the mean of successive differences.
    ///
    /// Sequences with fewer than two values have no differences and are stable.
    pub fn classify(values: &[f64]) -> Trend {
        let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
        if diffs.is_empty() {
            return Trend::Stable;
        }

        let mean_diff = Self::mean(&diffs);
        if mean_diff > 0.0 {
            Trend::Increasing
        } else if mean_diff < 0.0 {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    /// Summarize a sequence that is already in order.
    pub fn summarize(values: &[f64]) -> TrendSummary {
        TrendSummary {
            count: values.len(),
            mean: Self::mean(values),
            std_dev: Self::std_dev(values),
            trend: Self::classify(values),
        }
    }

    /// Order `points` by key (stable) and summarize the whole sequence.
    pub fn summarize_sequence<K: Ord>(points: &[(K, f64)]) -> TrendSummary {
        let mut ordered: Vec<&(K, f64)> = points.iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));
        let values: Vec<f64> = ordered.iter().map(|(_, v)| *v).collect();
        Self::summarize(&values)
    }

    /// One summary per distinct key, keys ascending. Members keep their input order.
    pub fn summarize_by_key<K: Ord + Clone>(points: &[(K, f64)]) -> Vec<(K, TrendSummary)> {
        let mut keys: Vec<K> = points.iter().map(|(k, _)| k.clone()).collect();
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .map(|key| {
                let values: Vec<f64> = points
                    .iter()
                    .filter(|(k, _)| *k == key)
                    .map(|(_, v)| *v)
                    .collect();
                let summary = Self::summarize(&values);
                (key, summary)
            })
            .collect()
    }
}
