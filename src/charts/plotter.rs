//! Chart Plotter Module
//! Builds the yearly series handed to the chart renderer.

use crate::data::schema::{ESTIMATE, GROUP_NAME, INDICATOR_CATEGORY, SAMPLE_SIZE, TIME_YEAR};
use crate::data::{Dataset, StoreError};
use crate::stats::TrendCalculator;
use polars::prelude::*;
use serde::Serialize;

pub const INDICATOR_OF_INTEREST: &str = "Very or Completely Confident in COVID-19 Vaccine Safety";
pub const SELECTED_DEMOGRAPHIC: &str = "Vaccination uptake and intention";

/// One (year, value) point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearPoint {
    pub year: String,
    pub value: f64,
}

/// Series for one chart panel, ordered by year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub title: String,
    pub y_label: String,
    pub points: Vec<YearPoint>,
}

impl ChartSeries {
    pub fn years(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.year.as_str()).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Padded value range for the y axis.
    pub fn value_range(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in self.values() {
            if !v.is_nan() {
                min = min.min(v);
                max = max.max(v);
            }
        }
        if min.is_infinite() {
            return (0.0, 1.0);
        }
        let pad = ((max - min) * 0.15).max(1.0);
        let lower = if min >= 0.0 { (min - pad).max(0.0) } else { min - pad };
        (lower, max + pad)
    }
}

/// The two panels: line chart of estimates, bar chart of sample sizes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisualizationSeries {
    pub estimate: ChartSeries,
    pub sample_size: ChartSeries,
}

/// Creates the visualization series from the cleaned dataset.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Yearly averages of estimate and sample size for the indicator and
    /// demographic of interest.
    pub fn series_for_visualization(dataset: &Dataset) -> Result<VisualizationSeries, StoreError> {
        dataset.require(&[INDICATOR_CATEGORY, GROUP_NAME])?;
        let selected = dataset
            .filter(
                col(INDICATOR_CATEGORY)
                    .eq(lit(INDICATOR_OF_INTEREST))
                    .and(col(GROUP_NAME).eq(lit(SELECTED_DEMOGRAPHIC))),
            )?
            .project(&[TIME_YEAR, ESTIMATE, SAMPLE_SIZE])?;

        let mut groups = selected.group_by(&[TIME_YEAR])?;
        groups.retain(|(key, _)| !key.has_null());
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        let mut series = VisualizationSeries {
            estimate: ChartSeries {
                title: "Trend of Indicator of Interest Over Time".to_string(),
                y_label: "Average Estimate".to_string(),
                points: Vec::new(),
            },
            sample_size: ChartSeries {
                title: "Average Sample Size Over Time".to_string(),
                y_label: "Average Sample Size".to_string(),
                points: Vec::new(),
            },
        };

        for (key, group) in groups {
            let year = key.part(0).unwrap_or_default().to_string();
            Self::push_average(&mut series.estimate, &year, &group, ESTIMATE)?;
            Self::push_average(&mut series.sample_size, &year, &group, SAMPLE_SIZE)?;
        }

        Ok(series)
    }

    fn push_average(
        series: &mut ChartSeries,
        year: &str,
        group: &Dataset,
        field: &str,
    ) -> Result<(), StoreError> {
        let values: Vec<f64> = group.numeric_values(field)?.into_iter().flatten().collect();
        if !values.is_empty() {
            series.points.push(YearPoint {
                year: year.to_string(),
                value: TrendCalculator::mean(&values),
            });
        }
        Ok(())
    }
}
