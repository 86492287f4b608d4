//! Behavioral indicator trends for vaccination-uptake segments.

use crate::data::schema::{CONINF_95, ESTIMATE, GROUP_CATEGORY, INDICATOR_NAME, TIME_YEAR};
use crate::data::{is_one_of, Dataset, StoreError};
use crate::stats::{serialize_std_dev, InsufficientData, Trend, TrendCalculator};
use serde::Serialize;

/// Segments covered by the behavioral report.
pub const VACCINATION_GROUP_CATEGORIES: [&str; 4] = [
    "Vaccinated (>=1 dose)",
    "Definitely will get vaccinated",
    "Probably or definitely will not get vaccinated",
    "Probably will get vaccinated or are unsure",
];

/// Statistics for one (indicator, year) group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRecord {
    pub indicator_name: String,
    pub time_year: String,
    pub count: usize,
    pub mean: f64,
    #[serde(serialize_with = "serialize_std_dev")]
    pub std_dev: Result<f64, InsufficientData>,
    pub trend: Trend,
}

pub struct BehavioralTrendReporter;

impl BehavioralTrendReporter {
    /// Per-(indicator, year) estimate statistics, ordered by indicator then year.
    ///
    /// Groups with a null indicator or year are left out. The trend is taken
    /// within each group, which makes it `stable` whenever a group holds a
    /// single row.
    pub fn report(dataset: &Dataset) -> Result<Vec<TrendRecord>, StoreError> {
        dataset.require(&[GROUP_CATEGORY])?;
        let segment = dataset
            .filter(is_one_of(GROUP_CATEGORY, &VACCINATION_GROUP_CATEGORIES))?
            .project(&[INDICATOR_NAME, TIME_YEAR, ESTIMATE, CONINF_95])?;

        let mut groups = segment.group_by(&[INDICATOR_NAME, TIME_YEAR])?;
        groups.retain(|(key, _)| !key.has_null());
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        groups
            .into_iter()
            .map(|(key, group)| {
                let estimates: Vec<f64> = group
                    .numeric_values(ESTIMATE)?
                    .into_iter()
                    .flatten()
                    .collect();
                let summary = TrendCalculator::summarize(&estimates);

                Ok(TrendRecord {
                    indicator_name: key.part(0).unwrap_or_default().to_string(),
                    time_year: key.part(1).unwrap_or_default().to_string(),
                    count: summary.count,
                    mean: summary.mean,
                    std_dev: summary.std_dev,
                    trend: summary.trend,
                })
            })
            .collect()
    }
}

impl std::fmt::Display for TrendRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Behavioral Indicator: {}", self.indicator_name)?;
        writeln!(f, "Time Year: {}", self.time_year)?;
        writeln!(f, "Mean Estimate: {}", self.mean)?;
        match &self.std_dev {
            Ok(sd) => writeln!(f, "Standard Deviation Estimate: {}", sd)?,
            Err(e) => writeln!(f, "Standard Deviation Estimate: n/a ({})", e)?,
        }
        write!(f, "Trend: {}", self.trend)
    }
}
