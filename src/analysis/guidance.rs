//! Vaccination Guidance Advisor
//! Yearly vaccination-rate trend at national or jurisdictional scope, with
//! guidance text derived from it.

use crate::data::schema::{ESTIMATE, GEOGRAPHY_TYPE, INDICATOR_NAME, TIME_YEAR};
use crate::data::{Dataset, GroupKey, StoreError};
use crate::stats::{Trend, TrendCalculator};
use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const VACCINATION_RATE_INDICATOR: &str = "Vaccination Rate";

pub const MSG_INCREASING: &str =
    "Efforts to increase vaccination rates are paying off. Maintain the momentum.";
pub const MSG_DECREASING: &str =
    "Vaccination rates are declining. Consider targeted campaigns to boost vaccination.";
pub const MSG_STABLE: &str = "Continue current vaccination efforts.";
pub const MSG_HIGHER: &str =
    "The vaccination rate for the current year is higher than the previous year.";
pub const MSG_LOWER: &str =
    "The vaccination rate for the current year is lower than the previous year. Investigate reasons.";
pub const MSG_SIMILAR: &str =
    "The vaccination rate for the current year is similar to the previous year.";

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Your entered value is not in scope: {0:?}")]
    InvalidScope(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Geographic scope of the estimates considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scope {
    National,
    Jurisdictional,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::National, Scope::Jurisdictional];

    /// Menu number used by the interactive prompt.
    pub fn selector(&self) -> u8 {
        match self {
            Scope::National => 1,
            Scope::Jurisdictional => 2,
        }
    }

    /// `geography_type` value matching this scope.
    pub fn geography_type(&self) -> &'static str {
        match self {
            Scope::National => "National Estimates",
            Scope::Jurisdictional => "Jurisdictional Estimates",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::National => f.write_str("National"),
            Scope::Jurisdictional => f.write_str("Jurisdictional"),
        }
    }
}

impl FromStr for Scope {
    type Err = AdvisorError;

    /// Accepts the menu number or the scope name, case-insensitively.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "1" | "national" => Ok(Scope::National),
            "2" | "jurisdictional" => Ok(Scope::Jurisdictional),
            _ => Err(AdvisorError::InvalidScope(input.trim().to_string())),
        }
    }
}

/// Average vaccination rate for one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyRate {
    pub year: String,
    pub average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaccinationGuidance {
    pub scope: Scope,
    pub trend: Trend,
    pub yearly_rates: Vec<YearlyRate>,
    pub messages: Vec<String>,
}

pub struct VaccinationGuidanceAdvisor;

impl VaccinationGuidanceAdvisor {
    /// Parse an interactive scope selection, then advise.
    pub fn advise_selection(
        dataset: &Dataset,
        selection: &str,
    ) -> Result<VaccinationGuidance, AdvisorError> {
        let scope: Scope = selection.parse()?;
        Self::advise(dataset, scope)
    }

    pub fn advise(dataset: &Dataset, scope: Scope) -> Result<VaccinationGuidance, AdvisorError> {
        dataset.require(&[INDICATOR_NAME, GEOGRAPHY_TYPE, TIME_YEAR, ESTIMATE])?;

        let rates = dataset
            .filter(col(INDICATOR_NAME).eq(lit(VACCINATION_RATE_INDICATOR)))?
            .filter(col(GEOGRAPHY_TYPE).eq(lit(scope.geography_type())))?
            .project(&[TIME_YEAR, ESTIMATE])?;

        let yearly_rates = Self::yearly_averages(&rates)?;
        let averages: Vec<f64> = yearly_rates.iter().map(|r| r.average).collect();
        let trend = TrendCalculator::classify(&averages);

        Ok(VaccinationGuidance {
            scope,
            trend,
            messages: Self::guidance_messages(trend, &averages),
            yearly_rates,
        })
    }

    /// Mean estimate per year, ascending by year. Years without a numeric
    /// estimate are skipped.
    fn yearly_averages(rates: &Dataset) -> Result<Vec<YearlyRate>, StoreError> {
        let mut groups: Vec<(GroupKey, Dataset)> = rates
            .group_by(&[TIME_YEAR])?
            .into_iter()
            .filter(|(key, _)| !key.has_null())
            .collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));

        let mut yearly = Vec::with_capacity(groups.len());
        for (key, group) in groups {
            let estimates: Vec<f64> = group.numeric_values(ESTIMATE)?.into_iter().flatten().collect();
            if estimates.is_empty() {
                continue;
            }
            yearly.push(YearlyRate {
                year: key.part(0).unwrap_or_default().to_string(),
                average: TrendCalculator::mean(&estimates),
            });
        }
        Ok(yearly)
    }

    /// Trend message, then a comparison of the two most recent years when available.
    pub fn guidance_messages(trend: Trend, averages: &[f64]) -> Vec<String> {
        let mut messages = vec![match trend {
            Trend::Increasing => MSG_INCREASING.to_string(),
            Trend::Decreasing => MSG_DECREASING.to_string(),
            Trend::Stable => MSG_STABLE.to_string(),
        }];

        if let [.., previous, current] = averages {
            let comparison = if current > previous {
                MSG_HIGHER
            } else if current < previous {
                MSG_LOWER
            } else {
                MSG_SIMILAR
            };
            messages.push(comparison.to_string());
        }

        messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(rows: &[(&str, &str, &str, &str)]) -> Dataset {
        let columns: Vec<String> = [INDICATOR_NAME, GEOGRAPHY_TYPE, TIME_YEAR, ESTIMATE]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let rows: Vec<Vec<Option<String>>> = rows
            .iter()
            .map(|(a, b, c, d)| {
                vec![
                    Some(a.to_string()),
                    Some(b.to_string()),
                    Some(c.to_string()),
                    Some(d.to_string()),
                ]
            })
            .collect();
        Dataset::from_rows(&columns, &rows).unwrap()
    }

    #[test]
    fn scope_parses_numbers_and_names() {
        assert_eq!("1".parse::<Scope>().unwrap(), Scope::National);
        assert_eq!(" Jurisdictional ".parse::<Scope>().unwrap(), Scope::Jurisdictional);
        assert!(matches!("3".parse::<Scope>(), Err(AdvisorError::InvalidScope(s)) if s == "3"));
        assert!(matches!("".parse::<Scope>(), Err(AdvisorError::InvalidScope(_))));
    }

    #[test]
    fn national_rising_rate_is_higher_than_previous_year() {
        let ds = dataset(&[
            ("Vaccination Rate", "National Estimates", "2022", "70"),
            ("Vaccination Rate", "National Estimates", "2021", "60"),
            ("Vaccination Rate", "National Estimates", "2022", "80"),
            ("Vaccination Rate", "Jurisdictional Estimates", "2022", "10"),
            ("Mask use", "National Estimates", "2022", "5"),
        ]);

        let guidance = VaccinationGuidanceAdvisor::advise(&ds, Scope::National).unwrap();
        assert_eq!(guidance.trend, Trend::Increasing);
        assert_eq!(
            guidance.yearly_rates,
            vec![
                YearlyRate { year: "2021".into(), average: 60.0 },
                YearlyRate { year: "2022".into(), average: 75.0 },
            ]
        );
        assert_eq!(guidance.messages, vec![MSG_INCREASING, MSG_HIGHER]);
    }

    #[test]
    fn jurisdictional_scope_filters_geography() {
        let ds = dataset(&[
            ("Vaccination Rate", "National Estimates", "2021", "10"),
            ("Vaccination Rate", "Jurisdictional Estimates", "2021", "50"),
            ("Vaccination Rate", "Jurisdictional Estimates", "2022", "40"),
        ]);

        let guidance = VaccinationGuidanceAdvisor::advise_selection(&ds, "2").unwrap();
        assert_eq!(guidance.scope, Scope::Jurisdictional);
        assert_eq!(guidance.trend, Trend::Decreasing);
        assert_eq!(guidance.messages, vec![MSG_DECREASING, MSG_LOWER]);
    }

    #[test]
    fn single_year_gets_only_trend_message() {
        let ds = dataset(&[("Vaccination Rate", "National Estimates", "2021", "10")]);
        let guidance = VaccinationGuidanceAdvisor::advise(&ds, Scope::National).unwrap();
        assert_eq!(guidance.trend, Trend::Stable);
        assert_eq!(guidance.messages, vec![MSG_STABLE]);
    }

    #[test]
    fn equal_years_are_similar() {
        let messages = VaccinationGuidanceAdvisor::guidance_messages(Trend::Stable, &[5.0, 5.0]);
        assert_eq!(messages, vec![MSG_STABLE, MSG_SIMILAR]);
    }

    #[test]
    fn invalid_selection_is_returned_not_raised() {
        let ds = dataset(&[]);
        let err = VaccinationGuidanceAdvisor::advise_selection(&ds, "3").unwrap_err();
        assert!(matches!(err, AdvisorError::InvalidScope(_)));
    }
}
