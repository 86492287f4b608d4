//! Analysis module - behavioral report and vaccination guidance

mod behavior;
mod guidance;

pub use behavior::{BehavioralTrendReporter, TrendRecord, VACCINATION_GROUP_CATEGORIES};
pub use guidance::{
    AdvisorError, Scope, VaccinationGuidance, VaccinationGuidanceAdvisor, YearlyRate,
    VACCINATION_RATE_INDICATOR,
};
