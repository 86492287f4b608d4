//! CDC Trends - vaccination survey cleaning, trend analysis and charting
//!
//! Pipeline: fetch the Socrata export, clean it, report behavioral trends,
//! advise on vaccination rates, chart the indicator of interest and
//! persist the cleaned dataset as CSV.

pub mod agent;
pub mod analysis;
pub mod charts;
pub mod data;
pub mod logging;
pub mod stats;

pub use agent::CdcAgent;
