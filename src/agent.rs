//! CDC Data Agent
//! Owns the dataset and runs the pipeline stages over it.

use crate::analysis::{
    AdvisorError, BehavioralTrendReporter, TrendRecord, VaccinationGuidance,
    VaccinationGuidanceAdvisor,
};
use crate::charts::{ChartPlotter, ChartRenderer, RenderError, VisualizationSeries};
use crate::data::{
    CleaningReport, DataProcessor, DataSource, Dataset, SourceError, StoreError,
    TransformationError,
};
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum VisualizeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Holds the single in-process dataset plus the conversation history.
#[derive(Debug, Default)]
pub struct CdcAgent {
    dataset: Dataset,
    conversation_history: Vec<String>,
}

impl CdcAgent {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            conversation_history: Vec::new(),
        }
    }

    /// Fetch the initial dataset. Failure here is fatal to the caller.
    pub fn from_source(source: &impl DataSource) -> Result<Self, SourceError> {
        Ok(Self::new(source.fetch()?))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Clean the dataset in place.
    ///
    /// Errors are logged and returned; the dataset keeps whatever the
    /// completed steps produced.
    pub fn validate_and_transform(&mut self) -> Result<CleaningReport, TransformationError> {
        match DataProcessor::clean(&mut self.dataset) {
            Ok(report) => {
                info!(
                    input_rows = report.input_rows,
                    duplicates_removed = report.duplicates_removed,
                    missing_removed = report.missing_removed,
                    negative_removed = report.negative_removed,
                    output_rows = report.output_rows,
                    "Data validation and transformation completed successfully"
                );
                Ok(report)
            }
            Err(e) => {
                error!(
                    error = %e,
                    rows = self.dataset.height(),
                    "Error during data validation and transformation"
                );
                Err(e)
            }
        }
    }

    pub fn analyze_behavioral_trends(&self) -> Result<Vec<TrendRecord>, StoreError> {
        let records = BehavioralTrendReporter::report(&self.dataset)?;
        info!(groups = records.len(), "Behavioral trends analyzed");
        Ok(records)
    }

    /// Guidance for an interactive scope selection ("1", "2" or a scope name).
    pub fn offer_vaccination_guidance(
        &self,
        selection: &str,
    ) -> Result<VaccinationGuidance, AdvisorError> {
        match VaccinationGuidanceAdvisor::advise_selection(&self.dataset, selection) {
            Ok(guidance) => {
                info!(
                    scope = %guidance.scope,
                    trend = %guidance.trend,
                    years = guidance.yearly_rates.len(),
                    "Vaccination guidance prepared"
                );
                Ok(guidance)
            }
            Err(e @ AdvisorError::InvalidScope(_)) => {
                warn!(selection, "Scope selection rejected");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn visualize(
        &self,
        renderer: &impl ChartRenderer,
    ) -> Result<VisualizationSeries, VisualizeError> {
        let series = ChartPlotter::series_for_visualization(&self.dataset)?;
        renderer.render(&series)?;
        info!(years = series.estimate.points.len(), "Charts rendered");
        Ok(series)
    }

    pub fn save_data(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        self.dataset.save(path.as_ref())?;
        info!(path = %path.as_ref().display(), rows = self.dataset.height(), "Data saved");
        Ok(())
    }

    /// Replace the current dataset with the file's contents.
    pub fn load_data(&mut self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        self.dataset = Dataset::load(path.as_ref())?;
        info!(path = %path.as_ref().display(), rows = self.dataset.height(), "Data loaded");
        Ok(())
    }

    pub fn remember_conversation(&mut self, conversation: impl Into<String>) {
        self.conversation_history.push(conversation.into());
    }

    pub fn conversation_history(&self) -> &[String] {
        &self.conversation_history
    }
}
