//! Charts module - Chart series and rendering

mod plotter;
mod renderer;

pub use plotter::{
    ChartPlotter, ChartSeries, VisualizationSeries, YearPoint, INDICATOR_OF_INTEREST,
    SELECTED_DEMOGRAPHIC,
};
pub use renderer::{ChartRenderer, RenderError, StaticChartRenderer};
