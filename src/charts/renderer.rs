//! Static Chart Renderer
//! Draws the visualization series to a PNG with plotters.
//!
//! Layout (1200x600 by default):
//! - Left: line chart of the average estimate per year
//! - Right: bar chart of the average sample size per year

use crate::charts::plotter::{ChartSeries, VisualizationSeries};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

const LINE_COLOR: RGBColor = RGBColor(91, 155, 213);
const BAR_COLOR: RGBColor = RGBColor(237, 125, 49);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Chart drawing failed: {0}")]
    Drawing(String),
}

fn drawing_err<E: std::fmt::Display>(err: E) -> RenderError {
    RenderError::Drawing(err.to_string())
}

/// Consumes the (year, value) series produced by [`crate::charts::ChartPlotter`].
pub trait ChartRenderer {
    fn render(&self, series: &VisualizationSeries) -> Result<(), RenderError>;
}

pub struct StaticChartRenderer {
    output: PathBuf,
    width: u32,
    height: u32,
}

impl StaticChartRenderer {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            width: 1200,
            height: 600,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    fn year_label(years: &[&str], value: &SegmentValue<u32>) -> String {
        match value {
            SegmentValue::CenterOf(i) => years
                .get(*i as usize)
                .map(|y| y.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    fn draw_line_panel(
        area: &DrawingArea<BitMapBackend<'_>, Shift>,
        series: &ChartSeries,
    ) -> Result<(), RenderError> {
        let years = series.years();
        let n = years.len().max(1) as u32;
        let (y_min, y_max) = series.value_range();

        let mut chart = ChartBuilder::on(area)
            .caption(&series.title, ("sans-serif", 20))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d((0u32..n).into_segmented(), y_min..y_max)
            .map_err(drawing_err)?;

        let label = |v: &SegmentValue<u32>| Self::year_label(&years, v);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n as usize)
            .x_label_formatter(&label)
            .x_desc("Year")
            .y_desc(&series.y_label)
            .draw()
            .map_err(drawing_err)?;

        let points: Vec<(SegmentValue<u32>, f64)> = series
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| (SegmentValue::CenterOf(i as u32), p.value))
            .collect();

        chart
            .draw_series(LineSeries::new(points.clone(), LINE_COLOR.stroke_width(2)))
            .map_err(drawing_err)?;
        chart
            .draw_series(
                points
                    .into_iter()
                    .map(|p| Circle::new(p, 4, LINE_COLOR.filled())),
            )
            .map_err(drawing_err)?;

        Ok(())
    }

    fn draw_bar_panel(
        area: &DrawingArea<BitMapBackend<'_>, Shift>,
        series: &ChartSeries,
    ) -> Result<(), RenderError> {
        let years = series.years();
        let n = years.len().max(1) as u32;
        let (_, y_max) = series.value_range();

        let mut chart = ChartBuilder::on(area)
            .caption(&series.title, ("sans-serif", 20))
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d((0u32..n).into_segmented(), 0f64..y_max)
            .map_err(drawing_err)?;

        let label = |v: &SegmentValue<u32>| Self::year_label(&years, v);
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n as usize)
            .x_label_formatter(&label)
            .x_desc("Year")
            .y_desc(&series.y_label)
            .draw()
            .map_err(drawing_err)?;

        chart
            .draw_series(
                Histogram::vertical(&chart)
                    .style(BAR_COLOR.mix(0.8).filled())
                    .margin(10)
                    .data(
                        series
                            .points
                            .iter()
                            .enumerate()
                            .map(|(i, p)| (i as u32, p.value)),
                    ),
            )
            .map_err(drawing_err)?;

        Ok(())
    }
}

impl ChartRenderer for StaticChartRenderer {
    fn render(&self, series: &VisualizationSeries) -> Result<(), RenderError> {
        let root = BitMapBackend::new(&self.output, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(drawing_err)?;

        let (left, right) = root.split_horizontally(self.width / 2);
        Self::draw_line_panel(&left, &series.estimate)?;
        Self::draw_bar_panel(&right, &series.sample_size)?;

        root.present().map_err(drawing_err)?;
        Ok(())
    }
}
