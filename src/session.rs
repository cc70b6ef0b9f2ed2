//! Drawing state of one program run.
//!
//! A [`ReportSession`] collects figures as series are added and writes all of them
//! in one [`ReportSession::present`] call at the end of the run.

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::aggregate::AggregateSeries;
use crate::chart_export::{
    write_chart, AxisLabels, AxisScale, ChartExportSeries, Figure, FigureStyle,
};
use crate::error::ReportError;
use crate::ChartFormat;

pub struct ReportSession {
    style: FigureStyle,
    figures: Vec<Figure>,
    shared: Option<usize>,
}

impl ReportSession {
    pub fn new(style: FigureStyle) -> Self {
        Self {
            style,
            figures: Vec::new(),
            shared: None,
        }
    }

    pub fn figures(&self) -> &[Figure] {
        &self.figures
    }

    /// Start a log-scaled axis with a legend that later `add_series` calls draw onto.
    /// Opening another shared axis retargets `add_series` to the new one.
    pub fn open_shared_axis(&mut self, name: impl Into<String>, labels: AxisLabels) {
        let mut figure = Figure::new(name, labels, AxisScale::Log);
        figure.legend = true;
        self.figures.push(figure);
        self.shared = Some(self.figures.len() - 1);
    }

    /// Overlay `series` on the shared axis as a labeled line with a ±std band.
    pub fn add_series(
        &mut self,
        series: &AggregateSeries,
        label: &str,
    ) -> std::result::Result<(), ReportError> {
        let idx = self.shared.ok_or(ReportError::NoSharedAxis)?;
        let export = export_series(series, Some(label))?;
        let figure = &mut self.figures[idx];
        tracing::debug!(
            figure = %figure.name,
            label,
            key_field = series.key_field(),
            value_field = series.value_field(),
            points = series.len(),
            "added series to shared axis"
        );
        figure.series.push(export);
        Ok(())
    }

    /// Put `series` on a new linear axis of its own, without a legend.
    pub fn new_panel(
        &mut self,
        name: impl Into<String>,
        series: &AggregateSeries,
        labels: AxisLabels,
    ) -> std::result::Result<(), ReportError> {
        let export = export_series(series, None)?;
        let mut figure = Figure::new(name, labels, AxisScale::Linear);
        tracing::debug!(
            figure = %figure.name,
            key_field = series.key_field(),
            value_field = series.value_field(),
            points = series.len(),
            "created panel"
        );
        figure.series.push(export);
        self.figures.push(figure);
        Ok(())
    }

    /// Write every figure to `out_dir` as `<name>.<ext>`, in creation order, and end
    /// the session. Returns the written paths.
    pub fn present(self, out_dir: &Path, format: ChartFormat) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)
            .wrap_err_with(|| format!("Failed to create output directory {}", out_dir.display()))?;

        let mut seen: HashMap<&str, usize> = HashMap::new();
        let mut written = Vec::with_capacity(self.figures.len());
        for figure in &self.figures {
            let count = seen.entry(figure.name.as_str()).or_insert(0);
            *count += 1;
            let stem = if *count == 1 {
                figure.name.clone()
            } else {
                format!("{}-{}", figure.name, count)
            };
            let path = out_dir.join(format!("{}.{}", stem, format.extension()));

            if !figure.has_data() {
                tracing::warn!(figure = %figure.name, "figure has no data points");
            }
            write_chart(&path, figure, &self.style, format).wrap_err_with(|| {
                format!(
                    "Failed to write {} figure {}",
                    format.as_str(),
                    path.display()
                )
            })?;
            tracing::info!(path = %path.display(), "wrote figure");
            written.push(path);
        }
        Ok(written)
    }
}

fn export_series(
    series: &AggregateSeries,
    label: Option<&str>,
) -> std::result::Result<ChartExportSeries, ReportError> {
    Ok(ChartExportSeries {
        label: label.map(str::to_string),
        x: series.x_values()?,
        mean: series.mean().to_vec(),
        std: series.std().to_vec(),
    })
}
