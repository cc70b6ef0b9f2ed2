//! Built-in report plans and the run that executes them.

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use std::path::PathBuf;

use crate::aggregate::aggregate_with;
use crate::chart_export::{AxisLabels, FigureStyle};
use crate::config::AppConfig;
use crate::error::ReportError;
use crate::session::ReportSession;
use crate::source::SourceResolver;
use crate::{Args, ChartFormat, ReportKind, ShapePolicy};

/// Independent variable of the memory report.
pub const MEMORY_KEY_FIELD: &str = "t";
/// Dependent variable of the memory report.
pub const MEMORY_VALUE_FIELD: &str = "s";
/// Dependent variable of the delivery report.
pub const DELIVERY_VALUE_FIELD: &str = "r";

/// A source overlaid on the memory report's shared axis.
#[derive(Debug, Clone, Copy)]
pub struct SeriesPlan {
    pub source: &'static str,
    pub label: &'static str,
}

/// One delivery-rate panel. The x label defaults to the source id.
#[derive(Debug, Clone, Copy)]
pub struct PanelPlan {
    pub source: &'static str,
    pub key_field: &'static str,
    pub x_label: Option<&'static str>,
}

impl PanelPlan {
    pub fn x_label(&self) -> &'static str {
        self.x_label.unwrap_or(self.source)
    }
}

pub const MEMORY_FIGURE: &str = "memory";
pub const MEMORY_X_LABEL: &str = "Time Step";
pub const MEMORY_Y_LABEL: &str = "Memory Usage per User";

pub const MEMORY_SERIES: [SeriesPlan; 2] = [
    SeriesPlan {
        source: "M1",
        label: "ASMesh 1",
    },
    SeriesPlan {
        source: "M2",
        label: "ASMesh 2",
    },
];

pub const DELIVERY_PANELS: [PanelPlan; 4] = [
    PanelPlan {
        source: "pt",
        key_field: "nHop",
        x_label: None,
    },
    PanelPlan {
        source: "nd",
        key_field: "nRep",
        x_label: None,
    },
    PanelPlan {
        source: "l",
        key_field: "pSend",
        x_label: Some("λ"),
    },
    PanelPlan {
        source: "r",
        key_field: "dMove",
        x_label: None,
    },
];

/// Everything a run needs, resolved from the command line and configuration.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub resolver: SourceResolver,
    pub style: FigureStyle,
    pub output_dir: PathBuf,
    pub format: ChartFormat,
    pub shape_policy: ShapePolicy,
    pub debug: bool,
}

impl RunOptions {
    /// Command-line values win over configuration values.
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Result<Self> {
        let input_dir = args
            .input_dir
            .clone()
            .unwrap_or_else(|| config.input.dir.clone());
        let input_format = match args.input_format {
            Some(format) => format,
            None => config.input_format()?,
        };
        let compression = match args.compression {
            Some(compression) => Some(compression),
            None => config.compression()?,
        };

        let mut style = config.figure_style();
        if let Some(dpi) = args.dpi {
            if dpi == 0 {
                return Err(color_eyre::eyre::eyre!("--dpi must be greater than 0"));
            }
            style.dpi = dpi;
        }

        Ok(Self {
            resolver: SourceResolver::new(input_dir)
                .with_format(input_format)
                .with_compression(compression),
            style,
            output_dir: args
                .output_dir
                .clone()
                .unwrap_or_else(|| config.output.dir.clone()),
            format: match args.format {
                Some(format) => format,
                None => config.chart_format()?,
            },
            shape_policy: match args.shape_policy {
                Some(policy) => policy,
                None => config.shape_policy()?,
            },
            debug: args.debug || config.debug.enabled,
        })
    }
}

/// Both meshes' memory usage on one shared log axis.
pub fn memory_report(
    session: &mut ReportSession,
    resolver: &SourceResolver,
    policy: ShapePolicy,
) -> std::result::Result<(), ReportError> {
    session.open_shared_axis(
        MEMORY_FIGURE,
        AxisLabels::new(MEMORY_X_LABEL, MEMORY_Y_LABEL),
    );
    for plan in &MEMORY_SERIES {
        let records = resolver.load(plan.source)?;
        let series = aggregate_with(
            records.records(),
            MEMORY_KEY_FIELD,
            MEMORY_VALUE_FIELD,
            policy,
        )?;
        session.add_series(&series, plan.label)?;
    }
    Ok(())
}

/// One delivery-rate panel per swept parameter.
pub fn delivery_report(
    session: &mut ReportSession,
    resolver: &SourceResolver,
    policy: ShapePolicy,
) -> std::result::Result<(), ReportError> {
    for plan in &DELIVERY_PANELS {
        let records = resolver.load(plan.source)?;
        let series = aggregate_with(
            records.records(),
            plan.key_field,
            DELIVERY_VALUE_FIELD,
            policy,
        )?;
        session.new_panel(plan.source, &series, AxisLabels::delivery(plan.x_label()))?;
    }
    Ok(())
}

pub fn build_report(
    kind: ReportKind,
    session: &mut ReportSession,
    options: &RunOptions,
) -> std::result::Result<(), ReportError> {
    match kind {
        ReportKind::Memory => memory_report(session, &options.resolver, options.shape_policy),
        ReportKind::Delivery => delivery_report(session, &options.resolver, options.shape_policy),
    }
}

/// Build every requested report into one session, then write all figures together.
/// Nothing is written if any report fails.
pub fn run_reports(kinds: &[ReportKind], options: &RunOptions) -> Result<Vec<PathBuf>> {
    let mut session = ReportSession::new(options.style.clone());
    for &kind in kinds {
        tracing::info!(report = ?kind, "building report");
        build_report(kind, &mut session, options)
            .wrap_err_with(|| format!("{:?} report failed", kind))?;
    }
    session.present(&options.output_dir, options.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn panel_label_defaults_to_source() {
        let labels: Vec<_> = DELIVERY_PANELS.iter().map(PanelPlan::x_label).collect();
        assert_eq!(labels, vec!["pt", "nd", "λ", "r"]);
    }

    #[test]
    fn args_override_config() {
        let mut config = AppConfig::default();
        config.output.format = "svg".to_string();
        config.input.dir = PathBuf::from("runs");

        let args = Args::parse_from(["meshplot", "--format", "eps", "--dpi", "300"]);
        let opts = RunOptions::from_args_and_config(&args, &config).unwrap();
        assert_eq!(opts.format, ChartFormat::Eps);
        assert_eq!(opts.style.dpi, 300);
        assert_eq!(opts.resolver.dir(), std::path::Path::new("runs"));
        assert_eq!(opts.output_dir, PathBuf::from("figures"));
        assert_eq!(opts.shape_policy, ShapePolicy::Strict);
        assert!(!opts.debug);
    }

    #[test]
    fn config_values_used_when_args_absent() {
        let mut config = AppConfig::default();
        config.aggregate.shape_policy = "per-group".to_string();
        config.debug.enabled = true;

        let args = Args::parse_from(["meshplot"]);
        let opts = RunOptions::from_args_and_config(&args, &config).unwrap();
        assert_eq!(opts.format, ChartFormat::Png);
        assert_eq!(opts.shape_policy, ShapePolicy::PerGroup);
        assert!(opts.debug);
    }

    #[test]
    fn zero_dpi_is_rejected() {
        let args = Args::parse_from(["meshplot", "--dpi", "0"]);
        assert!(RunOptions::from_args_and_config(&args, &AppConfig::default()).is_err());
    }
}
