//! Mean ± standard deviation charts from simulation records.
//!
//! Records are loaded per variable ([`source`]), grouped by an independent variable and
//! reduced to an [`AggregateSeries`] ([`aggregate`]), then drawn through a
//! [`ReportSession`] ([`session`]) and written out by [`chart_export`].

pub mod aggregate;
pub mod chart_export;
pub mod config;
pub mod error;
pub mod record;
pub mod report;
pub mod session;
pub mod source;

pub use aggregate::{aggregate, aggregate_with, group_keys, group_samples, AggregateSeries};
pub use chart_export::{AxisLabels, AxisScale, FigureStyle};
pub use config::{AppConfig, ConfigManager};
pub use error::ReportError;
pub use record::{FieldValue, FlatRecord, Record, RecordCollection};
pub use report::{run_reports, RunOptions};
pub use session::ReportSession;
pub use source::SourceResolver;

/// Re-export shared CLI definitions
pub use meshplot_cli::{Args, ChartFormat, CompressionFormat, InputFormat, ReportKind, ShapePolicy};

/// Application name used for the config directory and other app-specific paths
pub const APP_NAME: &str = "meshplot";
