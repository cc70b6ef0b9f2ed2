//! Shared CLI definitions for meshplot.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Serialization of a record source.
/// When `--input-format` is not specified, `json` is used.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum InputFormat {
    /// JSON array of flat objects
    Json,
    /// JSON Lines / NDJSON (one flat object per line)
    Jsonl,
}

impl InputFormat {
    /// File extension used when resolving a source id to a path.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Jsonl => "jsonl",
        }
    }
}

/// Compression format for record files
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz) - Most common, good balance of speed and compression
    Gzip,
    /// Zstandard compression (.zst) - Modern, fast compression with good ratios
    Zstd,
    /// Bzip2 compression (.bz2) - Good compression ratio, slower than gzip
    Bzip2,
    /// XZ compression (.xz) - Excellent compression ratio, slower than bzip2
    Xz,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            match ext.to_lowercase().as_str() {
                "gz" => Some(Self::Gzip),
                "zst" | "zstd" => Some(Self::Zstd),
                "bz2" | "bz" => Some(Self::Bzip2),
                "xz" => Some(Self::Xz),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Get file extension for this compression format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Zstd => "zst",
            Self::Bzip2 => "bz2",
            Self::Xz => "xz",
        }
    }
}

/// Image format for written figures.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ChartFormat {
    /// PNG bitmap
    Png,
    /// SVG vector image
    Svg,
    /// Encapsulated PostScript
    Eps,
}

impl ChartFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::Eps => "eps",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Svg => "SVG",
            Self::Eps => "EPS",
        }
    }
}

/// What to do when groups in one aggregate contribute different numbers of samples.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum ShapePolicy {
    /// Fail with a shape mismatch error (the sample matrix must be rectangular)
    #[default]
    Strict,
    /// Reduce every group over its own samples
    PerGroup,
}

/// Built-in report plans.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReportKind {
    /// Memory usage per user over time for both meshes, on one log-scale axis
    Memory,
    /// Delivery rate against each swept simulation parameter, one figure per parameter
    Delivery,
}

impl ReportKind {
    pub const ALL: [Self; 2] = [Self::Memory, Self::Delivery];
}

/// Command-line arguments for meshplot
#[derive(Clone, Parser, Debug)]
#[command(
    name = "meshplot",
    version,
    about = "Mean ± std charts from simulation records",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Reports to generate (memory, delivery). All reports are generated when omitted.
    #[arg(value_enum, num_args = 0.., value_name = "REPORT")]
    pub reports: Vec<ReportKind>,

    /// Directory holding the record files (default: out)
    #[arg(long = "input-dir", value_name = "DIR")]
    pub input_dir: Option<PathBuf>,

    /// Record file format (json, jsonl). Default: json
    #[arg(long = "input-format", value_enum)]
    pub input_format: Option<InputFormat>,

    /// Specify the compression format of record files explicitly (gzip, zstd, bzip2, xz)
    /// If not specified, detected from the extension of the record file found on disk.
    #[arg(long = "compression", value_enum)]
    pub compression: Option<CompressionFormat>,

    /// Directory to write figures into (default: figures)
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Image format for figures (png, svg, eps). Default: png
    #[arg(long = "format", value_enum)]
    pub format: Option<ChartFormat>,

    /// Resolution in dots per inch for bitmap figures (default: 100)
    #[arg(long = "dpi", value_name = "N")]
    pub dpi: Option<u32>,

    /// How groups with unequal sample counts are handled (strict, per-group). Default: strict
    #[arg(long = "shape-policy", value_enum)]
    pub shape_policy: Option<ShapePolicy>,

    /// Enable debug logging
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Generate default configuration file at ~/.config/meshplot/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

impl Args {
    /// Requested reports in plan order, every report when none were named.
    pub fn selected_reports(&self) -> Vec<ReportKind> {
        if self.reports.is_empty() {
            return ReportKind::ALL.to_vec();
        }
        let mut kinds = self.reports.clone();
        kinds.sort();
        kinds.dedup();
        kinds
    }
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
///
/// Used by the gen_docs binary; output is written to stdout.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = arg
            .get_value_names()
            .map(|names| {
                names
                    .iter()
                    .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let option_str = if arg.is_positional() {
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if !arg.get_action().takes_values() || placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}
