use clap::ValueEnum;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::chart_export::FigureStyle;
use crate::{ChartFormat, CompressionFormat, InputFormat, ShapePolicy};

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub input: InputConfig,
    pub figure: FigureConfig,
    pub output: OutputConfig,
    pub aggregate: AggregateConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    pub dir: PathBuf,
    pub format: String,
    pub compression: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FigureConfig {
    pub width_in: f64,
    pub height_in: f64,
    pub dpi: u32,
    pub band_alpha: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregateConfig {
    pub shape_policy: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
}

// Default implementations
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            input: InputConfig::default(),
            figure: FigureConfig::default(),
            output: OutputConfig::default(),
            aggregate: AggregateConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("out"),
            format: "json".to_string(),
            compression: None,
        }
    }
}

impl Default for FigureConfig {
    fn default() -> Self {
        let style = FigureStyle::default();
        Self {
            width_in: style.width_in,
            height_in: style.height_in,
            dpi: style.dpi,
            band_alpha: style.band_alpha,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("figures"),
            format: "png".to_string(),
        }
    }
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            shape_policy: "strict".to_string(),
        }
    }
}

/// Parse a config string into a CLI value enum, case-insensitively.
fn parse_enum<T: ValueEnum>(key: &str, value: &str) -> Result<T> {
    T::from_str(value, true).map_err(|_| {
        let allowed: Vec<String> = T::value_variants()
            .iter()
            .filter_map(|v| v.to_possible_value())
            .map(|p| p.get_name().to_string())
            .collect();
        eyre!(
            "Invalid {}: {}. Must be one of: {}",
            key,
            value,
            allowed.join(", ")
        )
    })
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        Self::load_with(&ConfigManager::new(app_name)?)
    }

    /// Load configuration using the config directory of `config_manager`
    pub fn load_with(config_manager: &ConfigManager) -> Result<Self> {
        let mut config = AppConfig::default();
        config.merge(Self::load_user_config(config_manager)?);
        config.validate()?;
        Ok(config)
    }

    /// Load user configuration from ~/.config/meshplot/config.toml
    fn load_user_config(config_manager: &ConfigManager) -> Result<AppConfig> {
        let config_path = config_manager.config_path("config.toml");

        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            eyre!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            )
        })?;

        toml::from_str(&content).map_err(|e| {
            eyre!(
                "Failed to parse config file at {}: {}",
                config_path.display(),
                e
            )
        })
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.input.merge(other.input);
        self.figure.merge(other.figure);
        self.output.merge(other.output);
        self.aggregate.merge(other.aggregate);
        self.debug.merge(other.debug);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if !(self.figure.width_in > 0.0 && self.figure.height_in > 0.0) {
            return Err(eyre!("figure width_in and height_in must be greater than 0"));
        }

        if self.figure.dpi == 0 {
            return Err(eyre!("figure dpi must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.figure.band_alpha) {
            return Err(eyre!(
                "figure band_alpha must be between 0 and 1, got {}",
                self.figure.band_alpha
            ));
        }

        self.input_format()?;
        self.compression()?;
        self.chart_format()?;
        self.shape_policy()?;

        Ok(())
    }

    pub fn input_format(&self) -> Result<InputFormat> {
        parse_enum("input format", &self.input.format)
    }

    pub fn compression(&self) -> Result<Option<CompressionFormat>> {
        self.input
            .compression
            .as_deref()
            .map(|c| parse_enum("compression", c))
            .transpose()
    }

    pub fn chart_format(&self) -> Result<ChartFormat> {
        parse_enum("output format", &self.output.format)
    }

    pub fn shape_policy(&self) -> Result<ShapePolicy> {
        parse_enum("shape_policy", &self.aggregate.shape_policy)
    }

    pub fn figure_style(&self) -> FigureStyle {
        FigureStyle {
            width_in: self.figure.width_in,
            height_in: self.figure.height_in,
            dpi: self.figure.dpi,
            band_alpha: self.figure.band_alpha,
        }
    }
}

// Merge implementations for each config section
impl InputConfig {
    pub fn merge(&mut self, other: Self) {
        let default = InputConfig::default();
        if other.dir != default.dir {
            self.dir = other.dir;
        }
        if other.format != default.format {
            self.format = other.format;
        }
        if other.compression.is_some() {
            self.compression = other.compression;
        }
    }
}

impl FigureConfig {
    pub fn merge(&mut self, other: Self) {
        let default = FigureConfig::default();
        if other.width_in != default.width_in {
            self.width_in = other.width_in;
        }
        if other.height_in != default.height_in {
            self.height_in = other.height_in;
        }
        if other.dpi != default.dpi {
            self.dpi = other.dpi;
        }
        if other.band_alpha != default.band_alpha {
            self.band_alpha = other.band_alpha;
        }
    }
}

impl OutputConfig {
    pub fn merge(&mut self, other: Self) {
        let default = OutputConfig::default();
        if other.dir != default.dir {
            self.dir = other.dir;
        }
        if other.format != default.format {
            self.format = other.format;
        }
    }
}

impl AggregateConfig {
    pub fn merge(&mut self, other: Self) {
        let default = AggregateConfig::default();
        if other.shape_policy != default.shape_policy {
            self.shape_policy = other.shape_policy;
        }
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DebugConfig::default();
        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
    }
}

// Default configuration template
const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
