//! Configuration system for coastveg runs.
//!
//! Supports YAML configuration files with sensible defaults.

use crate::drivers::Driver;
use crate::error::{ModelError, Problems, Result};
use crate::io::YEAR_PLACEHOLDER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub inputs: InputConfig,
    pub drivers: DriverConfig,
    #[serde(default)]
    pub morphology: MorphologyConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulated period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Year of the initial conditions; the first simulated year is the next one
    pub start_year: i32,
    /// Last simulated year (inclusive)
    pub end_year: i32,
}

/// Static input files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// CellID raster followed by the initial coverage table
    pub initial_conditions: PathBuf,
    /// YAML species table
    pub species_table: PathBuf,
    /// Planting records, one per line
    #[serde(default)]
    pub plantings: Option<PathBuf>,
}

/// Driver grids: a multi-grid file, or a template containing `<YEAR>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    pub wave_amplitude: String,
    pub mean_salinity: String,
    pub summer_depth: String,
    pub summer_salinity: String,
    pub summer_temperature: String,
    pub height_above_water: String,
    pub barrier_island_height: String,
    pub barrier_island_condition: String,
    pub tree_condition: String,
    pub acute_salinity_stress: String,
    /// Land percentage targets, read on morphology years only
    #[serde(default)]
    pub land_water: Option<String>,
}

/// A single year or an inclusive `a:b` range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum YearSpec {
    Year(i32),
    Range(String),
}

/// Land/water reconciliation schedule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MorphologyConfig {
    #[serde(default)]
    pub years: Vec<YearSpec>,
}

/// Snapshot output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Path template containing `<YEAR>`
    pub template: String,
    /// Zero-padded width of the year in file names (driver templates too)
    pub year_width: usize,
    #[serde(default)]
    pub years: Vec<YearSpec>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Years between summary log lines
    pub summary_interval: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            inputs: InputConfig::default(),
            drivers: DriverConfig::default(),
            morphology: MorphologyConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_year: 2018,
            end_year: 2068,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            initial_conditions: PathBuf::from("inputs/initial_conditions.asc"),
            species_table: PathBuf::from("inputs/species.yaml"),
            plantings: None,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        let path = |name: &str| format!("drivers/{}.asc", name);
        Self {
            wave_amplitude: path("wave_amplitude"),
            mean_salinity: path("mean_salinity"),
            summer_depth: path("summer_depth"),
            summer_salinity: path("summer_salinity"),
            summer_temperature: path("summer_temperature"),
            height_above_water: path("height_above_water"),
            barrier_island_height: path("barrier_island_height"),
            barrier_island_condition: path("barrier_island_condition"),
            tree_condition: path("tree_condition"),
            acute_salinity_stress: path("acute_salinity_stress"),
            land_water: Some(format!("drivers/land_water_{}.asc", YEAR_PLACEHOLDER)),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            template: format!("output/veg_{}.asc", YEAR_PLACEHOLDER),
            year_width: 2,
            years: vec![YearSpec::Range("2018:2068".to_string())],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            summary_interval: 1,
        }
    }
}

impl DriverConfig {
    pub fn path(&self, driver: Driver) -> &str {
        match driver {
            Driver::WaveAmplitude => &self.wave_amplitude,
            Driver::MeanSalinity => &self.mean_salinity,
            Driver::SummerDepth => &self.summer_depth,
            Driver::SummerSalinity => &self.summer_salinity,
            Driver::SummerTemperature => &self.summer_temperature,
            Driver::HeightAboveWater => &self.height_above_water,
            Driver::BarrierIslandHeight => &self.barrier_island_height,
            Driver::BarrierIslandCondition => &self.barrier_island_condition,
            Driver::TreeCondition => &self.tree_condition,
            Driver::AcuteSalinityStress => &self.acute_salinity_stress,
        }
    }
}

fn parse_year(text: &str) -> std::result::Result<i32, String> {
    text.trim()
        .parse::<i32>()
        .map_err(|_| format!("'{}' is not a year", text.trim()))
}

/// Expand year specs into a sorted, deduplicated list.
pub fn expand_years(specs: &[YearSpec]) -> std::result::Result<Vec<i32>, String> {
    let mut years = Vec::new();
    for spec in specs {
        match spec {
            YearSpec::Year(year) => years.push(*year),
            YearSpec::Range(text) => match text.split_once(':') {
                Some((a, b)) => {
                    let (first, last) = (parse_year(a)?, parse_year(b)?);
                    if last < first {
                        return Err(format!("year range '{}' runs backwards", text));
                    }
                    years.extend(first..=last);
                }
                None => years.push(parse_year(text)?),
            },
        }
    }
    years.sort_unstable();
    years.dedup();
    Ok(years)
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
        let config: Config = serde_yaml::from_str(&contents).map_err(|e| ModelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).map_err(|e| ModelError::Config(e.to_string()))?;
        std::fs::write(path, yaml).map_err(|e| ModelError::io(path, e))?;
        Ok(())
    }

    /// Years simulated after the initial state.
    pub fn simulated_years(&self) -> Vec<i32> {
        (self.simulation.start_year + 1..=self.simulation.end_year).collect()
    }

    pub fn output_years(&self) -> Result<Vec<i32>> {
        expand_years(&self.output.years).map_err(|e| ModelError::Config(format!("output.years: {}", e)))
    }

    pub fn morphology_years(&self) -> Result<Vec<i32>> {
        expand_years(&self.morphology.years).map_err(|e| ModelError::Config(format!("morphology.years: {}", e)))
    }

    /// Validate configuration values, reporting every problem at once
    pub fn validate(&self) -> Result<()> {
        let mut problems = Problems::new();
        let (start, end) = (self.simulation.start_year, self.simulation.end_year);

        if end <= start {
            problems.push(format!("end_year {} must be after start_year {}", end, start));
        }
        if !self.output.template.contains(YEAR_PLACEHOLDER) {
            problems.push(format!("output.template must contain {}", YEAR_PLACEHOLDER));
        }
        if self.output.year_width == 0 || self.output.year_width > 4 {
            problems.push("output.year_width must be between 1 and 4");
        }

        match expand_years(&self.output.years) {
            Ok(years) => {
                for year in years.iter().filter(|&&y| y < start || y > end) {
                    problems.push(format!("output year {} outside {}..={}", year, start, end));
                }
            }
            Err(e) => problems.push(format!("output.years: {}", e)),
        }
        match expand_years(&self.morphology.years) {
            Ok(years) => {
                for year in years.iter().filter(|&&y| y <= start || y > end) {
                    problems.push(format!("morphology year {} outside {}..={}", year, start + 1, end));
                }
                if !years.is_empty() && self.drivers.land_water.is_none() {
                    problems.push("morphology years are set but drivers.land_water is missing");
                }
            }
            Err(e) => problems.push(format!("morphology.years: {}", e)),
        }

        if !matches!(
            self.logging.log_level.as_str(),
            "error" | "warn" | "info" | "debug" | "trace" | "off"
        ) {
            problems.push(format!("unknown log_level '{}'", self.logging.log_level));
        }
        if self.logging.summary_interval == 0 {
            problems.push("logging.summary_interval must be > 0");
        }

        problems.finish(())
    }
}
