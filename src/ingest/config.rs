use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub global: GlobalConfig,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GlobalConfig {
    /// Inputs are resolved against this directory
    pub data_dir: PathBuf,
    /// Outputs are written under this directory
    pub output_dir: PathBuf,
    #[serde(default = "default_target_epsg")]
    pub target_epsg: u32,
    #[serde(default = "default_area_epsg")]
    pub area_epsg: u32,
}

fn default_target_epsg() -> u32 {
    4326
}

fn default_area_epsg() -> u32 {
    3857
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobConfig {
    pub name: String,
    pub input: PathBuf,
    pub country: String,
    pub output: PathBuf,
    /// Add area_km2 and centroid before writing
    #[serde(default)]
    pub calculate: bool,
    pub clip: Option<ClipConfig>,
    /// `[from, to]` column pairs carried into the output
    #[serde(default)]
    pub columns: Vec<(String, String)>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClipConfig {
    pub boundary: PathBuf,
    pub code_column: String,
    pub name_column: String,
    #[serde(default)]
    pub codes: Vec<String>,
    #[serde(default = "default_predicate")]
    pub predicate: String,
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_predicate() -> String {
    "within".to_string()
}

fn default_mode() -> String {
    "geometry".to_string()
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}
