use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::audio::analysis::DEFAULT_SEGMENT_SIZE;
use crate::mastering::error::{MasteringError, Result};
use crate::mastering::profile::{ProfileConfig, DEFAULT_PROFILE};
use crate::mastering::stage::ExplicitSettings;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub settings: ExplicitSettings,
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default = "default_steps")]
    pub steps: Vec<String>,
    #[serde(default = "default_automastering")]
    pub automastering: bool,
    #[serde(default = "default_profile")]
    pub profile: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    #[serde(default = "default_segment_size")]
    pub segment_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            automastering: default_automastering(),
            profile: default_profile(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            segment_size: default_segment_size(),
        }
    }
}

pub fn default_steps() -> Vec<String> {
    vec!["normalization".into(), "equalization".into()]
}
fn default_automastering() -> bool { true }
fn default_profile() -> String { DEFAULT_PROFILE.into() }
fn default_segment_size() -> usize { DEFAULT_SEGMENT_SIZE }

/// Explicit path, else `automaster.toml` in the working directory, else the
/// user config directory.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("automaster.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("automaster").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("automaster").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
        .map_err(|e| MasteringError::Configuration(format!("{}: {}", path.display(), e)))
}

fn parse_config(content: &str) -> std::result::Result<Config, toml::de::Error> {
    toml::from_str(content)
}
