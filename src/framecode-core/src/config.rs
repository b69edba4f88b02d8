//! TOML configuration with named profiles
//!
//! ```toml
//! [export]
//! suffix = "fcd"
//! raw_dir = "exports/raw"
//!
//! [[analysis.computations]]
//! statistic = "event_count"
//!
//! [profiles.quick.export]
//! write_raw = false
//! ```

use anyhow::{Context, Result};
use framecode_analysis::AnalysisSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub export: ExportConfig,

    /// Derived channels and statistics used when no spec file is given
    #[serde(default)]
    pub analysis: AnalysisSpec,

    /// Named profiles that can override base config
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Extension of data files picked up when scanning a directory
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Write a raw CSV per file
    #[serde(default = "default_true")]
    pub write_raw: bool,

    /// Where raw CSVs go; next to each data file when unset
    pub raw_dir: Option<PathBuf>,

    /// Summary CSV path; a timestamped name in the working directory when unset
    pub stats_file: Option<PathBuf>,
}

/// Profile for overriding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub export: Option<ExportConfig>,
    pub analysis: Option<AnalysisSpec>,
}

fn default_suffix() -> String {
    "fcd".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            write_raw: true,
            raw_dir: None,
            stats_file: None,
        }
    }
}

/// `<config dir>/framecode/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("framecode").join("config.toml"))
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config TOML")?;
        config
            .analysis
            .validate()
            .context("Invalid [analysis] section")?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    /// An explicit path must exist; the default location is optional
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => {
                debug!("loading config from {:?}", path);
                Self::from_file(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Apply a named profile, merging settings
    ///
    /// Profile settings override base configuration values.
    pub fn apply_profile(mut self, profile_name: &str) -> Result<Self> {
        let profile = self
            .profiles
            .get(profile_name)
            .with_context(|| format!("Profile '{}' not found", profile_name))?
            .clone();

        if let Some(export) = profile.export {
            self.export = export;
        }
        if let Some(analysis) = profile.analysis {
            analysis
                .validate()
                .with_context(|| format!("Invalid analysis in profile '{}'", profile_name))?;
            self.analysis = analysis;
        }

        Ok(self)
    }
}

/// Read a batch spec file; `.toml` files are TOML, anything else YAML
pub fn load_analysis_spec(path: &Path) -> Result<AnalysisSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read spec file {:?}", path))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    if is_toml {
        let spec: AnalysisSpec =
            toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;
        spec.validate()
            .with_context(|| format!("Invalid spec in {:?}", path))?;
        Ok(spec)
    } else {
        AnalysisSpec::from_yaml_str(&content).with_context(|| format!("Invalid spec in {:?}", path))
    }
}
