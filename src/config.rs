use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::grades::GradeScale;
use crate::listing::DEFAULT_PAGE_SIZE;

pub const CONFIG_ENV_VAR: &str = "UNI_AGGREGATES_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Decimal places shown for GPA values.
    pub gpa_precision: u32,
    pub page_size: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            gpa_precision: 2,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub display: DisplayConfig,
    /// Letter -> GPA points overrides, e.g. `"A" = 4.0`.
    pub grade_points: BTreeMap<String, f64>,
}

/// Values given on the command line win over the config file for this run.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub page_size: Option<usize>,
}

impl AppConfig {
    pub fn from_toml(input: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(input).context("invalid configuration TOML")?;
        config.grade_scale()?;
        Ok(config)
    }

    /// Reads the file named by `path`, or by `UNI_AGGREGATES_CONFIG` when no
    /// path is given. With neither, the defaults apply.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
        };

        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                Self::from_toml(&contents)
                    .with_context(|| format!("failed to load config {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(level) = &overrides.log_level {
            self.logging.level.clone_from(level);
        }
        if let Some(page_size) = overrides.page_size {
            self.display.page_size = page_size;
        }
    }

    pub fn grade_scale(&self) -> anyhow::Result<GradeScale> {
        GradeScale::with_overrides(&self.grade_points).context("invalid [grade_points] table")
    }
}
