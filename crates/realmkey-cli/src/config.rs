//! CLI configuration, parsed from TOML file + environment variable overrides.
//!
//! Priority: command-line flags > environment variables > config file > defaults.
//! Flags are applied by `main` after [`CliConfig::apply_env_overrides`].

use anyhow::{Context, Result};
use realmkey_core::PasswordSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub general: GeneralSection,

    /// Default password policy for `-t pass`
    #[serde(default)]
    pub password: PasswordSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralSection {
    /// Log level (off, error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Encrypted seed file used when `-s` is not given
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            seed_file: None,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl CliConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `REALMKEY_SEED_FILE`
    /// - `REALMKEY_LOG_LEVEL`
    ///
    /// `REALMKEY_MASTER` is read by `main` and never stored here.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("REALMKEY_SEED_FILE") {
            if !v.is_empty() {
                self.general.seed_file = Some(PathBuf::from(v));
            }
        }
        if let Some(v) = var("REALMKEY_LOG_LEVEL") {
            self.general.log_level = v;
        }
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            LOG_LEVELS.contains(&self.general.log_level.to_ascii_lowercase().as_str()),
            "general.log_level must be one of {}",
            LOG_LEVELS.join(", ")
        );

        self.password
            .validate()
            .context("Invalid [password] section")?;

        Ok(())
    }
}
