//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SITEKEEP_*)
//! 2. TOML config file (if SITEKEEP_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::sitemap::CommandRegenerator;

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SITEKEEP_*)
/// 2. TOML config file (if SITEKEEP_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite database holding sitemap entries.
    ///
    /// Set via SITEKEEP_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Path to the generated static sitemap document.
    ///
    /// Set via SITEKEEP_SITEMAP_PATH environment variable.
    #[serde(default = "default_sitemap_path")]
    pub sitemap_path: PathBuf,

    /// Program that regenerates the static sitemap.
    ///
    /// Set via SITEKEEP_REGENERATE_PROGRAM environment variable.
    #[serde(default = "default_regenerate_program")]
    pub regenerate_program: String,

    /// Arguments passed to the regeneration program.
    ///
    /// Set via SITEKEEP_REGENERATE_ARGS environment variable.
    #[serde(default = "default_regenerate_args")]
    pub regenerate_args: Vec<String>,

    /// Working directory for the regeneration program.
    ///
    /// Set via SITEKEEP_REGENERATE_DIR environment variable.
    /// Defaults to the server's working directory.
    #[serde(default)]
    pub regenerate_dir: Option<PathBuf>,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./sitekeep.sqlite")
}

fn default_sitemap_path() -> PathBuf {
    PathBuf::from("./public/sitemap.xml")
}

fn default_regenerate_program() -> String {
    "npx".into()
}

fn default_regenerate_args() -> Vec<String> {
    vec!["next-sitemap".into()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            sitemap_path: default_sitemap_path(),
            regenerate_program: default_regenerate_program(),
            regenerate_args: default_regenerate_args(),
            regenerate_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SITEKEEP_`
    /// 2. TOML file from `SITEKEEP_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SITEKEEP_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SITEKEEP_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Build the process collaborator that regenerates the static sitemap.
    pub fn regenerator(&self) -> CommandRegenerator {
        let mut regenerator = CommandRegenerator::new(&self.regenerate_program).args(self.regenerate_args.clone());
        if let Some(dir) = &self.regenerate_dir {
            regenerator = regenerator.current_dir(dir);
        }
        regenerator
    }
}
