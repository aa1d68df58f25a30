//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `db_path` or `sitemap_path` is empty,
    /// and `ConfigError::Missing` if no regeneration program is configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "db_path".into(), reason: "must not be empty".into() });
        }

        if self.sitemap_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "sitemap_path".into(), reason: "must not be empty".into() });
        }

        if self.regenerate_program.trim().is_empty() {
            return Err(ConfigError::Missing {
                field: "regenerate_program".into(),
                hint: "Set SITEKEEP_REGENERATE_PROGRAM environment variable".into(),
            });
        }

        if self.sitemap_path.extension().is_none_or(|ext| ext != "xml") {
            tracing::warn!(
                path = %self.sitemap_path.display(),
                "sitemap_path does not end in .xml; search engines may ignore it"
            );
        }

        Ok(())
    }
}
