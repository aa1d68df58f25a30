//! Regeneration of the static sitemap by an external program.
//!
//! A run counts as failed when the program exits nonzero or writes anything
//! to stderr. Failed runs leave the cache alone; successful runs drop every
//! cached sitemap rendering so the next read recomposes from the new file.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;

use super::file::StaticSitemapFile;
use crate::Error;
use crate::cache::{SITEMAP_KEYS, TtlCache};

/// What a finished regeneration run reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegenerationOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl RegenerationOutput {
    /// Describe why the run failed, or `None` if it succeeded.
    pub fn failure(&self) -> Option<String> {
        let stderr = self.stderr.trim();
        if !self.success {
            let status = match self.exit_code {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            };
            return Some(if stderr.is_empty() { status } else { format!("{status}: {stderr}") });
        }
        if !stderr.is_empty() {
            return Some(stderr.to_string());
        }
        None
    }
}

/// Runs whatever produces the static sitemap.
#[async_trait]
pub trait Regenerator: Send + Sync {
    /// Run to completion.
    ///
    /// Returns `Err` only when the run could not be started.
    async fn regenerate(&self) -> Result<RegenerationOutput, Error>;
}

/// Regenerates by spawning a program.
#[derive(Debug, Clone)]
pub struct CommandRegenerator {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl CommandRegenerator {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), current_dir: None }
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arg_list(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl Regenerator for CommandRegenerator {
    async fn regenerate(&self) -> Result<RegenerationOutput, Error> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let output = command
            .output()
            .await
            .map_err(|e| Error::RegenerationFailed(format!("failed to start {}: {e}", self.program)))?;

        Ok(RegenerationOutput {
            exit_code: output.status.code(),
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Regenerates the static sitemap and invalidates what was derived from it.
pub struct SitemapRefresher {
    regenerator: Arc<dyn Regenerator>,
    file: Arc<StaticSitemapFile>,
    cache: Arc<TtlCache>,
}

impl SitemapRefresher {
    pub fn new(regenerator: Arc<dyn Regenerator>, file: Arc<StaticSitemapFile>, cache: Arc<TtlCache>) -> Self {
        Self { regenerator, file, cache }
    }

    /// Run the regenerator and wait for it.
    ///
    /// Holds the static file lock for the whole run so edits cannot
    /// interleave with the rewrite. There is no retry and no cancellation.
    ///
    /// # Errors
    ///
    /// `Error::RegenerationFailed` carrying the diagnostic text; the cache is
    /// left as it was.
    pub async fn refresh(&self) -> Result<(), Error> {
        let _guard = self.file.lock().await;
        let started = Instant::now();
        tracing::info!(path = %self.file.path().display(), "regenerating static sitemap");

        let output = match self.regenerator.regenerate().await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!(error = %e, "sitemap regeneration could not start");
                return Err(e);
            }
        };

        if let Some(diagnostic) = output.failure() {
            tracing::error!(exit_code = ?output.exit_code, %diagnostic, "sitemap regeneration failed");
            return Err(Error::RegenerationFailed(diagnostic));
        }

        self.cache.invalidate(SITEMAP_KEYS);

        tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "static sitemap regenerated");
        Ok(())
    }
}
