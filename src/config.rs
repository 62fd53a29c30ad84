//! Project configuration (`stabcheck.toml`).
//!
//! Every key is optional. Relative paths are resolved against the
//! directory holding the config file.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::diagnostics::DEFAULT_MAX_SHOWN;
use crate::engine::SearchConfig;

/// Name of the configuration file
pub const CONFIG_FILE: &str = "stabcheck.toml";

/// Default lattice declaration file
pub const DEFAULT_LATTICE: &str = "lattice.toml";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Lattice declaration file
    pub lattice: PathBuf,

    /// Module files or directories to scan
    pub modules: Vec<PathBuf>,

    /// Traversal settings
    pub search: SearchConfig,

    pub run: RunConfig,

    pub report: ReportConfig,
}

/// Batch execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Concurrent classifications
    pub jobs: usize,

    /// Deadline per inference call in milliseconds; 0 disables it
    pub inference_timeout_ms: u64,
}

/// Report output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Prefix of the CSV report files
    pub label: String,

    /// Directory the CSV reports are written to
    pub output_dir: PathBuf,

    /// Failing instantiations listed per unstable method
    pub max_shown: usize,

    /// Write CSV reports after each check
    pub csv: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lattice: PathBuf::from(DEFAULT_LATTICE),
            modules: vec![PathBuf::from("modules")],
            search: SearchConfig::default(),
            run: RunConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            jobs: 1,
            inference_timeout_ms: 5000,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            label: "stabcheck".to_string(),
            output_dir: PathBuf::from("."),
            max_shown: DEFAULT_MAX_SHOWN,
            csv: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    #[diagnostic(code(stabcheck::config::io))]
    Io { path: String, message: String },

    #[error("failed to parse config {path}: {message}")]
    #[diagnostic(code(stabcheck::config::parse))]
    Parse { path: String, message: String },

    #[error("invalid config: {0}")]
    #[diagnostic(code(stabcheck::config::invalid))]
    Invalid(String),
}

impl Config {
    /// Load a config file; relative paths are resolved against its directory
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.resolve_relative_to(base))
    }

    /// Parse config text; paths are left as written
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<input>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Search for `stabcheck.toml` upward from `start`
    pub fn find(start: &Path) -> Option<PathBuf> {
        let mut dir = if start.is_file() {
            start.parent().unwrap_or(start).to_path_buf()
        } else {
            start.to_path_buf()
        };
        loop {
            let candidate = dir.join(CONFIG_FILE);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Load the nearest config above `start`, or the defaults
    pub fn discover(start: &Path) -> Result<Self, ConfigError> {
        match Self::find(start) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.search.fuel == 0 {
            return Err(ConfigError::Invalid("search.fuel must be at least 1".to_string()));
        }
        if self.search.max_lattice_steps == 0 {
            return Err(ConfigError::Invalid(
                "search.max_lattice_steps must be at least 1".to_string(),
            ));
        }
        if self.report.label.is_empty() {
            return Err(ConfigError::Invalid("report.label must not be empty".to_string()));
        }
        if self.report.label.contains(['/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "report.label `{}` must not contain path separators",
                self.report.label
            )));
        }
        Ok(())
    }

    fn resolve_relative_to(mut self, base: &Path) -> Self {
        let resolve = |p: &PathBuf| {
            if p.is_absolute() {
                p.clone()
            } else {
                base.join(p)
            }
        };
        self.lattice = resolve(&self.lattice);
        self.modules = self.modules.iter().map(resolve).collect();
        self.report.output_dir = resolve(&self.report.output_dir);
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
