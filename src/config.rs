//! Configuration schema and loader for the quotation server and CLI.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::quotation::SheetLayout;
use crate::retry::{Backoff, RetryPolicy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Workbook file backing every project worksheet.
    #[serde(default = "default_workbook_path")]
    pub workbook_path: PathBuf,

    #[serde(default)]
    pub sheet: SheetConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            workbook_path: default_workbook_path(),
            sheet: SheetConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Last row of the table window read and cleared on save.
    #[serde(default = "default_max_rows")]
    pub max_rows: u32,

    #[serde(default = "default_new_sheet_rows")]
    pub new_sheet_rows: u32,

    #[serde(default = "default_new_sheet_cols")]
    pub new_sheet_cols: u32,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            new_sheet_rows: default_new_sheet_rows(),
            new_sheet_cols: default_new_sheet_cols(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    None,
    Fixed,
    Linear,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per store call, first try included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff")]
    pub backoff: BackoffKind,

    /// Base delay between attempts in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}
fn default_workbook_path() -> PathBuf {
    PathBuf::from("quotations.bin.gz")
}
fn default_max_rows() -> u32 {
    100
}
fn default_new_sheet_rows() -> u32 {
    100
}
fn default_new_sheet_cols() -> u32 {
    20
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff() -> BackoffKind {
    BackoffKind::Fixed
}
fn default_delay_ms() -> u64 {
    2000
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sheet.max_rows < 2 {
            return Err(ConfigError::Invalid(
                "sheet.max_rows must leave room for a header and one row".into(),
            ));
        }
        if self.sheet.new_sheet_cols < 10 {
            return Err(ConfigError::Invalid(format!(
                "sheet.new_sheet_cols ({}) must reach column J for the terms",
                self.sheet.new_sheet_cols
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be > 0".into()));
        }
        Ok(())
    }

    pub fn layout(&self) -> SheetLayout {
        SheetLayout {
            max_rows: self.sheet.max_rows,
            new_sheet_rows: self.sheet.new_sheet_rows,
            new_sheet_cols: self.sheet.new_sheet_cols,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.retry.delay_ms);
        let backoff = match self.retry.backoff {
            BackoffKind::None => Backoff::None,
            BackoffKind::Fixed => Backoff::Fixed(delay),
            BackoffKind::Linear => Backoff::Linear(delay),
        };
        RetryPolicy::new(self.retry.max_attempts, backoff)
    }
}

/// Load an `AppConfig` from a JSON file path.
pub fn load_from_file(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Load an `AppConfig` from a JSON string.
pub fn load_from_str(json: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}
