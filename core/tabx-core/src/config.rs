//! Table configuration
//!
//! [`TableOptions`] carries the tunables shared by every table: export paging
//! and JSON formatting. Values can be overridden through environment
//! variables (`TABX_EXPORT_PAGE_SIZE`, `TABX_JSON_PRETTY`).

use crate::error::{TabxError, TabxResult};
use serde::{Deserialize, Serialize};
use std::env;

/// Default number of primary-key entries read per store scan during export.
pub const DEFAULT_EXPORT_PAGE_SIZE: usize = 256;

/// Per-table options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Entries fetched per scan while streaming an export.
    pub export_page_size: usize,
    /// Pretty-print each exported record.
    pub json_pretty: bool,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            export_page_size: DEFAULT_EXPORT_PAGE_SIZE,
            json_pretty: false,
        }
    }
}

impl TableOptions {
    /// Environment variable overriding [`TableOptions::export_page_size`].
    pub const ENV_EXPORT_PAGE_SIZE: &'static str = "TABX_EXPORT_PAGE_SIZE";
    /// Environment variable overriding [`TableOptions::json_pretty`].
    pub const ENV_JSON_PRETTY: &'static str = "TABX_JSON_PRETTY";

    /// Defaults with environment overrides applied.
    pub fn from_env() -> TabxResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of `self`.
    pub fn with_env_overrides(mut self) -> TabxResult<Self> {
        if let Ok(raw) = env::var(Self::ENV_EXPORT_PAGE_SIZE) {
            self.export_page_size = raw.trim().parse().map_err(|_| {
                TabxError::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    Self::ENV_EXPORT_PAGE_SIZE,
                    raw
                ))
            })?;
        }
        if let Ok(raw) = env::var(Self::ENV_JSON_PRETTY) {
            self.json_pretty = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(TabxError::Config(format!(
                        "{} must be a boolean, got '{}'",
                        Self::ENV_JSON_PRETTY,
                        raw
                    )));
                }
            };
        }
        self.validate()?;
        Ok(self)
    }

    /// Set the export page size.
    pub fn with_export_page_size(mut self, page_size: usize) -> Self {
        self.export_page_size = page_size;
        self
    }

    /// Enable or disable pretty-printed export.
    pub fn with_json_pretty(mut self, pretty: bool) -> Self {
        self.json_pretty = pretty;
        self
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> TabxResult<()> {
        if self.export_page_size == 0 {
            return Err(TabxError::Config(
                "export_page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
