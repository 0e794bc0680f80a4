use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::CoreError;

pub const DEFAULT_QUOTE_URL: &str = "http://fundgz.1234567.com.cn/js/{fund_code}.js?rt={timestamp}";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/121.0.0.0 Safari/537.36";

/// Runtime configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// Quote endpoint; `{fund_code}` and `{timestamp}` are substituted per request.
    pub quote_url_template: String,

    /// User agent sent to the quote source
    pub user_agent: String,

    /// Hard timeout for a single outbound quote request
    pub request_timeout_secs: u64,

    /// Upper bound on concurrent outbound quote requests
    pub max_concurrent_fetches: usize,

    /// Local wall-clock time of the daily snapshot sweep
    pub sweep_time: NaiveTime,

    /// Where the ledger is persisted. `None` keeps everything in memory.
    pub ledger_path: Option<PathBuf>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            quote_url_template: DEFAULT_QUOTE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_secs: 10,
            max_concurrent_fetches: 4,
            sweep_time: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
            ledger_path: None,
        }
    }
}

impl TrackerSettings {
    /// Parse settings from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let settings: TrackerSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse a JSON settings file.
    pub fn load_from_file(path: &str) -> Result<Self, CoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.quote_url_template.contains("{fund_code}") {
            return Err(CoreError::ValidationError(
                "quote_url_template must contain a {fund_code} placeholder".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(CoreError::ValidationError(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(CoreError::ValidationError(
                "max_concurrent_fetches must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
