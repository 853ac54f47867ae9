use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "clinic-store";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default per-query timeout for synchronization reads.
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;
/// Retries after the first failed read attempt.
const DEFAULT_FETCH_RETRIES: u32 = 2;
/// First backoff delay; doubles on each further retry.
const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;

/// Per-user data directory for the clinic database.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Default location of the SQLite record database.
pub fn database_path() -> PathBuf {
    app_data_dir().join("clinic.db")
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "clinic_store=info"
}

/// Tuning for `ClinicStore`.
///
/// Reads are retried with exponential backoff and bounded by a timeout.
/// Writes are never retried: re-sending an insert would duplicate the row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub fetch_timeout_ms: u64,
    pub fetch_retries: u32,
    pub retry_backoff_ms: u64,
    /// Run synchronizations one at a time instead of letting them overlap.
    pub serialize_refreshes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            fetch_retries: DEFAULT_FETCH_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            serialize_refreshes: false,
        }
    }
}

impl StoreConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_path_under_app_data() {
        let db = database_path();
        assert!(db.starts_with(app_data_dir()));
        assert!(db.ends_with("clinic.db"));
    }

    #[test]
    fn defaults_bound_reads() {
        let config = StoreConfig::default();
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.fetch_retries, 2);
        assert_eq!(config.retry_backoff(), Duration::from_millis(100));
        assert!(!config.serialize_refreshes);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = StoreConfig::from_json(r#"{"fetch_retries": 0, "serialize_refreshes": true}"#)
            .unwrap();
        assert_eq!(config.fetch_retries, 0);
        assert!(config.serialize_refreshes);
        assert_eq!(config.fetch_timeout_ms, 10_000);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
