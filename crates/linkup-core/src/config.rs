use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::constants::{PAGE_INCREMENT, STORAGE_BUCKET};

/// Backoff applied when a realtime channel drops and has to be resubscribed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: u32,
    /// Give up after this many failed resubscribes (None = keep trying)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            multiplier: 2,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub page_increment: usize,
    pub fetch_timeout_secs: u64,
    pub mutation_timeout_secs: u64,
    pub reconnect: ReconnectConfig,
    /// Project URL used to build public links for stored files
    pub storage_public_url: String,
    pub storage_bucket: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            page_increment: PAGE_INCREMENT,
            fetch_timeout_secs: 10,
            mutation_timeout_secs: 5,
            reconnect: ReconnectConfig::default(),
            storage_public_url: String::new(),
            storage_bucket: STORAGE_BUCKET.to_string(),
        }
    }
}

impl CoreConfig {
    /// Read a JSON config file. Keys missing from the file keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn mutation_timeout(&self) -> Duration {
        Duration::from_secs(self.mutation_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.page_increment, 4);
        assert_eq!(config.storage_bucket, "uploads");
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.reconnect.max_attempts, None);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"page_increment": 10, "reconnect": {{"max_attempts": 3}}}}"#
        )
        .unwrap();

        let config = CoreConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.page_increment, 10);
        assert_eq!(config.reconnect.max_attempts, Some(3));
        assert_eq!(config.reconnect.initial_backoff_ms, 500);
        assert_eq!(config.mutation_timeout_secs, 5);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = CoreConfig::load_from_file(dir.path().join("missing.json"));
        assert!(result.is_err());
    }
}
