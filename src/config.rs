use std::{
    collections::HashMap,
    fs::{self, File},
    io::prelude::*,
    path::Path,
    time::Duration,
};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::benchmark::ReductionPolicy;

/// Top-level configuration for the application, loaded from a TOML file.
///
/// Every measurement component receives the values it needs from here at
/// construction time; nothing reads ambient process state.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SounderConfig {
    /// Directory service endpoint that returns the candidate server list.
    #[serde(default = "default_directory_url")]
    pub directory_url: String,

    /// Number of geographically close servers to latency-test.
    #[serde(default = "default_num_closest")]
    pub num_closest: usize,

    /// Latency trials per candidate server.
    #[serde(default = "default_latency_trials")]
    pub latency_trials: u32,

    /// How a benchmark's samples collapse to one figure.
    #[serde(default)]
    pub algorithm: ReductionPolicy,

    /// Run the saturation warmup before each benchmark.
    #[serde(default = "default_true")]
    pub warmup: bool,

    /// Warmup gives up after this many non-seed transfers.
    #[serde(default = "default_warmup_max_iterations")]
    pub warmup_max_iterations: u32,

    /// Warmup wall-clock budget in seconds.
    #[serde(default = "default_warmup_max_secs")]
    pub warmup_max_secs: u64,

    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-request deadline in seconds, body included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Download probe ladder, in "pixel" sizes of the random{S}x{S}.jpg
    /// resources the test servers host. Must be strictly increasing.
    #[serde(default = "default_download_sizes")]
    pub download_sizes: Vec<u32>,

    /// Upload probe ladder, payload sizes in bytes. Must be strictly
    /// increasing.
    #[serde(default = "default_upload_sizes")]
    pub upload_sizes: Vec<u64>,

    #[serde(flatten)]
    pub other_fields: HashMap<String, toml::Value>,
}

fn default_directory_url() -> String {
    "https://directory.sounder.dev/v1/servers".to_string()
}

fn default_num_closest() -> usize {
    3
}

fn default_latency_trials() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_warmup_max_iterations() -> u32 {
    20
}

fn default_warmup_max_secs() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

fn default_download_sizes() -> Vec<u32> {
    vec![350, 500, 750, 1000, 1500, 2000, 2500, 3000, 3500, 4000]
}

fn default_upload_sizes() -> Vec<u64> {
    vec![
        256 * 1024,
        512 * 1024,
        1024 * 1024,
        1536 * 1024,
        2048 * 1024,
    ]
}

impl Default for SounderConfig {
    fn default() -> Self {
        Self {
            directory_url: default_directory_url(),
            num_closest: default_num_closest(),
            latency_trials: default_latency_trials(),
            algorithm: ReductionPolicy::default(),
            warmup: true,
            warmup_max_iterations: default_warmup_max_iterations(),
            warmup_max_secs: default_warmup_max_secs(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            download_sizes: default_download_sizes(),
            upload_sizes: default_upload_sizes(),
            other_fields: HashMap::new(),
        }
    }
}

impl SounderConfig {
    pub fn load(path: &Path) -> Result<Self, SounderConfigLoadError> {
        let raw = fs::read_to_string(path).map_err(SounderConfigLoadError::Io)?;
        let config: Self = toml::from_str(&raw).map_err(SounderConfigLoadError::Parse)?;

        for field in &config.other_fields {
            warn!(
                "Unknown configuration '{}' with value {:?}",
                field.0, field.1
            );
        }

        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let config_str = toml::to_string(&self)?;
        let mut file = File::create(path)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn warmup_budget(&self) -> Duration {
        Duration::from_secs(self.warmup_max_secs)
    }

    /// A measurement run needs at least one rung per direction and a
    /// positive trial count; everything else has workable defaults.
    pub fn validate(&self) -> Result<(), String> {
        if self.latency_trials == 0 {
            return Err("latency_trials must be > 0".to_string());
        }
        if self.download_sizes.is_empty() {
            return Err("download_sizes must not be empty".to_string());
        }
        if self.upload_sizes.is_empty() {
            return Err("upload_sizes must not be empty".to_string());
        }
        if self.download_sizes.windows(2).any(|w| w[0] >= w[1]) {
            return Err("download_sizes must be strictly increasing".to_string());
        }
        if self.upload_sizes.windows(2).any(|w| w[0] >= w[1]) {
            return Err("upload_sizes must be strictly increasing".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SounderConfigLoadError {
    #[error("Could not open config")]
    Io(#[from] std::io::Error),
    #[error("Could not parse")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config: SounderConfig = toml::from_str("").unwrap();
        assert_eq!(config.num_closest, 3);
        assert_eq!(config.latency_trials, 3);
        assert_eq!(config.algorithm, ReductionPolicy::Average);
        assert!(config.warmup);
        assert_eq!(config.download_sizes.len(), 10);
        assert_eq!(config.upload_sizes[0], 256 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn policy_parses_from_config_string() {
        let config: SounderConfig = toml::from_str("algorithm = \"max\"").unwrap();
        assert_eq!(config.algorithm, ReductionPolicy::Maximum);
    }

    #[test]
    fn unknown_fields_are_collected_not_rejected() {
        let config: SounderConfig = toml::from_str("no_such_key = 5").unwrap();
        assert!(config.other_fields.contains_key("no_such_key"));
    }

    #[test]
    fn validate_rejects_degenerate_ladders() {
        let mut config = SounderConfig::default();
        config.latency_trials = 0;
        assert!(config.validate().is_err());

        let mut config = SounderConfig::default();
        config.download_sizes = vec![500, 350];
        assert!(config.validate().is_err());

        let mut config = SounderConfig::default();
        config.upload_sizes.clear();
        assert!(config.validate().is_err());
    }
}
