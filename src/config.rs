use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_ALLOWED_STATUS: &str = "200,204,301,302,307,308";

/// Pipeline configuration, usually loaded from `config.yaml`.
///
/// Every field has a default so partial files (or no file at all) are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output root; each target gets `<outputs>/<target>/`.
    pub outputs: PathBuf,
    pub threads: usize,
    pub wordlist: Option<PathBuf>,
    pub steps: StepToggles,
    pub naabu: NaabuConfig,
    pub katana: KatanaConfig,
    pub gau: GauConfig,
    pub ffuf: FfufConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            outputs: PathBuf::from("out"),
            threads: 80,
            wordlist: None,
            steps: StepToggles::default(),
            naabu: NaabuConfig::default(),
            katana: KatanaConfig::default(),
            gau: GauConfig::default(),
            ffuf: FfufConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StepToggles {
    pub subfinder: bool,
    pub amass: bool,
    pub naabu: bool,
    pub katana: bool,
    pub gau: bool,
    pub ffuf: bool,
}

impl Default for StepToggles {
    fn default() -> Self {
        Self { subfinder: true, amass: true, naabu: true, katana: true, gau: true, ffuf: true }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NaabuConfig {
    pub top_ports: u32,
    pub rate: u32,
    pub retries: u32,
    /// Per-probe timeout in milliseconds.
    pub timeout: u64,
}

impl Default for NaabuConfig {
    fn default() -> Self {
        Self { top_ports: 1000, rate: 12000, retries: 1, timeout: 1200 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KatanaConfig {
    pub depth: u32,
}

impl Default for KatanaConfig {
    fn default() -> Self {
        Self { depth: 2 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GauConfig {
    pub max_workers: usize,
    /// Seconds allowed for one base domain.
    pub timeout: u64,
}

impl Default for GauConfig {
    fn default() -> Self {
        Self { max_workers: 8, timeout: 180 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FfufConfig {
    pub threads: usize,
    pub extensions: String,
    pub allowed_status: String,
    pub max_workers: usize,
    /// Global wall-clock budget for the whole fan-out, in seconds. 0 disables it.
    pub maxtime: u64,
    /// Per-host budget in seconds, handed to ffuf as `-maxtime-job`.
    pub maxtime_job: u64,
}

impl Default for FfufConfig {
    fn default() -> Self {
        Self {
            threads: 20,
            extensions: String::new(),
            allowed_status: DEFAULT_ALLOWED_STATUS.to_string(),
            max_workers: 6,
            maxtime: 300,
            maxtime_job: 60,
        }
    }
}

impl FfufConfig {
    /// Parsed `allowed_status`; entries that are not status codes are dropped.
    pub fn allowed_codes(&self) -> BTreeSet<u16> {
        self.allowed_status
            .split(',')
            .filter_map(|s| s.trim().parse::<u16>().ok())
            .collect()
    }

    pub fn global_budget(&self) -> Option<Duration> {
        (self.maxtime > 0).then(|| Duration::from_secs(self.maxtime))
    }

    pub fn extensions(&self) -> Option<&str> {
        let ext = self.extensions.trim();
        (!ext.is_empty()).then_some(ext)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit; treat it as "all defaults".
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 {
            return Err(ConfigError::invalid("threads", "must be at least 1"));
        }
        if self.gau.max_workers == 0 {
            return Err(ConfigError::invalid("gau.max_workers", "must be at least 1"));
        }
        if self.steps.ffuf {
            if self.ffuf.max_workers == 0 {
                return Err(ConfigError::invalid("ffuf.max_workers", "must be at least 1"));
            }
            if self.ffuf.allowed_codes().is_empty() {
                return Err(ConfigError::invalid(
                    "ffuf.allowed_status",
                    format!("no valid status codes in {:?}", self.ffuf.allowed_status),
                ));
            }
            if self.wordlist.is_none() {
                return Err(ConfigError::invalid("wordlist", "required when the ffuf step is enabled"));
            }
        }
        Ok(())
    }
}
