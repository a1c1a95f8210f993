use std::path::PathBuf;

use thiserror::Error;

/// Raised before any stage runs when the environment cannot support a pipeline run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrereqError {
    #[error("missing binaries: {}", .0.join(", "))]
    MissingBinaries(Vec<String>),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid { field, reason: reason.into() }
    }
}
