use stampede_core::ConfigError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Unable to read config file `{path}`: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("Invalid config file `{path}`: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    LoadTest(#[from] stampede::Error),

    #[error("Unable to write summary to `{path}`: {source}")]
    Report { path: PathBuf, source: io::Error },

    #[error("Unable to encode summary: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Unable to install prometheus exporter: {0}")]
    Prometheus(String),
}
