use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::model::config::LarchConfig;

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "larch.toml";

/// Error type for config I/O
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Read the config at `path`, or `larch.toml` in the working directory.
/// A missing file yields the defaults.
pub fn read_config(path: Option<&Path>) -> Result<LarchConfig, ConfigError> {
    let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(LarchConfig::default());
        }
        Err(e) => return Err(ConfigError::ReadError { path, source: e }),
    };
    parse_config(&text).map_err(|source| ConfigError::ParseError { path, source })
}

pub fn parse_config(text: &str) -> Result<LarchConfig, toml::de::Error> {
    toml::from_str(text)
}
