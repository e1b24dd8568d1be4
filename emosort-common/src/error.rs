//! Error types shared by the emosort crates

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Named config file missing or unreadable
    #[error("Cannot read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parsed but out of range
    #[error("Invalid configuration: {0}")]
    Config(String),
}
