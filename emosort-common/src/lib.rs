//! # emosort common library
//!
//! Shared code for the emosort pipeline crates:
//! - Error type used by configuration and stage entry points
//! - Pipeline configuration (TOML model, defaults, discovery, validation)

pub mod config;
pub mod error;

pub use config::PipelineConfig;
pub use error::{Error, Result};
