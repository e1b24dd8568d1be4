//! emosort library interface
//!
//! Turns a folder of speech clips into an emotion-bucketed corpus:
//! duration filtering, caption-based renaming, emotion recognition through
//! an external service, and routing into `<character>/<emotion>/` folders.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod utils;

pub use crate::error::{StageError, StageResult};
pub use emosort_common::{Error, PipelineConfig, Result};
