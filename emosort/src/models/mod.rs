//! Data models shared by the pipeline stages

pub mod recognition;
pub mod report;

pub use recognition::{primary_label, top_label, LabelScore, RecognitionRecord, UNKNOWN_CHARACTER};
pub use report::{FilterReport, ItemFailure, RecognitionReport, RenameReport, RouteReport};
