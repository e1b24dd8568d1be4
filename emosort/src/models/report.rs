//! Per-stage batch reports
//!
//! Every stage returns one of these instead of failing on the first bad clip.
//! Failures carry their cause; policy skips are counted separately.

use serde::Serialize;
use std::path::PathBuf;

/// One item that failed and was dropped from the stage output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl ItemFailure {
    pub fn new(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// **Duration filter** summary
///
/// Display: "N evaluated, K kept (P already present), D discarded, F failed → <root>"
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterReport {
    /// Clips found under the source root
    pub evaluated: usize,
    /// Clips accepted (copied, or left in place when filtering is disabled)
    pub kept: usize,
    /// Kept clips whose copy from an earlier run was already in place
    pub already_present: usize,
    /// Clips outside the duration interval
    pub discarded: usize,
    /// Rejected source files actually deleted
    pub deleted: usize,
    /// Probe/copy/delete/caption-copy failures
    pub failures: Vec<ItemFailure>,
    /// Root holding the accepted clips
    pub destination_root: PathBuf,
}

impl FilterReport {
    pub fn display_string(&self) -> String {
        format!(
            "{} evaluated, {} kept ({} already present), {} discarded, {} failed → {}",
            self.evaluated,
            self.kept,
            self.already_present,
            self.discarded,
            self.failures.len(),
            self.destination_root.display()
        )
    }
}

/// **Caption renamer** summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenameReport {
    /// Caption files found
    pub captions: usize,
    /// Clips renamed
    pub renamed: usize,
    /// Captions skipped by policy (missing clip, empty text, invalid target)
    pub skipped: usize,
    /// Filesystem rename failures
    pub failures: Vec<ItemFailure>,
}

impl RenameReport {
    pub fn display_string(&self) -> String {
        format!(
            "{} renamed, {} skipped, {} failed (of {} captions)",
            self.renamed,
            self.skipped,
            self.failures.len(),
            self.captions
        )
    }
}

/// **Inference orchestrator** summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecognitionReport {
    /// Clips enumerated
    pub total_clips: usize,
    /// Ledger rows written
    pub recognized: usize,
    /// Decode or inference failures (no row written)
    pub failures: Vec<ItemFailure>,
    /// Whether the TextEmotion column was merged
    pub text_emotion_applied: bool,
    /// Rows whose text classification failed (empty TextEmotion)
    pub text_failures: usize,
    /// Finalized ledger path
    pub ledger_path: PathBuf,
}

impl RecognitionReport {
    pub fn display_string(&self) -> String {
        format!(
            "{} of {} clips recognized, {} failed → {}",
            self.recognized,
            self.total_clips,
            self.failures.len(),
            self.ledger_path.display()
        )
    }
}

/// **Emotion router** summary
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteReport {
    /// Ledger rows read
    pub total_rows: usize,
    /// Clips copied into a bucket
    pub copied: usize,
    /// Source clip no longer on disk
    pub skipped_missing: usize,
    /// Audio/text emotion disagreement
    pub skipped_mismatch: usize,
    /// Destination already present
    pub skipped_existing: usize,
    /// Copy failures
    pub failures: Vec<ItemFailure>,
}

impl RouteReport {
    pub fn display_string(&self) -> String {
        format!(
            "{} copied, {} already present, {} mismatched, {} missing, {} failed (of {} rows)",
            self.copied,
            self.skipped_existing,
            self.skipped_mismatch,
            self.skipped_missing,
            self.failures.len(),
            self.total_rows
        )
    }
}
