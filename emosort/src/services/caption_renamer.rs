//! Caption renamer
//!
//! Pairs each `.lab` caption with its sibling `.wav` clip and renames the
//! clip to the trimmed caption text. A caption whose text is empty, names an
//! existing path, contains a path separator, or matches the clip's current
//! name is skipped with a diagnostic rather than counted as a rename.
//!
//! Re-running after a successful pass re-reads the untouched caption, finds
//! no clip under the original name and skips it.

use crate::error::{StageError, StageResult};
use crate::models::{ItemFailure, RenameReport};
use crate::services::file_scanner::{FileScanner, CLIP_EXTENSION};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Why a caption did not produce a rename
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameSkip {
    /// No `<stem>.wav` next to the caption
    MissingClip,
    /// Caption text is empty after trimming
    EmptyText,
    /// Caption text contains a path separator
    InvalidTarget,
    /// Caption text already names a file or directory
    ExistingPath,
    /// Caption text equals the clip's current name
    SameName,
    /// `<text>.wav` already exists next to the clip
    TargetExists,
}

/// Outcome for one caption
#[derive(Debug)]
pub enum RenameOutcome {
    Renamed { from: PathBuf, to: PathBuf },
    Skipped(RenameSkip),
}

/// Caption renamer stage
#[derive(Debug, Default)]
pub struct CaptionRenamer;

impl CaptionRenamer {
    pub fn new() -> Self {
        Self
    }

    /// Rename every captioned clip under `directory`
    pub fn run(&self, directory: &Path) -> StageResult<RenameReport> {
        if !directory.exists() {
            return Err(StageError::SourceNotFound(directory.to_path_buf()));
        }

        let captions = FileScanner::captions().scan(directory)?;
        let mut report = RenameReport {
            captions: captions.len(),
            ..Default::default()
        };

        for caption in &captions {
            match self.rename_one(caption) {
                Ok(RenameOutcome::Renamed { from, to }) => {
                    report.renamed += 1;
                    info!("Renamed {} → {}", from.display(), to.display());
                }
                Ok(RenameOutcome::Skipped(reason)) => {
                    report.skipped += 1;
                    warn!(caption = %caption.display(), reason = ?reason, "Caption skipped");
                }
                Err(e) => {
                    warn!(caption = %caption.display(), error = %e, "Rename failed");
                    report.failures.push(ItemFailure::new(caption, e));
                }
            }
        }

        info!("Caption rename complete: {}", report.display_string());
        Ok(report)
    }

    /// Process a single caption file
    pub fn rename_one(&self, caption: &Path) -> std::io::Result<RenameOutcome> {
        let clip = caption.with_extension(CLIP_EXTENSION);
        if !clip.is_file() {
            return Ok(RenameOutcome::Skipped(RenameSkip::MissingClip));
        }

        let text = std::fs::read_to_string(caption)?;
        let text = text.trim();

        if let Some(reason) = validate_target(&clip, text) {
            return Ok(RenameOutcome::Skipped(reason));
        }

        let target = clip.with_file_name(format!("{}.{}", text, CLIP_EXTENSION));
        std::fs::rename(&clip, &target)?;

        Ok(RenameOutcome::Renamed {
            from: clip,
            to: target,
        })
    }
}

/// Check the caption text as a new clip name
///
/// Relative text is resolved against the clip's folder; absolute text is
/// checked as-is.
fn validate_target(clip: &Path, text: &str) -> Option<RenameSkip> {
    if text.is_empty() {
        return Some(RenameSkip::EmptyText);
    }

    let as_path = Path::new(text);
    let folder = clip.parent().unwrap_or_else(|| Path::new(""));

    if as_path.is_absolute() {
        return Some(if as_path.exists() {
            RenameSkip::ExistingPath
        } else {
            RenameSkip::InvalidTarget
        });
    }

    if text.contains('/') || text.contains('\\') {
        return Some(RenameSkip::InvalidTarget);
    }

    let current_stem = clip.file_stem().map(|s| s.to_string_lossy());
    if current_stem.as_deref() == Some(text) {
        return Some(RenameSkip::SameName);
    }

    if folder.join(as_path).exists() {
        return Some(RenameSkip::ExistingPath);
    }

    if folder.join(format!("{}.{}", text, CLIP_EXTENSION)).exists() {
        return Some(RenameSkip::TargetExists);
    }

    None
}
