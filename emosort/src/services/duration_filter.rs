//! Duration filter
//!
//! Walks a source tree, probes each clip and copies the ones whose duration
//! lies in a closed interval into the destination tree. Rejected clips are
//! left alone or deleted according to [`DiscardPolicy`].
//!
//! # Destination layout
//! - With a destination root: `<dest>/<path relative to source>`; the
//!   clip's `.lab` caption travels with it
//! - Without one: a sibling `filtered_<name>` next to the source clip
//! - When the source root has more than `nest_threshold` immediate children,
//!   the destination root gains an extra level named after the source root,
//!   so several character folders can be filtered into one tree.

use crate::error::{StageError, StageResult};
use crate::models::{FilterReport, ItemFailure};
use crate::services::file_scanner::{FileScanner, CAPTION_EXTENSION, CLIP_EXTENSION};
use crate::utils::audio_decoder::probe_duration;
use emosort_common::config::{DiscardPolicy, FilterConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prefix of sibling outputs when no destination root is given
pub const FILTERED_PREFIX: &str = "filtered_";

/// Closed duration interval in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationRange {
    pub min: f64,
    pub max: f64,
}

impl DurationRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Inclusive at both ends
    pub fn contains(&self, duration: f64) -> bool {
        self.min <= duration && duration <= self.max
    }
}

type ProbeFn = dyn Fn(&Path) -> anyhow::Result<f64> + Send + Sync;

/// Duration filter stage
pub struct DurationFilter {
    range: DurationRange,
    disable_filter: bool,
    discard_policy: DiscardPolicy,
    nest_threshold: usize,
    probe: Box<ProbeFn>,
}

impl DurationFilter {
    pub fn new(config: &FilterConfig) -> Self {
        Self {
            range: DurationRange::new(config.min_duration, config.max_duration),
            disable_filter: config.disable_filter,
            discard_policy: config.discard_policy,
            nest_threshold: config.nest_threshold,
            probe: Box::new(probe_duration),
        }
    }

    /// Replace the duration probe (used by tests and alternative decoders)
    pub fn with_probe<F>(mut self, probe: F) -> Self
    where
        F: Fn(&Path) -> anyhow::Result<f64> + Send + Sync + 'static,
    {
        self.probe = Box::new(probe);
        self
    }

    /// Root that will hold accepted clips for this source/destination pair
    pub fn destination_root(&self, source: &Path, dest: Option<&Path>) -> PathBuf {
        match dest {
            Some(dest) if self.should_nest(source) => match source.file_name() {
                Some(name) => dest.join(name),
                None => dest.to_path_buf(),
            },
            Some(dest) => dest.to_path_buf(),
            None => source.to_path_buf(),
        }
    }

    fn should_nest(&self, source: &Path) -> bool {
        let children = std::fs::read_dir(source)
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0);
        children > self.nest_threshold
    }

    /// Run the filter over `source`
    ///
    /// Only a missing or non-directory source aborts; probe, copy and delete
    /// failures are recorded per clip.
    pub fn run(&self, source: &Path, dest: Option<&Path>) -> StageResult<FilterReport> {
        if !source.exists() {
            return Err(StageError::SourceNotFound(source.to_path_buf()));
        }
        if !source.is_dir() {
            return Err(StageError::NotADirectory(source.to_path_buf()));
        }

        let clips = FileScanner::clips().scan(source)?;

        if self.disable_filter {
            info!(
                source = %source.display(),
                clips = clips.len(),
                "Duration filter disabled, accepting clips in place"
            );
            return Ok(FilterReport {
                evaluated: clips.len(),
                kept: clips.len(),
                destination_root: source.to_path_buf(),
                ..Default::default()
            });
        }

        let destination_root = self.destination_root(source, dest);
        let mut report = FilterReport {
            destination_root: destination_root.clone(),
            ..Default::default()
        };

        info!(
            source = %source.display(),
            destination = %destination_root.display(),
            min = self.range.min,
            max = self.range.max,
            clips = clips.len(),
            "Filtering clips by duration"
        );

        for clip in clips {
            if dest.is_none() && is_filtered_output(&clip) {
                debug!("Skipping previous filter output {}", clip.display());
                continue;
            }

            report.evaluated += 1;

            let duration = match (self.probe)(&clip) {
                Ok(duration) => duration,
                Err(e) => {
                    warn!(path = %clip.display(), error = %e, "Duration probe failed");
                    report.failures.push(ItemFailure::new(&clip, format!("probe failed: {:#}", e)));
                    continue;
                }
            };

            if self.range.contains(duration) {
                let target = match dest {
                    Some(_) => relative_destination(&clip, source, &destination_root),
                    None => sibling_destination(&clip),
                };
                if dest.is_some() && already_filtered(&clip, &target) {
                    report.kept += 1;
                    report.already_present += 1;
                    debug!("Already filtered {}", clip.display());
                    continue;
                }
                match copy_clip(&clip, &target) {
                    Ok(()) => {
                        report.kept += 1;
                        info!("Copied {} to {}", clip.display(), target.display());
                        if dest.is_some() {
                            if let Err(e) = copy_caption(&clip, &target) {
                                warn!(path = %clip.display(), error = %e, "Caption copy failed");
                                report
                                    .failures
                                    .push(ItemFailure::new(&clip, format!("caption copy failed: {}", e)));
                            }
                        }
                    }
                    Err(e) => {
                        warn!(path = %clip.display(), error = %e, "Copy failed");
                        report.failures.push(ItemFailure::new(&clip, format!("copy failed: {}", e)));
                    }
                }
            } else {
                report.discarded += 1;
                self.discard(&clip, duration, &mut report);
            }
        }

        info!("Duration filter complete: {}", report.display_string());
        Ok(report)
    }

    fn discard(&self, clip: &Path, duration: f64, report: &mut FilterReport) {
        match self.discard_policy {
            DiscardPolicy::LeaveSource => {
                warn!("Skipped {} (duration: {:.2}s)", clip.display(), duration);
            }
            DiscardPolicy::DeleteSource => match std::fs::remove_file(clip) {
                Ok(()) => {
                    report.deleted += 1;
                    warn!("Deleted {} (duration: {:.2}s)", clip.display(), duration);
                }
                Err(e) => {
                    warn!(path = %clip.display(), error = %e, "Delete failed");
                    report.failures.push(ItemFailure::new(clip, format!("delete failed: {}", e)));
                }
            },
        }
    }
}

fn is_filtered_output(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with(FILTERED_PREFIX))
        .unwrap_or(false)
}

fn relative_destination(clip: &Path, source: &Path, destination_root: &Path) -> PathBuf {
    match clip.strip_prefix(source) {
        Ok(relative) => destination_root.join(relative),
        Err(_) => destination_root.join(clip.file_name().unwrap_or_default()),
    }
}

fn sibling_destination(clip: &Path) -> PathBuf {
    let name = clip
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    clip.with_file_name(format!("{}{}", FILTERED_PREFIX, name))
}

fn copy_clip(clip: &Path, target: &Path) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(clip, target)?;
    Ok(())
}

/// Whether an earlier run already produced this clip's copy
///
/// The copy may since have been renamed after its caption, so
/// `<caption text>.wav` beside the target counts too.
fn already_filtered(clip: &Path, target: &Path) -> bool {
    if target.exists() {
        return true;
    }
    let text = match std::fs::read_to_string(clip.with_extension(CAPTION_EXTENSION)) {
        Ok(text) => text,
        Err(_) => return false,
    };
    let text = text.trim();
    if text.is_empty() || text.contains('/') || text.contains('\\') {
        return false;
    }
    target
        .with_file_name(format!("{}.{}", text, CLIP_EXTENSION))
        .is_file()
}

/// Carry the clip's `.lab` caption next to its copy, if there is one
fn copy_caption(clip: &Path, target: &Path) -> std::io::Result<()> {
    let caption = clip.with_extension(CAPTION_EXTENSION);
    if caption.is_file() {
        std::fs::copy(&caption, target.with_extension(CAPTION_EXTENSION))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_inclusive() {
        let range = DurationRange::new(3.0, 10.0);
        assert!(range.contains(3.0));
        assert!(!range.contains(2.999));
        assert!(range.contains(10.0));
        assert!(!range.contains(10.001));
        assert!(range.contains(6.5));
        assert!(!range.contains(f64::NAN));
    }

    #[test]
    fn test_sibling_destination() {
        let target = sibling_destination(Path::new("/in/角色/a.wav"));
        assert_eq!(target, PathBuf::from("/in/角色/filtered_a.wav"));
        assert!(is_filtered_output(&target));
    }

    #[test]
    fn test_relative_destination_keeps_subfolders() {
        let target = relative_destination(
            Path::new("/in/角色/sub/a.wav"),
            Path::new("/in"),
            Path::new("/out"),
        );
        assert_eq!(target, PathBuf::from("/out/角色/sub/a.wav"));
    }
}
