//! Recognition results and ledger rows

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Character name used when a ledger row carries no parent folder column
pub const UNKNOWN_CHARACTER: &str = "Unknown";

/// One `(label, score)` pair returned by a recognition or classification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f64) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Highest-scoring entry; ties go to the earliest entry
///
/// NaN scores never win.
pub fn top_label(results: &[LabelScore]) -> Option<&LabelScore> {
    let mut best: Option<&LabelScore> = None;
    for candidate in results {
        if candidate.score.is_nan() {
            continue;
        }
        match best {
            Some(current) if candidate.score <= current.score => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Strip the bilingual suffix from a model label (`生气/angry` → `生气`)
pub fn primary_label(label: &str) -> &str {
    label.split('/').next().unwrap_or(label).trim()
}

/// One ledger row
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionRecord {
    /// Clip path as enumerated (natural key)
    pub audio_path: PathBuf,
    /// Top audio emotion label
    pub audio_emotion: String,
    /// Score of the top label, in [0, 1]
    pub confidence: f64,
    /// Immediate containing directory name (character)
    pub parent_folder: String,
    /// Emotion derived from the clip name, when augmentation ran
    pub text_emotion: Option<String>,
}

impl RecognitionRecord {
    /// Build a row from a clip path and its winning label
    pub fn from_top_label(audio_path: &Path, top: &LabelScore) -> Self {
        Self {
            audio_path: audio_path.to_path_buf(),
            audio_emotion: primary_label(&top.label).to_string(),
            confidence: top.score.clamp(0.0, 1.0),
            parent_folder: parent_folder_name(audio_path),
            text_emotion: None,
        }
    }

    /// File stem of the clip (used as caption text)
    pub fn stem(&self) -> String {
        self.audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Name of the clip's immediate containing directory
pub fn parent_folder_name(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
