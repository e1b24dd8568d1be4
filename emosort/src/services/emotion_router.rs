//! Emotion router
//!
//! Copies each accepted ledger row's clip into
//! `<output>/<character>/<emotion>/【<emotion>】<file name>`.
//!
//! Rows are independent: a bounded pool of `num_workers` copies runs at once
//! and one failed copy never stops the others. Existing destinations are
//! left alone, so re-running over the same ledger adds nothing.

use crate::error::{StageError, StageResult};
use crate::models::{ItemFailure, RecognitionRecord, RouteReport};
use crate::services::ledger::read_ledger;
use emosort_common::config::ClassifyConfig;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Result of routing one ledger row
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Clip copied to the given destination
    Copied(PathBuf),
    /// Source clip no longer exists
    MissingSource,
    /// Audio and text emotions disagree
    Mismatch,
    /// Destination already present
    AlreadyExists(PathBuf),
}

/// Audio/text consistency check
///
/// A row is routed unless it has a non-empty text emotion that differs from
/// a non-neutral audio emotion.
pub fn should_route(audio_emotion: &str, text_emotion: Option<&str>, neutral_label: &str) -> bool {
    match text_emotion {
        Some(text) if !text.is_empty() => text == audio_emotion || audio_emotion == neutral_label,
        _ => true,
    }
}

/// Bucket file name: `【<emotion>】<original name>`
pub fn tagged_file_name(emotion: &str, file_name: &str) -> String {
    format!("【{}】{}", emotion, file_name)
}

/// Routing stage
pub struct EmotionRouter {
    num_workers: usize,
    neutral_label: String,
}

impl EmotionRouter {
    pub fn new(config: &ClassifyConfig) -> Self {
        Self {
            num_workers: config.num_workers.max(1),
            neutral_label: config.neutral_label.clone(),
        }
    }

    /// Route every row of the ledger at `ledger_path` under `output_root`
    pub async fn run(&self, ledger_path: &Path, output_root: &Path) -> StageResult<RouteReport> {
        if !ledger_path.exists() {
            error!("Ledger file does not exist: {}", ledger_path.display());
            return Err(StageError::LedgerNotFound(ledger_path.to_path_buf()));
        }

        let records = read_ledger(ledger_path)?;
        tokio::fs::create_dir_all(output_root).await?;

        info!(
            ledger = %ledger_path.display(),
            output = %output_root.display(),
            rows = records.len(),
            num_workers = self.num_workers,
            "Routing clips into emotion buckets"
        );

        let mut report = RouteReport {
            total_rows: records.len(),
            ..Default::default()
        };

        let outcomes: Vec<Result<RouteOutcome, ItemFailure>> = stream::iter(records)
            .map(|record| async move {
                self.route_record(&record, output_root).await
            })
            .buffer_unordered(self.num_workers)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Ok(RouteOutcome::Copied(_)) => report.copied += 1,
                Ok(RouteOutcome::MissingSource) => report.skipped_missing += 1,
                Ok(RouteOutcome::Mismatch) => report.skipped_mismatch += 1,
                Ok(RouteOutcome::AlreadyExists(_)) => report.skipped_existing += 1,
                Err(failure) => {
                    error!(
                        file = %failure.path.display(),
                        error = %failure.reason,
                        "Exception occurred while routing"
                    );
                    report.failures.push(failure);
                }
            }
        }

        info!("Routing complete: {}", report.display_string());
        Ok(report)
    }

    /// Route a single ledger row
    pub async fn route_record(
        &self,
        record: &RecognitionRecord,
        output_root: &Path,
    ) -> Result<RouteOutcome, ItemFailure> {
        let src_path = &record.audio_path;

        if !tokio::fs::try_exists(src_path).await.unwrap_or(false) {
            warn!("Source file does not exist: {}", src_path.display());
            return Ok(RouteOutcome::MissingSource);
        }

        let audio_emotion = record.audio_emotion.as_str();
        if !should_route(audio_emotion, record.text_emotion.as_deref(), &self.neutral_label) {
            info!(
                "Skipping {} due to emotion mismatch: AudioEmotion={}, TextEmotion={}",
                src_path.display(),
                audio_emotion,
                record.text_emotion.as_deref().unwrap_or_default()
            );
            return Ok(RouteOutcome::Mismatch);
        }

        let file_name = src_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ItemFailure::new(src_path, "path has no file name"))?;

        let emotion_folder = output_root.join(&record.parent_folder).join(audio_emotion);
        tokio::fs::create_dir_all(&emotion_folder)
            .await
            .map_err(|e| ItemFailure::new(src_path, format!("create {}: {}", emotion_folder.display(), e)))?;

        let dst_path = emotion_folder.join(tagged_file_name(audio_emotion, &file_name));

        if tokio::fs::try_exists(&dst_path).await.unwrap_or(false) {
            warn!("File already exists: {}", dst_path.display());
            return Ok(RouteOutcome::AlreadyExists(dst_path));
        }

        tokio::fs::copy(src_path, &dst_path)
            .await
            .map_err(|e| ItemFailure::new(src_path, format!("Error copying file: {}", e)))?;

        info!("Copied {} to {}", src_path.display(), dst_path.display());
        Ok(RouteOutcome::Copied(dst_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEUTRAL: &str = "中立";

    #[test]
    fn test_neutral_audio_always_routes() {
        assert!(should_route("中立", Some("难过"), NEUTRAL));
        assert!(should_route("中立", Some("开心"), NEUTRAL));
    }

    #[test]
    fn test_mismatch_is_skipped() {
        assert!(!should_route("开心", Some("难过"), NEUTRAL));
    }

    #[test]
    fn test_empty_or_absent_text_routes() {
        assert!(should_route("开心", Some(""), NEUTRAL));
        assert!(should_route("开心", None, NEUTRAL));
    }

    #[test]
    fn test_agreement_routes() {
        assert!(should_route("生气", Some("生气"), NEUTRAL));
    }

    #[test]
    fn test_tagged_file_name() {
        assert_eq!(tagged_file_name("开心", "你好.wav"), "【开心】你好.wav");
    }
}
