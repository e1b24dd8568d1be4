//! Inference orchestrator
//!
//! Enumerates the clips under a folder, sends each through the emotion
//! recognizer with bounded concurrency and records one ledger row per
//! successful clip. Optionally merges a text-derived emotion column before
//! finalizing the ledger.
//!
//! # Concurrency
//! - At most `batch_size` clips in flight (`buffer_unordered`), which bounds
//!   outstanding requests to the recognition service
//! - At most `num_workers` clips decoding/resampling at once (semaphore
//!   around `spawn_blocking`)
//! - Rows reach the ledger through one serialising writer; row order follows
//!   completion order and carries no meaning

use crate::error::{StageError, StageResult};
use crate::models::{top_label, ItemFailure, RecognitionRecord, RecognitionReport};
use crate::services::emotion_client::{EmotionRecognizer, TextClassifier};
use crate::services::file_scanner::FileScanner;
use crate::services::ledger::{self, LedgerSender, LedgerWriter};
use crate::services::text_emotion::text_emotion_for_stem;
use crate::utils::audio_decoder::load_waveform;
use emosort_common::config::RecognizeConfig;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

/// Recognition stage
pub struct InferenceOrchestrator {
    recognizer: Arc<dyn EmotionRecognizer>,
    text_classifier: Option<Arc<dyn TextClassifier>>,
    batch_size: usize,
    num_workers: usize,
    disable_text_emotion: bool,
}

impl InferenceOrchestrator {
    pub fn new(recognizer: Arc<dyn EmotionRecognizer>, config: &RecognizeConfig) -> Self {
        Self {
            recognizer,
            text_classifier: None,
            batch_size: config.batch_size.max(1),
            num_workers: config.num_workers.max(1),
            disable_text_emotion: config.disable_text_emotion,
        }
    }

    /// Enable TextEmotion augmentation with `classifier`
    pub fn with_text_classifier(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.text_classifier = Some(classifier);
        self
    }

    fn text_classifier(&self) -> Option<&Arc<dyn TextClassifier>> {
        if self.disable_text_emotion {
            None
        } else {
            self.text_classifier.as_ref()
        }
    }

    /// Recognize every clip under `folder` into a fresh ledger at `ledger_path`
    pub async fn run(&self, folder: &Path, ledger_path: &Path) -> StageResult<RecognitionReport> {
        if !folder.exists() {
            return Err(StageError::SourceNotFound(folder.to_path_buf()));
        }

        let start_time = Instant::now();
        let writer = LedgerWriter::create(ledger_path, self.batch_size * 2)?;
        let clips = FileScanner::clips().scan(folder)?;
        let total_clips = clips.len();

        tracing::info!(
            folder = %folder.display(),
            clips = total_clips,
            batch_size = self.batch_size,
            num_workers = self.num_workers,
            "Starting emotion recognition"
        );

        let decode_slots = Arc::new(Semaphore::new(self.num_workers));
        let processed = Arc::new(AtomicUsize::new(0));

        let outcomes: Vec<Result<(), ItemFailure>> = stream::iter(clips)
            .map(|clip| {
                let recognizer = Arc::clone(&self.recognizer);
                let decode_slots = Arc::clone(&decode_slots);
                let processed = Arc::clone(&processed);
                let tx = writer.sender();

                async move {
                    let outcome = recognize_clip(recognizer, decode_slots, &clip, tx).await;

                    if let Err(failure) = &outcome {
                        tracing::error!(
                            file = %failure.path.display(),
                            error = %failure.reason,
                            "Recognition failed"
                        );
                    }

                    let current = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if current % 10 == 0 || current == total_clips {
                        tracing::info!(
                            progress = format!("{}/{}", current, total_clips),
                            "Recognition progress"
                        );
                    }

                    outcome
                }
            })
            .buffer_unordered(self.batch_size)
            .collect()
            .await;

        let rows_written = writer.finish().await?;
        let failures: Vec<ItemFailure> = outcomes.into_iter().filter_map(Result::err).collect();

        tracing::info!(
            "Processed {} files in {}, total time: {:.2} seconds",
            total_clips,
            folder.display(),
            start_time.elapsed().as_secs_f64()
        );

        let mut report = RecognitionReport {
            total_clips,
            recognized: rows_written,
            failures,
            text_emotion_applied: false,
            text_failures: 0,
            ledger_path: ledger_path.to_path_buf(),
        };

        self.finalize(ledger_path, &mut report).await?;

        tracing::info!("Recognition complete: {}", report.display_string());
        Ok(report)
    }

    /// Read raw rows back, merge TextEmotion if enabled, rewrite with header
    async fn finalize(&self, ledger_path: &Path, report: &mut RecognitionReport) -> StageResult<()> {
        let mut records = ledger::read_raw_rows(ledger_path)?;

        if let Some(classifier) = self.text_classifier() {
            let labels: Vec<Result<String, (PathBuf, String)>> = stream::iter(records.iter())
                .map(|record| {
                    let classifier = Arc::clone(classifier);
                    let stem = record.stem();
                    let path = record.audio_path.clone();
                    async move {
                        text_emotion_for_stem(classifier.as_ref(), &stem)
                            .await
                            .map_err(|e| (path, e.to_string()))
                    }
                })
                .buffered(self.batch_size)
                .collect()
                .await;

            for (record, label) in records.iter_mut().zip(labels) {
                let text = match label {
                    Ok(text) => text,
                    Err((path, error)) => {
                        tracing::warn!(
                            file = %path.display(),
                            error = %error,
                            "Text emotion classification failed"
                        );
                        report.text_failures += 1;
                        String::new()
                    }
                };
                record.text_emotion = Some(text);
            }
            report.text_emotion_applied = true;
        }

        let with_text = report.text_emotion_applied;
        ledger::write_ledger(ledger_path, &records, with_text)?;
        Ok(())
    }
}

/// Decode, recognize and submit one clip
async fn recognize_clip(
    recognizer: Arc<dyn EmotionRecognizer>,
    decode_slots: Arc<Semaphore>,
    clip: &Path,
    tx: LedgerSender,
) -> Result<(), ItemFailure> {
    let target_rate = recognizer.target_sample_rate();

    let waveform = {
        let _permit = decode_slots
            .acquire_owned()
            .await
            .map_err(|e| ItemFailure::new(clip, e))?;
        let path = clip.to_path_buf();
        tokio::task::spawn_blocking(move || load_waveform(&path, target_rate))
            .await
            .map_err(|e| ItemFailure::new(clip, format!("decode task failed: {}", e)))?
            .map_err(|e| ItemFailure::new(clip, format!("decode failed: {:#}", e)))?
    };

    tracing::debug!(
        file = %clip.display(),
        seconds = waveform.duration_seconds(),
        "Clip decoded"
    );

    let ranked = recognizer
        .recognize(&waveform)
        .await
        .map_err(|e| ItemFailure::new(clip, e))?;

    let top = top_label(&ranked)
        .ok_or_else(|| ItemFailure::new(clip, "service returned no usable scores"))?;

    let record = RecognitionRecord::from_top_label(clip, top);

    tracing::debug!(
        file = %clip.display(),
        emotion = %record.audio_emotion,
        confidence = record.confidence,
        "Clip recognized"
    );

    tx.send(record)
        .await
        .map_err(|_| ItemFailure::new(clip, "ledger writer closed"))
}
