//! End-to-end run: filter → rename → recognize → route

use crate::error::StageResult;
use crate::models::{FilterReport, RecognitionReport, RenameReport, RouteReport};
use crate::services::{
    CaptionRenamer, DurationFilter, EmotionRecognizer, EmotionRouter, InferenceOrchestrator,
    TextClassifier,
};
use emosort_common::config::{PathsConfig, PipelineConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Combined per-stage reports
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub filter: FilterReport,
    /// Folder the later stages read clips from
    pub audio_folder: PathBuf,
    pub rename: RenameReport,
    pub recognition: RecognitionReport,
    pub routing: RouteReport,
}

impl PipelineReport {
    pub fn summary(&self) -> String {
        format!(
            "Filter: {}\nRename: {}\nRecognize: {}\nRoute: {}",
            self.filter.display_string(),
            self.rename.display_string(),
            self.recognition.display_string(),
            self.routing.display_string()
        )
    }
}

/// Create the default working folders
pub fn ensure_work_folders(paths: &PathsConfig) -> std::io::Result<()> {
    let ledger_dir = paths.ledger_file.parent().map(Path::to_path_buf);
    for folder in [
        Some(paths.input_folder.clone()),
        Some(paths.filtered_folder.clone()),
        ledger_dir,
        Some(paths.output_folder.clone()),
    ]
    .into_iter()
    .flatten()
    {
        if !folder.as_os_str().is_empty() {
            std::fs::create_dir_all(&folder)?;
        }
    }
    Ok(())
}

/// Run all four stages with the configured folders
///
/// `text_classifier` is only used when text-emotion augmentation is enabled
/// in `config.recognize`.
pub async fn run_pipeline(
    config: &PipelineConfig,
    recognizer: Arc<dyn EmotionRecognizer>,
    text_classifier: Option<Arc<dyn TextClassifier>>,
) -> StageResult<PipelineReport> {
    let paths = &config.paths;

    let filter = DurationFilter::new(&config.filter);
    let filter_report = filter.run(&paths.input_folder, Some(&paths.filtered_folder))?;

    let audio_folder = if config.filter.disable_filter {
        tracing::info!("Skipping duration filter step");
        paths.input_folder.clone()
    } else {
        paths.filtered_folder.clone()
    };

    let rename_report = CaptionRenamer::new().run(&audio_folder)?;

    let mut orchestrator = InferenceOrchestrator::new(recognizer, &config.recognize);
    if let Some(classifier) = text_classifier {
        orchestrator = orchestrator.with_text_classifier(classifier);
    }
    let recognition_report = orchestrator.run(&audio_folder, &paths.ledger_file).await?;

    let router = EmotionRouter::new(&config.classify);
    let routing_report = router.run(&paths.ledger_file, &paths.output_folder).await?;

    Ok(PipelineReport {
        filter: filter_report,
        audio_folder,
        rename: rename_report,
        recognition: recognition_report,
        routing: routing_report,
    })
}
