//! End-to-end run over a small working tree

mod helpers;

use emosort::pipeline::{ensure_work_folders, run_pipeline};
use emosort::services::TextClassifier;
use emosort_common::config::{PathsConfig, PipelineConfig};
use helpers::{generate_test_wav, write_caption, AudioConfig, MockClassifier, MockRecognizer};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn paths_under(root: &Path) -> PathsConfig {
    PathsConfig {
        input_folder: root.join("input"),
        filtered_folder: root.join("referenceaudio"),
        ledger_file: root.join("csv_opt").join("recognition_result.csv"),
        output_folder: root.join("output"),
    }
}

#[test]
fn test_ensure_work_folders() {
    let temp_dir = TempDir::new().unwrap();
    let paths = paths_under(temp_dir.path());

    ensure_work_folders(&paths).unwrap();
    ensure_work_folders(&paths).unwrap();

    assert!(paths.input_folder.is_dir());
    assert!(paths.filtered_folder.is_dir());
    assert!(temp_dir.path().join("csv_opt").is_dir());
    assert!(paths.output_folder.is_dir());
}

#[tokio::test]
async fn test_full_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        paths: paths_under(temp_dir.path()),
        ..Default::default()
    };
    ensure_work_folders(&config.paths).unwrap();

    let input = &config.paths.input_folder;
    let kept = generate_test_wav(&input.join("胡桃/001.wav"), &AudioConfig::seconds(4.0)).unwrap();
    write_caption(&kept, "你好").unwrap();
    let disagree =
        generate_test_wav(&input.join("胡桃/002.wav"), &AudioConfig::seconds(5.0)).unwrap();
    write_caption(&disagree, "别过来").unwrap();
    let short = generate_test_wav(&input.join("胡桃/003.wav"), &AudioConfig::seconds(1.0)).unwrap();
    write_caption(&short, "太短").unwrap();

    let recognizer = Arc::new(MockRecognizer::constant("开心/happy", 0.8));
    let classifier: Arc<dyn TextClassifier> = Arc::new(
        MockClassifier::new()
            .answer("你好", "高兴")
            .answer("别过来", "愤怒"),
    );

    let report = run_pipeline(&config, recognizer, Some(classifier))
        .await
        .unwrap();

    assert_eq!(report.filter.kept, 2);
    assert_eq!(report.filter.discarded, 1);
    assert_eq!(report.audio_folder, config.paths.filtered_folder);
    assert_eq!(report.rename.renamed, 2);
    assert_eq!(report.recognition.recognized, 2);
    assert!(report.recognition.text_emotion_applied);
    assert_eq!(report.routing.copied, 1);
    assert_eq!(report.routing.skipped_mismatch, 1);

    let output = &config.paths.output_folder;
    assert!(output.join("胡桃/开心/【开心】你好.wav").exists());
    assert!(!output.join("胡桃/开心/【开心】别过来.wav").exists());
    assert!(report.summary().contains("Route:"));
}

#[tokio::test]
async fn test_pipeline_with_filter_disabled_reads_input() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = PipelineConfig {
        paths: paths_under(temp_dir.path()),
        ..Default::default()
    };
    config.filter.disable_filter = true;
    config.recognize.disable_text_emotion = true;
    ensure_work_folders(&config.paths).unwrap();

    generate_test_wav(
        &config.paths.input_folder.join("钟离/take.wav"),
        &AudioConfig::seconds(1.0),
    )
    .unwrap();

    let report = run_pipeline(
        &config,
        Arc::new(MockRecognizer::constant("中立/neutral", 0.6)),
        None,
    )
    .await
    .unwrap();

    assert_eq!(report.audio_folder, config.paths.input_folder);
    assert_eq!(report.recognition.recognized, 1);
    assert!(config
        .paths
        .output_folder
        .join("钟离/中立/【中立】take.wav")
        .exists());
}

#[tokio::test]
async fn test_rerun_adds_no_duplicates() {
    let temp_dir = TempDir::new().unwrap();
    let config = PipelineConfig {
        paths: paths_under(temp_dir.path()),
        ..Default::default()
    };
    ensure_work_folders(&config.paths).unwrap();

    let clip = generate_test_wav(
        &config.paths.input_folder.join("胡桃/001.wav"),
        &AudioConfig::seconds(4.0),
    )
    .unwrap();
    write_caption(&clip, "你好").unwrap();

    let recognizer = Arc::new(MockRecognizer::constant("开心/happy", 0.8));

    let first = run_pipeline(&config, recognizer.clone(), None).await.unwrap();
    assert_eq!(first.rename.renamed, 1);
    assert_eq!(first.routing.copied, 1);

    let second = run_pipeline(&config, recognizer, None).await.unwrap();
    assert_eq!(second.filter.already_present, 1);
    assert_eq!(second.rename.renamed, 0);
    assert_eq!(second.recognition.recognized, 1);
    assert_eq!(second.routing.copied, 0);
    assert_eq!(second.routing.skipped_existing, 1);

    let bucket: Vec<String> = std::fs::read_dir(config.paths.output_folder.join("胡桃/开心"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(bucket, vec!["【开心】你好.wav".to_string()]);
}
