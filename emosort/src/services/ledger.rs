//! Recognition ledger
//!
//! A `|`-delimited UTF-8 file with one row per recognized clip:
//!
//! ```text
//! AudioPath|AudioEmotion|Confidence|ParentFolder[|TextEmotion]
//! ```
//!
//! During recognition, concurrent tasks submit rows to a single writer over
//! a channel, so lines never interleave. Raw rows carry no header. After all
//! producers finish, the ledger is read back once and rewritten with a
//! header via a temp file and rename.

use crate::error::{StageError, StageResult};
use crate::models::{RecognitionRecord, UNKNOWN_CHARACTER};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DELIMITER: u8 = b'|';
pub const HEADER: [&str; 4] = ["AudioPath", "AudioEmotion", "Confidence", "ParentFolder"];
pub const TEXT_EMOTION_COLUMN: &str = "TextEmotion";

/// Handle used by producers to submit rows
pub type LedgerSender = mpsc::Sender<RecognitionRecord>;

/// Single serialising writer for raw ledger rows
pub struct LedgerWriter {
    path: PathBuf,
    tx: LedgerSender,
    handle: JoinHandle<Result<usize, csv::Error>>,
}

impl LedgerWriter {
    /// Start a fresh ledger at `path`
    ///
    /// Any existing file is replaced. Must be called inside a Tokio runtime.
    pub fn create(path: &Path, capacity: usize) -> StageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        if path.exists() {
            tracing::info!("Removing previous ledger {}", path.display());
            std::fs::remove_file(path)?;
        }

        let file = File::create(path)?;
        let (tx, mut rx) = mpsc::channel::<RecognitionRecord>(capacity.max(1));

        let handle = tokio::task::spawn_blocking(move || -> Result<usize, csv::Error> {
            let mut writer = WriterBuilder::new()
                .delimiter(DELIMITER)
                .has_headers(false)
                .flexible(true)
                .from_writer(file);

            let mut rows = 0usize;
            while let Some(record) = rx.blocking_recv() {
                writer.write_record(record_fields(&record))?;
                writer.flush()?;
                rows += 1;
            }
            writer.flush()?;
            Ok(rows)
        });

        Ok(Self {
            path: path.to_path_buf(),
            tx,
            handle,
        })
    }

    /// New producer handle
    pub fn sender(&self) -> LedgerSender {
        self.tx.clone()
    }

    /// Close the channel and wait until every submitted row is on disk
    ///
    /// Returns the number of rows written. Producers still holding a sender
    /// keep the writer alive, so drop them first.
    pub async fn finish(self) -> StageResult<usize> {
        let LedgerWriter { path, tx, handle } = self;
        drop(tx);
        handle
            .await?
            .map_err(|e| StageError::ledger(&path, e))
    }
}

fn record_fields(record: &RecognitionRecord) -> Vec<String> {
    let mut fields = vec![
        record.audio_path.to_string_lossy().into_owned(),
        record.audio_emotion.clone(),
        record.confidence.to_string(),
        record.parent_folder.clone(),
    ];
    if let Some(text) = &record.text_emotion {
        fields.push(text.clone());
    }
    fields
}

fn parse_row(row: &StringRecord, text_index: Option<usize>) -> Result<RecognitionRecord, String> {
    let audio_path = row.get(0).filter(|s| !s.is_empty()).ok_or("missing AudioPath")?;
    let audio_emotion = row.get(1).ok_or("missing AudioEmotion")?;
    let confidence = match row.get(2) {
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("bad Confidence '{}': {}", raw, e))?,
        None => return Err("missing Confidence".to_string()),
    };
    let parent_folder = row
        .get(3)
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_CHARACTER.to_string());
    let text_emotion = text_index.map(|idx| row.get(idx).unwrap_or_default().to_string());

    Ok(RecognitionRecord {
        audio_path: PathBuf::from(audio_path),
        audio_emotion: audio_emotion.to_string(),
        confidence,
        parent_folder,
        text_emotion,
    })
}

fn read_rows(path: &Path, has_headers: bool) -> StageResult<Vec<RecognitionRecord>> {
    if !path.exists() {
        return Err(StageError::LedgerNotFound(path.to_path_buf()));
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(has_headers)
        .flexible(true)
        .from_path(path)
        .map_err(|e| StageError::ledger(path, e))?;

    let text_index = if has_headers {
        let headers = reader.headers().map_err(|e| StageError::ledger(path, e))?;
        headers.iter().position(|h| h.trim() == TEXT_EMOTION_COLUMN)
    } else {
        None
    };

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| StageError::ledger(path, e))?;
        match parse_row(&row, text_index) {
            Ok(record) => records.push(record),
            Err(reason) => {
                tracing::warn!(
                    ledger = %path.display(),
                    row = line + 1,
                    reason = %reason,
                    "Skipping malformed ledger row"
                );
            }
        }
    }

    Ok(records)
}

/// Read headerless rows written by [`LedgerWriter`]
pub fn read_raw_rows(path: &Path) -> StageResult<Vec<RecognitionRecord>> {
    read_rows(path, false)
}

/// Read a finalized ledger (header row required)
///
/// `text_emotion` is `Some` on every record iff the header has a
/// `TextEmotion` column. Rows with fewer than four fields get the
/// `Unknown` character.
pub fn read_ledger(path: &Path) -> StageResult<Vec<RecognitionRecord>> {
    read_rows(path, true)
}

/// Write a finalized ledger with header, replacing `path` atomically
pub fn write_ledger(
    path: &Path,
    records: &[RecognitionRecord],
    with_text_emotion: bool,
) -> StageResult<()> {
    let tmp_path = path.with_extension("csv.tmp");

    {
        let file = File::create(&tmp_path)?;
        let mut writer = WriterBuilder::new()
            .delimiter(DELIMITER)
            .flexible(true)
            .from_writer(file);

        let mut header: Vec<&str> = HEADER.to_vec();
        if with_text_emotion {
            header.push(TEXT_EMOTION_COLUMN);
        }
        writer
            .write_record(&header)
            .map_err(|e| StageError::ledger(path, e))?;

        for record in records {
            let mut fields = record_fields(record);
            fields.truncate(HEADER.len());
            if with_text_emotion {
                fields.push(record.text_emotion.clone().unwrap_or_default());
            }
            writer
                .write_record(&fields)
                .map_err(|e| StageError::ledger(path, e))?;
        }
        writer.flush()?;
    }

    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
