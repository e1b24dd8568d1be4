//! Pipeline stages and their collaborators
//!
//! Stage order: duration filter → caption renamer → inference orchestrator
//! → emotion router. Each stage consumes the previous stage's folder or
//! ledger.

pub mod caption_renamer;
pub mod duration_filter;
pub mod emotion_client;
pub mod emotion_router;
pub mod file_scanner;
pub mod inference_orchestrator;
pub mod ledger;
pub mod text_emotion;

pub use caption_renamer::{CaptionRenamer, RenameOutcome, RenameSkip};
pub use duration_filter::{DurationFilter, DurationRange};
pub use emotion_client::{
    EmotionRecognizer, HttpEmotionRecognizer, HttpTextClassifier, ServiceError, TextClassifier,
};
pub use emotion_router::{should_route, EmotionRouter, RouteOutcome};
pub use file_scanner::{FileScanner, ScanError};
pub use inference_orchestrator::InferenceOrchestrator;
pub use ledger::{read_ledger, write_ledger, LedgerWriter};
