//! In-process stand-ins for the recognition and classification services

use async_trait::async_trait;
use emosort::models::LabelScore;
use emosort::services::{EmotionRecognizer, ServiceError, TextClassifier};
use emosort::utils::Waveform;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type RecognizeFn = dyn Fn(&Waveform) -> Result<Vec<LabelScore>, ServiceError> + Send + Sync;

/// Scripted recognizer that also tracks how many calls overlap
pub struct MockRecognizer {
    respond: Box<RecognizeFn>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl MockRecognizer {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&Waveform) -> Result<Vec<LabelScore>, ServiceError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers `label` with `score`, next to a weaker runner-up
    pub fn constant(label: &str, score: f64) -> Self {
        let label = label.to_string();
        Self::new(move |_| {
            Ok(vec![
                LabelScore::new("其他/other", score / 2.0),
                LabelScore::new(label.clone(), score),
            ])
        })
    }

    /// Hold each call for `delay` so overlapping calls become visible
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmotionRecognizer for MockRecognizer {
    fn target_sample_rate(&self) -> u32 {
        16_000
    }

    async fn recognize(&self, waveform: &Waveform) -> Result<Vec<LabelScore>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = (self.respond)(waveform);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Text classifier answering from a fixed table; unknown text fails
#[derive(Default)]
pub struct MockClassifier {
    answers: HashMap<String, Vec<LabelScore>>,
    seen: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, text: &str, label: &str) -> Self {
        self.answers
            .insert(text.to_string(), vec![LabelScore::new(label, 0.9)]);
        self
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextClassifier for MockClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>, ServiceError> {
        self.seen.lock().unwrap().push(text.to_string());
        self.answers
            .get(text)
            .cloned()
            .ok_or_else(|| ServiceError::Api(500, format!("no answer for {}", text)))
    }
}
